//! Fuzz target: `Mailbox::store` / `take_if`
//!
//! Splits the input into chunks and stores each one, asserting the slot
//! never exceeds `N - 1` bytes, never holds a NUL, and always reflects the
//! last write.
//!
//! cargo fuzz run fuzz_mailbox

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilgate::relay::FrameMailbox;

fuzz_target!(|data: &[u8]| {
    let mailbox = FrameMailbox::new();

    for chunk in data.split(|&b| b == b'\n') {
        let out = mailbox.store(chunk);
        let held = mailbox.snapshot();

        assert!(held.len() <= FrameMailbox::MAX_CONTENT);
        assert!(!held.contains(&0));
        assert_eq!(held.len(), out.stored);
        assert_eq!(held.as_slice(), &chunk[..out.stored]);
    }

    // Take-if must hand back exactly what was held and leave it empty.
    let before = mailbox.snapshot();
    match mailbox.take_if(|_| true) {
        Some(taken) => assert_eq!(taken, before),
        None => assert!(before.is_empty()),
    }
    assert!(mailbox.is_empty());
});
