//! Fuzz target: `topic_matches`
//!
//! Any delivered topic matches the subscription iff it is byte-identical;
//! in particular no proper prefix or extension ever matches.
//!
//! cargo fuzz run fuzz_topic_match

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilgate::bridge::topic_matches;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mid = (0..=text.len() / 2)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    let (delivered, subscribed) = text.split_at(mid);

    assert_eq!(topic_matches(Some(delivered), subscribed), delivered == subscribed);
    assert!(topic_matches(Some(subscribed), subscribed));
    assert!(!topic_matches(None, subscribed));

    if let Some((cut, _)) = subscribed.char_indices().last() {
        assert!(!topic_matches(Some(&subscribed[..cut]), subscribed));
    }
});
