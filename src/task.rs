//! Named task spawning with explicit priority and stack.
//!
//! On ESP-IDF `std::thread` is backed by pthreads over FreeRTOS tasks.
//! `esp_pthread_set_cfg()` sets thread-local configuration applied to the
//! *next* `pthread_create()` from the calling thread, so the config→spawn
//! pair must not be interleaved with other thread creation on that thread.
//! On other targets priority is ignored and a plain named thread is used.

use std::thread::JoinHandle;

use crate::error::Error;

/// Static description of one long-running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// NUL-terminated, e.g. `"uart-read\0"`.
    pub name: &'static str,
    /// FreeRTOS priority.
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    pub fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, Error> {
    debug_assert!(spec.name.ends_with('\0'));

    // SAFETY: `cfg` is a fully initialised default config and
    // `thread_name` points at a 'static NUL-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as _;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        log::error!("esp_pthread_set_cfg({}) failed: {}", spec.display_name(), ret);
        return Err(Error::Init("pthread config rejected"));
    }

    log::info!(
        "Spawning '{}' (pri={}, stack={}KB)",
        spec.display_name(),
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
        .map_err(|_| Error::Init("task creation failed"))
}

/// Simulation fallback. Priority is ignored.
#[cfg(not(target_os = "espidf"))]
pub fn spawn(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, Error> {
    log::info!(
        "Spawning '{}' (sim, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    // Host stacks are floored at 64 KiB.
    let stack = (spec.stack_kb * 1024).max(64 * 1024);
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(stack)
        .spawn(f)
        .map_err(|_| Error::Init("task creation failed"))
}
