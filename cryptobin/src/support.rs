//! Host Interface Handle
//!
//! The binary has exactly one channel to host services: the capability
//! record passed into the construct call. It is held here as a single
//! set-once handle — replaced, not accumulated, if a later bootstrap runs
//! the handshake again. The record is owned by the bootstrap and
//! guaranteed to outlive the result table, so the borrow below is sound
//! for as long as any published operation can be invoked.

use core::ffi::c_void;
use core::sync::atomic::{AtomicPtr, Ordering};
use sharedcrypto_common::protocol::Capabilities;
use spin::Once;

static HOST: AtomicPtr<Capabilities> = AtomicPtr::new(core::ptr::null_mut());

static PROVIDER_READY: Once<bool> = Once::new();

/// Record the capability table for process-wide use by the operations.
pub fn record_host_interface(capabilities: *const Capabilities) {
    HOST.store(capabilities as *mut Capabilities, Ordering::Release);
}

pub fn host_interface() -> Option<&'static Capabilities> {
    let ptr = HOST.load(Ordering::Acquire);
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { &*ptr })
    }
}

/// Allocate from the host pool; null when no host is recorded.
pub fn host_alloc(size: usize) -> *mut c_void {
    match host_interface() {
        Some(host) => (host.allocate_pool)(size),
        None => core::ptr::null_mut(),
    }
}

pub fn host_free(buffer: *mut c_void) {
    if buffer.is_null() {
        return;
    }
    if let Some(host) = host_interface() {
        (host.free_pool)(buffer);
    }
}

/// One 64-bit value from the injected randomness capability.
pub fn random_u64() -> Option<u64> {
    let host = host_interface()?;
    let mut value: u64 = 0;
    if (host.get_random_64)(&mut value) {
        Some(value)
    } else {
        None
    }
}

/// Emit a diagnostic through the host, if one is recorded yet.
pub fn diag(level: usize, message: &str) {
    if let Some(host) = host_interface() {
        (host.debug_print)(level, message.as_ptr(), message.len());
    }
}

/// One-time provider initialization: run the provider's known-answer
/// self-test before any operation is published. The result is latched;
/// a failed provider stays failed for the rest of the boot.
pub fn ensure_provider_ready() -> bool {
    *PROVIDER_READY.call_once(crate::ops::provider_self_test)
}
