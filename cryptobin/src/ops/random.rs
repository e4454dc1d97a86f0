//! Randomness Operations
//!
//! Fills caller buffers from the injected 64-bit randomness capability.
//! The capability itself may report unavailability (the host resolves its
//! randomness source lazily); that surfaces here as a clean failure.

use crate::support;

pub extern "C" fn random_bytes(out: *mut u8, len: usize) -> bool {
    if len == 0 {
        return true;
    }
    if out.is_null() {
        return false;
    }

    let buffer = unsafe { core::slice::from_raw_parts_mut(out, len) };
    for chunk in buffer.chunks_mut(8) {
        let word = match support::random_u64() {
            Some(word) => word,
            None => return false,
        };
        chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
    }
    true
}
