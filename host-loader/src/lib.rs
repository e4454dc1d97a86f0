//! Host Harness
//!
//! Runs the identical loader and binary code outside the firmware: a
//! std-backed image loader for corpus-style malformed-input testing, and
//! an emulated platform whose service tables drive the real environment
//! bootstraps end to end.

pub mod loader;
pub mod mutate;
pub mod platform;

use sharedcrypto_common::console;

/// Diagnostic sink writing to stderr, for the CLI.
pub extern "C" fn stderr_diag(level: usize, msg: *const u8, len: usize) {
    if msg.is_null() {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(msg, len) };
    let text = String::from_utf8_lossy(bytes);
    eprintln!("[0x{:08x}] {}", level, text);
}

pub fn init_stderr_console() {
    console::init_console(stderr_diag);
}
