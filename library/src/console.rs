//! Diagnostic Console
//!
//! The loaders run before any environment-owned output exists, so all
//! diagnostics go through a process-wide sink that an environment installs
//! once its debug output is usable. Until then every macro is a no-op; the
//! handshake must tolerate running with diagnostics dark.

use core::fmt::{self, Write};
use spin::Mutex;

/// Severity levels, matching the platform's debug output convention.
pub const DIAG_ERROR: usize = 0x8000_0000;
pub const DIAG_WARN: usize = 0x0000_0002;
pub const DIAG_INFO: usize = 0x0000_0040;

/// Sink signature: severity, message pointer, message length. The message
/// is UTF-8 and not NUL terminated.
pub type DiagSinkFn = extern "C" fn(level: usize, msg: *const u8, len: usize);

static DIAG_SINK: Mutex<Option<DiagSinkFn>> = Mutex::new(None);

/// Install the process-wide diagnostic sink. A later bootstrap may replace
/// it; at most one bootstrap runs per environment per boot.
pub fn init_console(sink: DiagSinkFn) {
    *DIAG_SINK.lock() = Some(sink);
}

/// Format a message into a fixed buffer and hand it to the sink, if any.
/// Messages longer than the buffer are truncated, never dropped.
pub fn emit(level: usize, args: fmt::Arguments) {
    let sink = match *DIAG_SINK.lock() {
        Some(sink) => sink,
        None => return,
    };

    let mut buf: heapless::String<256> = heapless::String::new();
    let _ = buf.write_fmt(args);
    sink(level, buf.as_ptr(), buf.len());
}

#[macro_export]
macro_rules! console_println {
    () => {
        $crate::console::emit($crate::console::DIAG_INFO, format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::console::emit($crate::console::DIAG_INFO, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! console_warnln {
    ($($arg:tt)*) => {
        $crate::console::emit($crate::console::DIAG_WARN, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! console_errorln {
    ($($arg:tt)*) => {
        $crate::console::emit($crate::console::DIAG_ERROR, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn counting_sink(_level: usize, msg: *const u8, len: usize) {
        assert!(!msg.is_null());
        assert!(len > 0);
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn sink_receives_messages_after_init() {
        // Before init the emit path must be a silent no-op.
        emit(DIAG_INFO, format_args!("dropped"));

        init_console(counting_sink);
        console_println!("[i] hello {}", 42);
        console_errorln!("[x] boom");
        assert!(CALLS.load(Ordering::SeqCst) >= 2);
    }
}
