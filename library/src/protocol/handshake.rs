//! Two-Phase Handshake
//!
//! The construct sequence every bootstrap runs once an entry pointer is in
//! hand: query the table size, allocate exactly that much from the pool
//! the binary will also be using, zero it, construct in place. On any
//! failure after allocation the buffer is returned to the pool so a failed
//! bootstrap leaves nothing behind.

use crate::console_errorln;
use crate::console_println;
use crate::error::{LoaderError, LoaderResult};
use crate::protocol::capabilities::Capabilities;
use crate::protocol::table::CryptoTable;
use crate::protocol::CryptoEntryFn;
use crate::status::Status;
use core::ffi::c_void;
use core::ptr::NonNull;

/// Run the size-query/construct handshake against `entry`.
///
/// `capabilities` must stay valid and unmoved for as long as the returned
/// table is in use — the binary records a process-wide reference to it.
/// The version of the returned table is logged but deliberately not
/// enforced here; consumers gate per operation.
pub fn construct_table(
    entry: CryptoEntryFn,
    capabilities: &Capabilities,
) -> LoaderResult<NonNull<CryptoTable>> {
    // Phase 1: size query. Idempotent, no side effects in the binary.
    // The reported size must at least cover the version header read below.
    let mut size: u32 = 0;
    let status = entry(capabilities, core::ptr::null_mut(), &mut size);
    if status != Status::BUFFER_TOO_SMALL || size < 8 {
        console_errorln!(
            "[x] Size query returned {} (size {})",
            status,
            size
        );
        return Err(LoaderError::Unsupported);
    }
    console_println!("[i] Result table size: {} bytes", size);

    // Phase 2: construct into a zeroed buffer of exactly the reported size.
    let buffer = (capabilities.allocate_pool)(size as usize);
    if buffer.is_null() {
        return Err(LoaderError::OutOfResources);
    }
    unsafe { core::ptr::write_bytes(buffer as *mut u8, 0, size as usize) };

    let mut table_ptr: *mut c_void = buffer;
    let status = entry(capabilities, &mut table_ptr, &mut size);
    if status.is_error() {
        console_errorln!("[x] Construct call failed: {}", status);
        (capabilities.free_pool)(buffer);
        let err = status.to_result().err().unwrap_or(LoaderError::Unsupported);
        return Err(err);
    }

    // The table header is version-prefixed; read it without assuming the
    // reported size covers this build's full layout.
    let (major, minor) = unsafe {
        let base = buffer as *const u8;
        (
            u16::from_le_bytes([*base, *base.add(1)]),
            u16::from_le_bytes([*base.add(2), *base.add(3)]),
        )
    };
    console_println!("[o] Result table constructed (version {}.{})", major, minor);

    NonNull::new(buffer as *mut CryptoTable).ok_or(LoaderError::OutOfResources)
}
