//! Test Capabilities
//!
//! A static capability record backed by the host allocator, shared by the
//! unit tests. Being `'static`, the recorded host-interface pointer stays
//! valid no matter which test stored it.

use core::ffi::c_void;
use sharedcrypto_common::protocol::capabilities::{
    Capabilities, CAPABILITIES_VERSION_MAJOR, CAPABILITIES_VERSION_MINOR,
};
use std::alloc::Layout;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

fn allocations() -> &'static Mutex<HashMap<usize, Layout>> {
    static ALLOCATIONS: OnceLock<Mutex<HashMap<usize, Layout>>> = OnceLock::new();
    ALLOCATIONS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub extern "C" fn test_allocate_pool(size: usize) -> *mut c_void {
    let layout = match Layout::from_size_align(size.max(1), 16) {
        Ok(layout) => layout,
        Err(_) => return core::ptr::null_mut(),
    };
    let ptr = unsafe { std::alloc::alloc(layout) };
    if !ptr.is_null() {
        allocations().lock().unwrap().insert(ptr as usize, layout);
    }
    ptr as *mut c_void
}

pub extern "C" fn test_free_pool(buffer: *mut c_void) {
    if buffer.is_null() {
        return;
    }
    if let Some(layout) = allocations().lock().unwrap().remove(&(buffer as usize)) {
        unsafe { std::alloc::dealloc(buffer as *mut u8, layout) };
    }
}

pub extern "C" fn test_debug_print(_level: usize, _msg: *const u8, _len: usize) {}

pub extern "C" fn test_get_random_64(out: *mut u64) -> bool {
    if out.is_null() {
        return false;
    }
    unsafe { *out = 0x9E37_79B9_7F4A_7C15 };
    true
}

pub static TEST_CAPS: Capabilities = Capabilities {
    major: CAPABILITIES_VERSION_MAJOR,
    minor: CAPABILITIES_VERSION_MINOR,
    reserved: 0,
    allocate_pool: test_allocate_pool,
    free_pool: test_free_pool,
    get_time: None,
    debug_print: test_debug_print,
    get_random_64: test_get_random_64,
};
