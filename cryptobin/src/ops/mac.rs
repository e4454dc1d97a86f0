//! HMAC Operations
//!
//! The MAC family allocates its context through the injected allocator, so
//! these operations only work once a host interface has been recorded by a
//! construct call. A context is keyless until set-key runs.

use crate::support;
use core::ffi::c_void;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sharedcrypto_common::protocol::table::SHA256_DIGEST_SIZE;

type HmacSha256 = Hmac<Sha256>;
type Context = Option<HmacSha256>;

fn context_ok(context: *mut c_void) -> bool {
    !context.is_null() && (context as usize) % core::mem::align_of::<Context>() == 0
}

pub extern "C" fn hmac_sha256_new() -> *mut c_void {
    let context = support::host_alloc(core::mem::size_of::<Context>());
    if context.is_null() || !context_ok(context) {
        return core::ptr::null_mut();
    }
    unsafe { core::ptr::write(context as *mut Context, None) };
    context
}

pub extern "C" fn hmac_sha256_free(context: *mut c_void) {
    if context.is_null() {
        return;
    }
    unsafe { core::ptr::drop_in_place(context as *mut Context) };
    support::host_free(context);
}

pub extern "C" fn hmac_sha256_set_key(context: *mut c_void, key: *const u8, key_len: usize) -> bool {
    if !context_ok(context) || (key.is_null() && key_len > 0) {
        return false;
    }
    let key = if key_len == 0 {
        &[]
    } else {
        unsafe { core::slice::from_raw_parts(key, key_len) }
    };
    let mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    unsafe { *(context as *mut Context) = Some(mac) };
    true
}

pub extern "C" fn hmac_sha256_update(context: *mut c_void, data: *const u8, len: usize) -> bool {
    if !context_ok(context) || (data.is_null() && len > 0) {
        return false;
    }
    let input = if len == 0 {
        &[]
    } else {
        unsafe { core::slice::from_raw_parts(data, len) }
    };
    match unsafe { (*(context as *mut Context)).as_mut() } {
        Some(mac) => {
            mac.update(input);
            true
        }
        None => false,
    }
}

pub extern "C" fn hmac_sha256_final(context: *mut c_void, out: *mut u8) -> bool {
    if !context_ok(context) || out.is_null() {
        return false;
    }
    match unsafe { (*(context as *mut Context)).take() } {
        Some(mac) => {
            let tag = mac.finalize().into_bytes();
            unsafe { core::ptr::copy_nonoverlapping(tag.as_ptr(), out, SHA256_DIGEST_SIZE) };
            true
        }
        None => false,
    }
}
