//! Hash Operations
//!
//! Context-based and one-shot digest families. The caller supplies opaque
//! context storage of the advertised size (pool allocations are at least
//! 8-aligned, which covers the digest state). Finalizing consumes the
//! context; it must be re-initialized before reuse.

use core::ffi::c_void;
use sha2::{Digest, Sha256, Sha384};
use sharedcrypto_common::protocol::table::{SHA256_DIGEST_SIZE, SHA384_DIGEST_SIZE};

fn input_slice<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(unsafe { core::slice::from_raw_parts(data, len) })
    }
}

fn context_ok<T>(context: *mut c_void) -> bool {
    !context.is_null() && (context as usize) % core::mem::align_of::<T>() == 0
}

// --- SHA-256 -----------------------------------------------------------

pub extern "C" fn sha256_get_context_size() -> usize {
    core::mem::size_of::<Sha256>()
}

pub extern "C" fn sha256_init(context: *mut c_void) -> bool {
    if !context_ok::<Sha256>(context) {
        return false;
    }
    unsafe { core::ptr::write(context as *mut Sha256, Sha256::new()) };
    true
}

pub extern "C" fn sha256_update(context: *mut c_void, data: *const u8, len: usize) -> bool {
    if !context_ok::<Sha256>(context) {
        return false;
    }
    let input = match input_slice(data, len) {
        Some(input) => input,
        None => return false,
    };
    unsafe { (*(context as *mut Sha256)).update(input) };
    true
}

pub extern "C" fn sha256_final(context: *mut c_void, digest: *mut u8) -> bool {
    if !context_ok::<Sha256>(context) || digest.is_null() {
        return false;
    }
    let hasher = unsafe { core::ptr::read(context as *mut Sha256) };
    let out = hasher.finalize();
    unsafe { core::ptr::copy_nonoverlapping(out.as_ptr(), digest, SHA256_DIGEST_SIZE) };
    true
}

pub extern "C" fn sha256_hash_all(data: *const u8, len: usize, digest: *mut u8) -> bool {
    if digest.is_null() {
        return false;
    }
    let input = match input_slice(data, len) {
        Some(input) => input,
        None => return false,
    };
    let out = Sha256::digest(input);
    unsafe { core::ptr::copy_nonoverlapping(out.as_ptr(), digest, SHA256_DIGEST_SIZE) };
    true
}

// --- SHA-384 -----------------------------------------------------------

pub extern "C" fn sha384_get_context_size() -> usize {
    core::mem::size_of::<Sha384>()
}

pub extern "C" fn sha384_init(context: *mut c_void) -> bool {
    if !context_ok::<Sha384>(context) {
        return false;
    }
    unsafe { core::ptr::write(context as *mut Sha384, Sha384::new()) };
    true
}

pub extern "C" fn sha384_update(context: *mut c_void, data: *const u8, len: usize) -> bool {
    if !context_ok::<Sha384>(context) {
        return false;
    }
    let input = match input_slice(data, len) {
        Some(input) => input,
        None => return false,
    };
    unsafe { (*(context as *mut Sha384)).update(input) };
    true
}

pub extern "C" fn sha384_final(context: *mut c_void, digest: *mut u8) -> bool {
    if !context_ok::<Sha384>(context) || digest.is_null() {
        return false;
    }
    let hasher = unsafe { core::ptr::read(context as *mut Sha384) };
    let out = hasher.finalize();
    unsafe { core::ptr::copy_nonoverlapping(out.as_ptr(), digest, SHA384_DIGEST_SIZE) };
    true
}

pub extern "C" fn sha384_hash_all(data: *const u8, len: usize, digest: *mut u8) -> bool {
    if digest.is_null() {
        return false;
    }
    let input = match input_slice(data, len) {
        Some(input) => input,
        None => return false,
    };
    let out = Sha384::digest(input);
    unsafe { core::ptr::copy_nonoverlapping(out.as_ptr(), digest, SHA384_DIGEST_SIZE) };
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn one_shot_matches_known_vector() {
        let mut digest = [0u8; SHA256_DIGEST_SIZE];
        assert!(sha256_hash_all(b"abc".as_ptr(), 3, digest.as_mut_ptr()));
        assert_eq!(hex(&digest), ABC_SHA256);
    }

    #[test]
    fn context_ops_match_one_shot() {
        let mut storage = vec![0u64; sha256_get_context_size().div_ceil(8)];
        let ctx = storage.as_mut_ptr() as *mut c_void;

        assert!(sha256_init(ctx));
        assert!(sha256_update(ctx, b"a".as_ptr(), 1));
        assert!(sha256_update(ctx, b"bc".as_ptr(), 2));
        let mut digest = [0u8; SHA256_DIGEST_SIZE];
        assert!(sha256_final(ctx, digest.as_mut_ptr()));
        assert_eq!(hex(&digest), ABC_SHA256);
    }

    #[test]
    fn empty_update_is_allowed() {
        let mut storage = vec![0u64; sha384_get_context_size().div_ceil(8)];
        let ctx = storage.as_mut_ptr() as *mut c_void;
        assert!(sha384_init(ctx));
        assert!(sha384_update(ctx, core::ptr::null(), 0));
        let mut digest = [0u8; SHA384_DIGEST_SIZE];
        assert!(sha384_final(ctx, digest.as_mut_ptr()));
        // SHA-384 of the empty string
        assert_eq!(
            hex(&digest),
            "38b060a751ac96384cd9327eb1b1e36a21fdb71114be07434c0cc7bf63f6e1da\
             274edebfe76f65fbd51ad2f14898b95b"
        );
    }

    #[test]
    fn null_arguments_fail_cleanly() {
        assert!(!sha256_init(core::ptr::null_mut()));
        assert!(!sha256_hash_all(core::ptr::null(), 4, [0u8; 32].as_mut_ptr()));
        let mut storage = vec![0u64; sha256_get_context_size().div_ceil(8)];
        let ctx = storage.as_mut_ptr() as *mut c_void;
        assert!(sha256_init(ctx));
        assert!(!sha256_final(ctx, core::ptr::null_mut()));
    }
}
