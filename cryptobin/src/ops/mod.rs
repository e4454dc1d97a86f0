//! Published Operations
//!
//! The operation implementations behind the result-table slots. These are
//! pure forwarding: digest and MAC state comes from the provider crates,
//! memory and randomness come from the injected capabilities.

pub mod hash;
pub mod mac;
pub mod random;

use sha2::{Digest, Sha256};

/// NUL-terminated provider identification, published through the table.
static PROVIDER_VERSION: &[u8] = b"sharedcrypto provider 1.2.0\0";

pub extern "C" fn get_provider_version() -> *const u8 {
    PROVIDER_VERSION.as_ptr()
}

/// Known-answer self-test run once before the provider is published.
pub fn provider_self_test() -> bool {
    const ABC_DIGEST: [u8; 32] = [
        0xBA, 0x78, 0x16, 0xBF, 0x8F, 0x01, 0xCF, 0xEA, 0x41, 0x41, 0x40, 0xDE, 0x5D, 0xAE,
        0x22, 0x23, 0xB0, 0x03, 0x61, 0xA3, 0x96, 0x17, 0x7A, 0x9C, 0xB4, 0x10, 0xFF, 0x61,
        0xF2, 0x00, 0x15, 0xAD,
    ];
    Sha256::digest(b"abc").as_slice() == ABC_DIGEST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_test_passes() {
        assert!(provider_self_test());
    }

    #[test]
    fn version_string_is_nul_terminated() {
        let ptr = get_provider_version();
        assert!(!ptr.is_null());
        let text = unsafe { core::ffi::CStr::from_ptr(ptr as *const core::ffi::c_char) };
        assert!(text.to_str().unwrap().starts_with("sharedcrypto"));
    }
}
