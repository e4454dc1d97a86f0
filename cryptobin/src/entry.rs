//! Exported Entry Points
//!
//! Two entry variants exist because of when the binary's one-time setup has
//! already happened. `crypto_entry` is the name resolved from the export
//! directory by a foreign loader that bypassed the platform's normal
//! startup, so it runs the provider setup itself. `crypto_entry_no_setup`
//! is handed out through the constructor token by the binary's own driver
//! entries, which have already run setup. Both funnel into one
//! implementation.

use crate::{ops, support};
use core::ffi::c_void;
use sharedcrypto_common::protocol::table::CryptoTable;
use sharedcrypto_common::protocol::{
    Capabilities, CRYPTO_TABLE_VERSION_MAJOR, CRYPTO_TABLE_VERSION_MINOR,
};
use sharedcrypto_common::Status;

#[derive(Clone, Copy)]
enum SetupMode {
    RunProviderSetup,
    AssumeReady,
}

fn entry_impl(
    capabilities: *const Capabilities,
    out_table: *mut *mut c_void,
    out_size: *mut u32,
    setup: SetupMode,
) -> Status {
    let needed = core::mem::size_of::<CryptoTable>() as u32;

    // The required size is always reported.
    if !out_size.is_null() {
        unsafe { *out_size = needed };
    }

    // Size query: no other side effects, callable any number of times.
    if out_table.is_null() {
        return Status::BUFFER_TOO_SMALL;
    }

    if capabilities.is_null() {
        return Status::INVALID_PARAMETER;
    }

    if let SetupMode::RunProviderSetup = setup {
        if !support::ensure_provider_ready() {
            return Status::DEVICE_ERROR;
        }
    }

    let table = unsafe { *out_table };
    if table.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // Pool allocations are at least 8-aligned; reject anything less.
    if (table as usize) % core::mem::align_of::<CryptoTable>() != 0 {
        return Status::INVALID_PARAMETER;
    }

    // The capability record is the binary's only channel to host services;
    // keep it process-wide before any operation can run.
    support::record_host_interface(capabilities);

    unsafe {
        core::ptr::write_bytes(table as *mut u8, 0, needed as usize);
        populate(&mut *(table as *mut CryptoTable));
    }

    Status::SUCCESS
}

/// Fill the version fields and every supported slot. Unsupported slots are
/// left as the nulls the zeroed buffer already holds, keeping positions
/// stable across minor versions.
fn populate(table: &mut CryptoTable) {
    table.major = CRYPTO_TABLE_VERSION_MAJOR;
    table.minor = CRYPTO_TABLE_VERSION_MINOR;

    table.sha256_get_context_size = Some(ops::hash::sha256_get_context_size);
    table.sha256_init = Some(ops::hash::sha256_init);
    table.sha256_update = Some(ops::hash::sha256_update);
    table.sha256_final = Some(ops::hash::sha256_final);
    table.sha256_hash_all = Some(ops::hash::sha256_hash_all);

    table.sha384_get_context_size = Some(ops::hash::sha384_get_context_size);
    table.sha384_init = Some(ops::hash::sha384_init);
    table.sha384_update = Some(ops::hash::sha384_update);
    table.sha384_final = Some(ops::hash::sha384_final);
    table.sha384_hash_all = Some(ops::hash::sha384_hash_all);

    table.hmac_sha256_new = Some(ops::mac::hmac_sha256_new);
    table.hmac_sha256_free = Some(ops::mac::hmac_sha256_free);
    table.hmac_sha256_set_key = Some(ops::mac::hmac_sha256_set_key);
    table.hmac_sha256_update = Some(ops::mac::hmac_sha256_update);
    table.hmac_sha256_final = Some(ops::mac::hmac_sha256_final);

    table.random_bytes = Some(ops::random::random_bytes);
    table.get_provider_version = Some(ops::get_provider_version);

    // aead_aes_gcm_*, rsa_pkcs1_verify, pkcs7_verify stay null until the
    // fuller provider build carries them.
}

/// Entry used when a foreign loader starts the binary directly.
#[no_mangle]
pub extern "C" fn crypto_entry(
    capabilities: *const Capabilities,
    out_table: *mut *mut c_void,
    out_size: *mut u32,
) -> Status {
    entry_impl(capabilities, out_table, out_size, SetupMode::RunProviderSetup)
}

/// Entry used when the platform's startup sequence already ran setup; this
/// is the pointer embedded in the constructor token.
#[no_mangle]
pub extern "C" fn crypto_entry_no_setup(
    capabilities: *const Capabilities,
    out_table: *mut *mut c_void,
    out_size: *mut u32,
) -> Status {
    entry_impl(capabilities, out_table, out_size, SetupMode::AssumeReady)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TEST_CAPS;
    use sharedcrypto_common::protocol::table::SHA256_DIGEST_SIZE;

    fn table_size() -> usize {
        core::mem::size_of::<CryptoTable>()
    }

    fn construct() -> Box<CryptoTable> {
        let mut buffer = vec![0u64; table_size().div_ceil(8)].into_boxed_slice();
        let mut out: *mut c_void = buffer.as_mut_ptr() as *mut c_void;
        let mut size = table_size() as u32;
        let status = crypto_entry(&TEST_CAPS, &mut out, &mut size);
        assert_eq!(status, Status::SUCCESS);
        let table = unsafe { Box::from_raw(Box::into_raw(buffer) as *mut CryptoTable) };
        table
    }

    #[test]
    fn size_query_is_idempotent() {
        let mut sizes = Vec::new();
        for _ in 0..3 {
            let mut size: u32 = 0;
            let status = crypto_entry_no_setup(&TEST_CAPS, core::ptr::null_mut(), &mut size);
            assert_eq!(status, Status::BUFFER_TOO_SMALL);
            sizes.push(size);
        }
        assert!(sizes.iter().all(|&s| s as usize == table_size()));
        // Size can be queried before any capabilities exist at all.
        let mut size: u32 = 0;
        let status = crypto_entry_no_setup(core::ptr::null(), core::ptr::null_mut(), &mut size);
        assert_eq!(status, Status::BUFFER_TOO_SMALL);
        assert_eq!(size as usize, table_size());
    }

    #[test]
    fn construct_populates_version_and_slots() {
        let table = construct();
        assert_eq!(table.major, CRYPTO_TABLE_VERSION_MAJOR);
        assert_eq!(table.minor, CRYPTO_TABLE_VERSION_MINOR);
        assert!(table.sha256_hash_all.is_some());
        assert!(table.hmac_sha256_new.is_some());
        assert!(table.random_bytes.is_some());
        // Intentionally unsupported operations are null, not absent.
        assert!(table.aead_aes_gcm_encrypt.is_none());
        assert!(table.rsa_pkcs1_verify.is_none());
        assert!(table.pkcs7_verify.is_none());
    }

    #[test]
    fn construct_is_deterministic() {
        let first = construct();
        let second = construct();
        assert_eq!(first.major, second.major);
        assert_eq!(first.minor, second.minor);
    }

    #[test]
    fn construct_rejects_null_arguments() {
        let mut buffer = vec![0u64; table_size().div_ceil(8)];
        let mut out: *mut c_void = buffer.as_mut_ptr() as *mut c_void;
        let mut size = table_size() as u32;

        // Null capabilities on the construct path
        let status = crypto_entry(core::ptr::null(), &mut out, &mut size);
        assert_eq!(status, Status::INVALID_PARAMETER);

        // Null buffer behind a non-null out pointer
        let mut null_out: *mut c_void = core::ptr::null_mut();
        let status = crypto_entry(&TEST_CAPS, &mut null_out, &mut size);
        assert_eq!(status, Status::INVALID_PARAMETER);
    }

    #[test]
    fn published_sha256_matches_known_vector() {
        let table = construct();
        let hash_all = table.sha256_hash_all.unwrap();
        let mut digest = [0u8; SHA256_DIGEST_SIZE];
        assert!(hash_all(b"abc".as_ptr(), 3, digest.as_mut_ptr()));
        assert_eq!(
            digest[..4],
            [0xBA, 0x78, 0x16, 0xBF],
        );
    }

    #[test]
    fn construct_records_the_capability_reference() {
        let _table = construct();
        let recorded = crate::support::host_interface().expect("host interface recorded");
        assert!(core::ptr::eq(recorded, &TEST_CAPS));
    }
}
