//! End-to-end restricted-environment bootstrap: the binary's driver entry
//! publishes the constructor token, the loader runs the handshake against
//! it, and the published table serves real operations.

use core::ffi::c_void;
use sharedcrypto_bin::driver::{crypto_bin_boot_entry, crypto_bin_mm_entry};
use sharedcrypto_common::guid::{CONSTRUCTOR_TOKEN_GUID, CRYPTO_TABLE_GUID};
use sharedcrypto_common::protocol::table::SHA256_DIGEST_SIZE;
use sharedcrypto_common::protocol::{
    ConstructorToken, CRYPTO_TABLE_VERSION_MAJOR, CRYPTO_TABLE_VERSION_MINOR,
};
use sharedcrypto_common::{LoaderError, Status};
use sharedcrypto_host::platform;
use sharedcrypto_mm_loader::{bootstrap, mm_crypto_loader_entry};

#[test]
fn token_path_end_to_end() {
    let _guard = platform::lock_for_test();

    // The platform startup loads the binary as a driver; its entry
    // publishes the constructor token.
    let status = crypto_bin_mm_entry(&platform::MM_ENV);
    assert_eq!(status, Status::SUCCESS);
    assert!(platform::locate(&CONSTRUCTOR_TOKEN_GUID).is_some());

    // The loader driver runs next and publishes the table.
    let table = bootstrap::run(&platform::MM_ENV).expect("bootstrap succeeds");
    let table = unsafe { table.as_ref() };

    assert_eq!(table.major, CRYPTO_TABLE_VERSION_MAJOR);
    assert_eq!(table.minor, CRYPTO_TABLE_VERSION_MINOR);
    assert_eq!(
        platform::locate(&CRYPTO_TABLE_GUID),
        Some(table as *const _ as *mut c_void)
    );

    // Version gating from a consumer's point of view.
    assert!(table.supports(CRYPTO_TABLE_VERSION_MAJOR, 1));
    assert!(table.supports(CRYPTO_TABLE_VERSION_MAJOR, CRYPTO_TABLE_VERSION_MINOR));
    assert_eq!(
        table.require(CRYPTO_TABLE_VERSION_MAJOR + 1, 0),
        Err(LoaderError::VersionMismatch)
    );

    // A published operation works against a known vector.
    let hash_all = table.sha256_hash_all.expect("sha256 slot populated");
    let mut digest = [0u8; SHA256_DIGEST_SIZE];
    assert!(hash_all(b"abc".as_ptr(), 3, digest.as_mut_ptr()));
    assert_eq!(digest[..4], [0xBA, 0x78, 0x16, 0xBF]);

    // Randomness flows through the injected capability.
    let random_bytes = table.random_bytes.expect("random slot populated");
    let mut buffer = [0u8; 24];
    assert!(random_bytes(buffer.as_mut_ptr(), buffer.len()));
    assert!(buffer.iter().any(|&b| b != 0));

    // Unsupported families are nulls, not absent slots.
    assert!(table.aead_aes_gcm_encrypt.is_none());
    assert!(table.pkcs7_verify.is_none());

    // Exactly the three long-lived records remain in the pool: the token,
    // the capability record, and the table.
    assert_eq!(platform::outstanding_pool(), 3);
}

#[test]
fn loader_entry_reports_success() {
    let _guard = platform::lock_for_test();

    assert_eq!(crypto_bin_mm_entry(&platform::MM_ENV), Status::SUCCESS);
    assert_eq!(mm_crypto_loader_entry(&platform::MM_ENV), Status::SUCCESS);
}

#[test]
fn boot_driver_entry_also_publishes_the_token() {
    let _guard = platform::lock_for_test();

    assert_eq!(
        crypto_bin_boot_entry(&platform::BOOT_ENV_SELFMAP),
        Status::SUCCESS
    );
    assert!(platform::locate(&CONSTRUCTOR_TOKEN_GUID).is_some());
}

#[test]
fn missing_token_is_not_ready_and_leaks_nothing() {
    let _guard = platform::lock_for_test();

    assert_eq!(
        bootstrap::run(&platform::MM_ENV),
        Err(LoaderError::NotReady)
    );
    assert_eq!(platform::outstanding_pool(), 0);
}

#[test]
fn corrupt_token_signature_is_rejected_before_use() {
    let _guard = platform::lock_for_test();

    static BAD_TOKEN: ConstructorToken = ConstructorToken {
        signature: 0x4B43_4142, // not the expected tag
        version: 1,
        entry: None,
    };
    platform::install_interface(
        CONSTRUCTOR_TOKEN_GUID,
        &BAD_TOKEN as *const ConstructorToken as *mut c_void,
    );

    assert_eq!(
        bootstrap::run(&platform::MM_ENV),
        Err(LoaderError::Malformed)
    );
    assert_eq!(platform::outstanding_pool(), 0);
}

#[test]
fn future_token_version_is_unsupported() {
    let _guard = platform::lock_for_test();

    static FUTURE_TOKEN: ConstructorToken = ConstructorToken {
        signature: sharedcrypto_common::protocol::CONSTRUCTOR_TOKEN_SIGNATURE,
        version: 99,
        entry: None,
    };
    platform::install_interface(
        CONSTRUCTOR_TOKEN_GUID,
        &FUTURE_TOKEN as *const ConstructorToken as *mut c_void,
    );

    assert_eq!(
        bootstrap::run(&platform::MM_ENV),
        Err(LoaderError::Unsupported)
    );
    assert_eq!(platform::outstanding_pool(), 0);
}
