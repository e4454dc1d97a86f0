//! Result Table
//!
//! The versioned table of operations the shared binary publishes back to
//! its host. The table is allocated by the bootstrap at the size the
//! binary reports, populated in place, and never resized. Operations the
//! binary does not carry are published as null rather than omitted, so
//! slot positions stay stable across minor versions; callers null-check
//! before invoking.

use core::ffi::c_void;

pub const CRYPTO_TABLE_VERSION_MAJOR: u16 = 1;
pub const CRYPTO_TABLE_VERSION_MINOR: u16 = 2;

// Digest sizes for the hash families carried in the table.
pub const SHA256_DIGEST_SIZE: usize = 32;
pub const SHA384_DIGEST_SIZE: usize = 48;

// Context-based hash operations: the caller provides opaque context
// storage of the advertised size, pool-aligned.
pub type HashGetContextSizeFn = extern "C" fn() -> usize;
pub type HashInitFn = extern "C" fn(context: *mut c_void) -> bool;
pub type HashUpdateFn = extern "C" fn(context: *mut c_void, data: *const u8, len: usize) -> bool;
/// Finalizing consumes the context; it must be re-initialized before reuse.
pub type HashFinalFn = extern "C" fn(context: *mut c_void, digest: *mut u8) -> bool;
pub type HashAllFn = extern "C" fn(data: *const u8, len: usize, digest: *mut u8) -> bool;

// MAC operations allocate their context through the injected allocator.
pub type MacNewFn = extern "C" fn() -> *mut c_void;
pub type MacFreeFn = extern "C" fn(context: *mut c_void);
pub type MacSetKeyFn = extern "C" fn(context: *mut c_void, key: *const u8, key_len: usize) -> bool;
pub type MacUpdateFn = extern "C" fn(context: *mut c_void, data: *const u8, len: usize) -> bool;
pub type MacFinalFn = extern "C" fn(context: *mut c_void, out: *mut u8) -> bool;

pub type RandomBytesFn = extern "C" fn(out: *mut u8, len: usize) -> bool;
/// NUL-terminated static provider identification string.
pub type VersionStringFn = extern "C" fn() -> *const u8;

// Families declared for layout stability but supplied by a fuller
// provider build; published null here.
pub type AeadAesGcmFn = extern "C" fn(
    key: *const u8,
    key_len: usize,
    iv: *const u8,
    iv_len: usize,
    aad: *const u8,
    aad_len: usize,
    data: *const u8,
    data_len: usize,
    tag: *mut u8,
    tag_len: usize,
    out: *mut u8,
    out_len: *mut usize,
) -> bool;
pub type RsaPkcs1VerifyFn = extern "C" fn(
    key_n: *const u8,
    key_n_len: usize,
    key_e: *const u8,
    key_e_len: usize,
    message_hash: *const u8,
    hash_len: usize,
    signature: *const u8,
    signature_len: usize,
) -> bool;
pub type Pkcs7VerifyFn = extern "C" fn(
    p7_data: *const u8,
    p7_len: usize,
    trusted_cert: *const u8,
    cert_len: usize,
    content: *const u8,
    content_len: usize,
) -> bool;

/// Operation table published by the shared binary.
#[repr(C)]
pub struct CryptoTable {
    pub major: u16,
    pub minor: u16,
    pub reserved: u32,

    // SHA-256
    pub sha256_get_context_size: Option<HashGetContextSizeFn>,
    pub sha256_init: Option<HashInitFn>,
    pub sha256_update: Option<HashUpdateFn>,
    pub sha256_final: Option<HashFinalFn>,
    pub sha256_hash_all: Option<HashAllFn>,

    // SHA-384
    pub sha384_get_context_size: Option<HashGetContextSizeFn>,
    pub sha384_init: Option<HashInitFn>,
    pub sha384_update: Option<HashUpdateFn>,
    pub sha384_final: Option<HashFinalFn>,
    pub sha384_hash_all: Option<HashAllFn>,

    // HMAC-SHA256
    pub hmac_sha256_new: Option<MacNewFn>,
    pub hmac_sha256_free: Option<MacFreeFn>,
    pub hmac_sha256_set_key: Option<MacSetKeyFn>,
    pub hmac_sha256_update: Option<MacUpdateFn>,
    pub hmac_sha256_final: Option<MacFinalFn>,

    // Randomness
    pub random_bytes: Option<RandomBytesFn>,

    // Info
    pub get_provider_version: Option<VersionStringFn>,

    // Provider-absent families, position-stable nulls
    pub aead_aes_gcm_encrypt: Option<AeadAesGcmFn>,
    pub aead_aes_gcm_decrypt: Option<AeadAesGcmFn>,
    pub rsa_pkcs1_verify: Option<RsaPkcs1VerifyFn>,
    pub pkcs7_verify: Option<Pkcs7VerifyFn>,
}

impl CryptoTable {
    /// Version gate: an operation gated on `(major, minor)` may be invoked
    /// only when the table majors match and the table minor is at least
    /// the required one. A major mismatch means the whole layout is
    /// suspect and the table must not be used at all.
    pub fn supports(&self, major: u16, minor: u16) -> bool {
        self.major == major && self.minor >= minor
    }

    /// Result-flavored version gate for callers threading `?`.
    pub fn require(&self, major: u16, minor: u16) -> crate::LoaderResult<()> {
        if self.supports(major, minor) {
            Ok(())
        } else {
            Err(crate::LoaderError::VersionMismatch)
        }
    }
}
