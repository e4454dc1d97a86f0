//! Environment Driver Entries
//!
//! When the platform's own startup sequence loads the binary as a regular
//! driver, these entries run. They perform the one-time provider setup and
//! publish the constructor token so a later bootstrap can obtain the entry
//! point without parsing the image — the restricted environment has no
//! other way in.

use crate::entry::crypto_entry_no_setup;
use crate::support;
use core::ffi::c_void;
use sharedcrypto_common::guid::CONSTRUCTOR_TOKEN_GUID;
use sharedcrypto_common::protocol::ConstructorToken;
use sharedcrypto_common::services::{AllocatePoolFn, BootEnvironment, FreePoolFn, InstallProtocolFn, MmEnvironment};
use sharedcrypto_common::Status;

fn publish_token(
    allocate_pool: AllocatePoolFn,
    free_pool: FreePoolFn,
    install_protocol: InstallProtocolFn,
) -> Status {
    if !support::ensure_provider_ready() {
        return Status::DEVICE_ERROR;
    }

    let token = allocate_pool(core::mem::size_of::<ConstructorToken>());
    if token.is_null() || (token as usize) % core::mem::align_of::<ConstructorToken>() != 0 {
        return Status::OUT_OF_RESOURCES;
    }

    unsafe {
        core::ptr::write(
            token as *mut ConstructorToken,
            ConstructorToken::new(crypto_entry_no_setup),
        )
    };

    let status = install_protocol(&CONSTRUCTOR_TOKEN_GUID, token);
    if status.is_error() {
        free_pool(token as *mut c_void);
        return status;
    }

    Status::SUCCESS
}

/// Driver entry for the full environment.
#[no_mangle]
pub extern "C" fn crypto_bin_boot_entry(env: *const BootEnvironment) -> Status {
    if env.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // The environment table is owned by the platform for the whole boot.
    let env = unsafe { &*env };
    publish_token(env.allocate_pool, env.free_pool, env.install_protocol)
}

/// Driver entry for the restricted environment.
#[no_mangle]
pub extern "C" fn crypto_bin_mm_entry(env: *const MmEnvironment) -> Status {
    if env.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let env = unsafe { &*env };
    publish_token(env.allocate_pool, env.free_pool, env.install_protocol)
}
