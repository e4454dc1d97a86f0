#![no_std]

//! Management-Mode Crypto Loader
//!
//! Restricted-environment bootstrap. The platform mapped and relocated the
//! binary long before this code runs, so there is no image parsing here at
//! all: the entry point arrives through the constructor token the binary's
//! own startup published, and is trusted only after its signature checks
//! out.

pub mod bootstrap;

use sharedcrypto_common::console;
use sharedcrypto_common::services::MmEnvironment;
use sharedcrypto_common::Status;

/// Driver entry handed the environment's service table. The table is owned
/// by the platform and stays valid for the remainder of the boot phase.
#[no_mangle]
pub extern "C" fn mm_crypto_loader_entry(env: *const MmEnvironment) -> Status {
    if env.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let env: &'static MmEnvironment = unsafe { &*env };

    console::init_console(env.debug_print);

    match bootstrap::run(env) {
        Ok(_) => Status::SUCCESS,
        Err(err) => err.into(),
    }
}
