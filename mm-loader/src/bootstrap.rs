//! Restricted-Environment Bootstrap
//!
//! Idle → TokenLocated → EntryResolved → SizeQueried → Constructed →
//! Installed. Discovery, mapping and relocation are skipped entirely; the
//! image was placed by the platform before this environment existed.

use core::ffi::c_void;
use core::ptr::NonNull;
use sharedcrypto_common::guid::{CONSTRUCTOR_TOKEN_GUID, CRYPTO_TABLE_GUID};
use sharedcrypto_common::protocol::{
    construct_table, BootstrapPhase, Capabilities, ConstructorToken, CryptoEntryFn, CryptoTable,
};
use sharedcrypto_common::services::MmEnvironment;
use sharedcrypto_common::{console_errorln, console_println};
use sharedcrypto_common::{LoaderError, LoaderResult};

/// Run one bootstrap attempt against the environment.
pub fn run(env: &'static MmEnvironment) -> LoaderResult<NonNull<CryptoTable>> {
    let mut phase = BootstrapPhase::Idle;
    let result = run_steps(env, &mut phase);
    match &result {
        Ok(table) => {
            console_println!(
                "[o] MM crypto bootstrap installed (table at 0x{:x})",
                table.as_ptr() as usize
            );
        }
        Err(LoaderError::NotReady) => {
            console_println!("[i] Constructor token not present; continuing without crypto");
        }
        Err(err) => {
            console_errorln!("[x] MM crypto bootstrap failed at {}: {}", phase.name(), err);
        }
    }
    result
}

fn run_steps(
    env: &'static MmEnvironment,
    phase: &mut BootstrapPhase,
) -> LoaderResult<NonNull<CryptoTable>> {
    let entry = locate_entry(env, phase)?;
    *phase = BootstrapPhase::EntryResolved;

    let capabilities = install_capabilities(env)?;
    *phase = BootstrapPhase::SizeQueried;

    let table = match construct_table(entry, unsafe { capabilities.as_ref() }) {
        Ok(table) => table,
        Err(err) => {
            (env.free_pool)(capabilities.as_ptr() as *mut c_void);
            return Err(err);
        }
    };
    *phase = BootstrapPhase::Constructed;

    let status = (env.install_protocol)(&CRYPTO_TABLE_GUID, table.as_ptr() as *mut c_void);
    if status.is_error() {
        (env.free_pool)(table.as_ptr() as *mut c_void);
        (env.free_pool)(capabilities.as_ptr() as *mut c_void);
        let err = status.to_result().err().unwrap_or(LoaderError::Unsupported);
        return Err(err);
    }

    *phase = BootstrapPhase::Installed;
    console_println!("[o] Crypto table published under {}", CRYPTO_TABLE_GUID);
    Ok(table)
}

/// Retrieve and validate the constructor token. The embedded pointer is
/// not touched until the signature and version check out.
fn locate_entry(
    env: &'static MmEnvironment,
    phase: &mut BootstrapPhase,
) -> LoaderResult<CryptoEntryFn> {
    let mut interface: *mut c_void = core::ptr::null_mut();
    let status = (env.locate_protocol)(&CONSTRUCTOR_TOKEN_GUID, &mut interface);
    if status.is_error() || interface.is_null() {
        return Err(LoaderError::NotReady);
    }
    *phase = BootstrapPhase::TokenLocated;

    let token = unsafe { &*(interface as *const ConstructorToken) };
    token.validate()
}

/// Build the capability record for this environment: no time-of-day
/// service, and randomness only if the platform carries it here.
fn install_capabilities(env: &'static MmEnvironment) -> LoaderResult<NonNull<Capabilities>> {
    let buffer = (env.allocate_pool)(core::mem::size_of::<Capabilities>());
    let buffer = NonNull::new(buffer as *mut Capabilities).ok_or(LoaderError::OutOfResources)?;
    if (buffer.as_ptr() as usize) % core::mem::align_of::<Capabilities>() != 0 {
        (env.free_pool)(buffer.as_ptr() as *mut c_void);
        return Err(LoaderError::OutOfResources);
    }

    let get_random_64 = env.get_random_64.unwrap_or(random_unavailable);

    unsafe {
        core::ptr::write(
            buffer.as_ptr(),
            Capabilities::new(
                env.allocate_pool,
                env.free_pool,
                None,
                env.debug_print,
                get_random_64,
            ),
        );
    }
    Ok(buffer)
}

/// Stand-in randomness capability for platforms without entropy in this
/// environment; requests fail cleanly instead of faking entropy.
extern "C" fn random_unavailable(_out: *mut u64) -> bool {
    false
}
