//! Full-Environment Bootstrap
//!
//! Idle → Discovered → Mapped → Relocated → EntryResolved → SizeQueried →
//! Constructed → Installed. The raw section bytes are released as soon as
//! mapping completes on every path; the image region, capability record
//! and table buffer are released on each failure path after they exist, so
//! a failed attempt leaves no allocation behind.

use crate::rng;
use core::ffi::c_void;
use core::ptr::NonNull;
use sharedcrypto_common::guid::{CRYPTO_BINARY_FILE_GUID, CRYPTO_TABLE_GUID};
use sharedcrypto_common::pe::{apply_relocations, find_export, log_exports, ImageMapper, LoadedImage};
use sharedcrypto_common::protocol::{
    construct_table, BootstrapPhase, Capabilities, CryptoEntryFn, CryptoTable, ENTRY_SYMBOL,
};
use sharedcrypto_common::services::{
    self, BootEnvironment, RegionAllocator, SectionData, UnloadImageFn,
};
use sharedcrypto_common::{console_errorln, console_println};
use sharedcrypto_common::{LoaderError, LoaderResult};

/// Run one bootstrap attempt against the environment.
pub fn run(env: &'static BootEnvironment) -> LoaderResult<NonNull<CryptoTable>> {
    let mut phase = BootstrapPhase::Idle;
    let result = run_steps(env, &mut phase);
    match &result {
        Ok(table) => {
            console_println!(
                "[o] Boot crypto bootstrap installed (table at 0x{:x})",
                table.as_ptr() as usize
            );
        }
        Err(LoaderError::NotReady) => {
            console_println!("[i] Shared crypto binary not present; continuing without it");
        }
        Err(err) => {
            console_errorln!(
                "[x] Boot crypto bootstrap failed at {}: {}",
                phase.name(),
                err
            );
        }
    }
    result
}

fn run_steps(
    env: &'static BootEnvironment,
    phase: &mut BootstrapPhase,
) -> LoaderResult<NonNull<CryptoTable>> {
    console_println!(
        "[i] Boot crypto loader: searching for binary {}",
        CRYPTO_BINARY_FILE_GUID
    );
    let section = services::find_firmware_section(
        env.find_firmware_section,
        env.free_pool,
        &CRYPTO_BINARY_FILE_GUID,
    )?;
    *phase = BootstrapPhase::Discovered;
    console_println!("[o] Binary discovered ({} bytes)", section.len());

    // The section guard frees the raw bytes when this call returns,
    // whether mapping succeeded or not.
    let binary = map_binary(env, phase, section)?;

    match complete_handshake(env, phase, &binary.image) {
        Ok(table) => {
            *phase = BootstrapPhase::Installed;
            Ok(table)
        }
        Err(err) => {
            binary.release(env);
            Err(err)
        }
    }
}

/// A mapped binary plus how to dispose of it on failure.
struct MappedBinary {
    image: LoadedImage,
    disposal: Disposal,
}

enum Disposal {
    Native(Option<UnloadImageFn>),
    Region,
}

impl MappedBinary {
    fn release(self, env: &'static BootEnvironment) {
        let base = self.image.base_ptr();
        let size = self.image.size();
        match self.disposal {
            Disposal::Native(Some(unload)) => {
                unload(base.as_ptr() as *mut c_void, size as u64);
            }
            Disposal::Native(None) => {}
            Disposal::Region => {
                self.image.release(&mut EnvRegions { env });
            }
        }
    }
}

struct EnvRegions {
    env: &'static BootEnvironment,
}

impl RegionAllocator for EnvRegions {
    fn allocate_region(&mut self, size: usize) -> LoaderResult<NonNull<u8>> {
        let base = (self.env.allocate_image_region)(size);
        NonNull::new(base as *mut u8).ok_or(LoaderError::OutOfResources)
    }

    fn free_region(&mut self, base: NonNull<u8>, size: usize) {
        (self.env.free_image_region)(base.as_ptr() as *mut c_void, size);
    }
}

fn map_binary(
    env: &'static BootEnvironment,
    phase: &mut BootstrapPhase,
    section: SectionData,
) -> LoaderResult<MappedBinary> {
    if let Some(load_image) = env.load_image {
        // The platform loader maps and relocates in one step.
        let mut base: *mut c_void = core::ptr::null_mut();
        let mut size: u64 = 0;
        let status = load_image(
            section.bytes().as_ptr() as *const c_void,
            section.len(),
            &mut base,
            &mut size,
        );
        if status.is_error() {
            let err = status.to_result().err().unwrap_or(LoaderError::Malformed);
            return Err(err);
        }
        let base = NonNull::new(base as *mut u8).ok_or(LoaderError::Malformed)?;
        if size == 0 {
            return Err(LoaderError::Malformed);
        }
        *phase = BootstrapPhase::Mapped;

        // Already repositioned, so the preferred base equals the actual
        // base and relocation below is a no-op by construction.
        let image = unsafe { LoadedImage::from_raw(base, size as usize, base.as_ptr() as u64) };
        *phase = BootstrapPhase::Relocated;
        Ok(MappedBinary {
            image,
            disposal: Disposal::Native(env.unload_image),
        })
    } else {
        let mut regions = EnvRegions { env };
        let mapper = ImageMapper::new();
        let layout = mapper.validate(section.bytes())?;
        let mut image = mapper.map(section.bytes(), &layout, &mut regions)?;
        *phase = BootstrapPhase::Mapped;

        match apply_relocations(&mut image, layout.preferred_base) {
            Ok(()) => {
                *phase = BootstrapPhase::Relocated;
                Ok(MappedBinary {
                    image,
                    disposal: Disposal::Region,
                })
            }
            Err(err) => {
                image.release(&mut regions);
                Err(err)
            }
        }
    }
}

fn complete_handshake(
    env: &'static BootEnvironment,
    phase: &mut BootstrapPhase,
    image: &LoadedImage,
) -> LoaderResult<NonNull<CryptoTable>> {
    log_exports(image);

    let address = find_export(image, ENTRY_SYMBOL)?;
    let entry: CryptoEntryFn = unsafe { core::mem::transmute(address as usize) };
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

    console_println!("[o] Crypto table published under {}", CRYPTO_TABLE_GUID);
    Ok(table)
}

/// Build the capability record for this environment. It lives in the pool
/// past this driver: the binary keeps a process-wide reference for as long
/// as the published table can be called.
fn install_capabilities(env: &'static BootEnvironment) -> LoaderResult<NonNull<Capabilities>> {
    let buffer = (env.allocate_pool)(core::mem::size_of::<Capabilities>());
    let buffer = NonNull::new(buffer as *mut Capabilities).ok_or(LoaderError::OutOfResources)?;
    if (buffer.as_ptr() as usize) % core::mem::align_of::<Capabilities>() != 0 {
        (env.free_pool)(buffer.as_ptr() as *mut c_void);
        return Err(LoaderError::OutOfResources);
    }

    unsafe {
        core::ptr::write(
            buffer.as_ptr(),
            Capabilities::new(
                env.allocate_pool,
                env.free_pool,
                env.get_time,
                env.debug_print,
                rng::lazy_get_random_64,
            ),
        );
    }
    Ok(buffer)
}
