//! Host Image Loader
//!
//! The alternate validator/mapper + export-resolver path: load the same
//! binary under a host process, proving the loader contract is portable
//! and exercisable without the platform. Reuses the common mapper with a
//! host region allocator.

use sharedcrypto_common::pe::testsupport::TestRegions;
use sharedcrypto_common::pe::{apply_relocations, find_export, log_exports, ImageMapper, LoadedImage, PeParser};
use sharedcrypto_common::LoaderResult;

/// An image mapped into host memory.
pub struct HostImage {
    image: Option<LoadedImage>,
    regions: TestRegions,
}

impl HostImage {
    /// Validate, map and relocate `bytes`.
    pub fn load(bytes: &[u8]) -> LoaderResult<HostImage> {
        let mut regions = TestRegions::new();
        let mapper = ImageMapper::new();

        let layout = mapper.validate(bytes)?;
        let mut image = mapper.map(bytes, &layout, &mut regions)?;

        if let Err(err) = apply_relocations(&mut image, layout.preferred_base) {
            image.release(&mut regions);
            return Err(err);
        }

        Ok(HostImage {
            image: Some(image),
            regions,
        })
    }

    fn image(&self) -> &LoadedImage {
        // Present from construction until drop.
        self.image.as_ref().expect("image present")
    }

    pub fn base(&self) -> u64 {
        self.image().base_addr()
    }

    pub fn size(&self) -> usize {
        self.image().size()
    }

    pub fn bytes(&self) -> &[u8] {
        self.image().bytes()
    }

    pub fn find_export(&self, name: &str) -> LoaderResult<u64> {
        find_export(self.image(), name)
    }

    /// Log the layout and export table of the mapped image.
    pub fn log_contents(&self, original: &[u8]) {
        if let Ok(layout) = PeParser::new().parse_layout(original) {
            PeParser::new().log_layout(&layout);
        }
        log_exports(self.image());
    }
}

impl Drop for HostImage {
    fn drop(&mut self) {
        if let Some(image) = self.image.take() {
            image.release(&mut self.regions);
        }
    }
}
