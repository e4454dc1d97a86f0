//! Image Mapper
//!
//! Places a validated image into one executable region: zero-fill, copy the
//! header block, copy each section's raw bytes to its virtual address.
//! Validation happens entirely before the region is allocated, so a
//! malformed image never touches memory.

use crate::console_println;
use crate::error::LoaderResult;
use crate::pe::parser::PeParser;
use crate::pe::structures::{ImageLayout, LoadedImage};
use crate::services::RegionAllocator;

/// Loader for validated images
pub struct ImageMapper {
    parser: PeParser,
}

impl ImageMapper {
    pub fn new() -> Self {
        ImageMapper {
            parser: PeParser::new(),
        }
    }

    /// Validate `data` and map it into a fresh region from `regions`.
    /// The caller owns the returned image and must release it through the
    /// same allocator on failure paths.
    pub fn validate_and_map(
        &self,
        data: &[u8],
        regions: &mut dyn RegionAllocator,
    ) -> LoaderResult<LoadedImage> {
        let layout = self.parser.parse_layout(data)?;
        self.map(data, &layout, regions)
    }

    /// Map a pre-validated layout. Split out so callers that already
    /// parsed (for logging, say) do not validate twice.
    pub fn map(
        &self,
        data: &[u8],
        layout: &ImageLayout,
        regions: &mut dyn RegionAllocator,
    ) -> LoaderResult<LoadedImage> {
        let size = layout.size_of_image as usize;
        let base = regions.allocate_region(size)?;

        let mut image = unsafe {
            core::ptr::write_bytes(base.as_ptr(), 0, size);
            LoadedImage::from_raw(base, size, layout.preferred_base)
        };

        let dest = image.bytes_mut();

        // Header block first; extents were validated against both the raw
        // input and the image size.
        let headers = layout.size_of_headers as usize;
        dest[..headers].copy_from_slice(&data[..headers]);

        // Sections with no raw data stay zero (uninitialized data).
        for section in &layout.sections {
            if section.size_of_raw_data == 0 {
                continue;
            }
            let src_start = section.pointer_to_raw_data as usize;
            let src_end = src_start + section.size_of_raw_data as usize;
            let dst_start = section.virtual_address as usize;
            let dst_end = dst_start + section.size_of_raw_data as usize;
            dest[dst_start..dst_end].copy_from_slice(&data[src_start..src_end]);
        }

        console_println!(
            "[o] Mapped image: base=0x{:x} size=0x{:x} ({} sections)",
            image.base_addr(),
            size,
            layout.sections.len()
        );

        Ok(image)
    }

    /// Parse and validate only (delegate to the parser).
    pub fn validate(&self, data: &[u8]) -> LoaderResult<ImageLayout> {
        self.parser.parse_layout(data)
    }
}

impl Default for ImageMapper {
    fn default() -> Self {
        ImageMapper::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::testsupport::{ImageBuilder, TestRegions, TEXT_RVA};
    use crate::LoaderError;

    #[test]
    fn maps_headers_and_sections() {
        let payload = [0xAB; 64];
        let file = ImageBuilder::new().text(&payload).build();
        let mut regions = TestRegions::new();
        let image = ImageMapper::new()
            .validate_and_map(&file, &mut regions)
            .unwrap();

        assert_eq!(image.size(), 0x4000);
        // Header block copied verbatim
        assert_eq!(&image.bytes()[..2], b"MZ");
        // Section raw bytes land at the virtual address
        let text = &image.bytes()[TEXT_RVA as usize..TEXT_RVA as usize + payload.len()];
        assert_eq!(text, &payload);
        // Rest of the region is zero
        assert!(image.bytes()[TEXT_RVA as usize + payload.len()..0x2000]
            .iter()
            .all(|&b| b == 0));

        image.release(&mut regions);
        assert_eq!(regions.outstanding(), 0);
    }

    #[test]
    fn zero_raw_size_section_stays_zero() {
        let file = ImageBuilder::new()
            .text(&[0x90; 16])
            .with_bss(0x3800, 0x100)
            .build();
        let mut regions = TestRegions::new();
        let image = ImageMapper::new()
            .validate_and_map(&file, &mut regions)
            .unwrap();
        assert!(image.bytes()[0x3800..0x3900].iter().all(|&b| b == 0));
        image.release(&mut regions);
    }

    #[test]
    fn malformed_input_allocates_nothing() {
        let mut file = ImageBuilder::new().text(&[0x90; 16]).build();
        file[0] = 0; // break the first signature
        let mut regions = TestRegions::new();
        let err = ImageMapper::new()
            .validate_and_map(&file, &mut regions)
            .unwrap_err();
        assert_eq!(err, LoaderError::Malformed);
        assert_eq!(regions.outstanding(), 0);
    }
}
