//! Base Relocation Applier
//!
//! Adjusts absolute address fields in a mapped image for the difference
//! between its preferred and actual load address. Every block header and
//! fixup target is bounds-checked against the mapped extent before any
//! write.
//!
//! An unrecognized directive kind fails the load. The alternative of
//! skipping it leaves a partially relocated image whose stale absolute
//! addresses surface much later as wild calls.

use crate::console_errorln;
use crate::console_println;
use crate::error::{LoaderError, LoaderResult};
use crate::pe::constants::*;
use crate::pe::parser::PeParser;
use crate::pe::structures::LoadedImage;

/// Apply base relocations for the image's actual load address.
/// A zero delta (image landed at its preferred base, or the platform's
/// native loader already relocated it) is a no-op.
pub fn apply_relocations(image: &mut LoadedImage, preferred_base: u64) -> LoaderResult<()> {
    let delta = image.base_addr().wrapping_sub(preferred_base);
    if delta == 0 {
        return Ok(());
    }

    let directory = PeParser::new().data_directory(image.bytes(), DIRECTORY_ENTRY_BASERELOC)?;
    let directory = match directory {
        Some(dir) => dir,
        // A fully position-independent image may carry no relocations.
        None => return Ok(()),
    };

    let image_size = image.size() as u64;
    let dir_start = directory.virtual_address as u64;
    let dir_end = dir_start + directory.size as u64;
    if dir_end > image_size {
        return Err(LoaderError::Malformed);
    }

    let mut applied: u32 = 0;
    let mut cursor = dir_start;
    while cursor + RELOCATION_BLOCK_HEADER_SIZE as u64 <= dir_end {
        let page_rva = read_u32(image.bytes(), cursor as usize);
        let block_size = read_u32(image.bytes(), cursor as usize + 4) as u64;

        if block_size == 0 {
            break;
        }
        if block_size < RELOCATION_BLOCK_HEADER_SIZE as u64 || cursor + block_size > dir_end {
            return Err(LoaderError::Malformed);
        }

        let entry_count = (block_size as usize - RELOCATION_BLOCK_HEADER_SIZE) / 2;
        for i in 0..entry_count {
            let entry_offset = cursor as usize + RELOCATION_BLOCK_HEADER_SIZE + i * 2;
            let entry = read_u16(image.bytes(), entry_offset);
            let kind = (entry >> 12) as u8;
            let page_offset = (entry & 0x0FFF) as u64;
            let target = page_rva as u64 + page_offset;

            match kind {
                REL_BASED_ABSOLUTE => {} // alignment padding
                REL_BASED_HIGHLOW => {
                    if target + 4 > image_size {
                        return Err(LoaderError::Malformed);
                    }
                    let at = target as usize;
                    let bytes = image.bytes_mut();
                    let value = u32::from_le_bytes([
                        bytes[at],
                        bytes[at + 1],
                        bytes[at + 2],
                        bytes[at + 3],
                    ]);
                    let fixed = value.wrapping_add(delta as u32);
                    bytes[at..at + 4].copy_from_slice(&fixed.to_le_bytes());
                    applied += 1;
                }
                REL_BASED_DIR64 => {
                    if target + 8 > image_size {
                        return Err(LoaderError::Malformed);
                    }
                    let at = target as usize;
                    let bytes = image.bytes_mut();
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&bytes[at..at + 8]);
                    let fixed = u64::from_le_bytes(raw).wrapping_add(delta);
                    bytes[at..at + 8].copy_from_slice(&fixed.to_le_bytes());
                    applied += 1;
                }
                other => {
                    console_errorln!(
                        "[x] Unrecognized relocation kind {} at page 0x{:x}; failing the load",
                        other,
                        page_rva
                    );
                    return Err(LoaderError::Malformed);
                }
            }
        }

        cursor += block_size;
    }

    console_println!(
        "[o] Applied {} relocations (delta=0x{:x})",
        applied,
        delta
    );
    Ok(())
}

// Block walking reads stay within `dir_end`, which was checked against the
// mapped extent above, so these never leave the slice.
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::loader::ImageMapper;
    use crate::pe::testsupport::{ImageBuilder, TestRegions, TEXT_RVA};

    fn mapped(builder: ImageBuilder) -> (LoadedImage, TestRegions) {
        let file = builder.build();
        let mut regions = TestRegions::new();
        let image = ImageMapper::new()
            .validate_and_map(&file, &mut regions)
            .unwrap();
        (image, regions)
    }

    fn preferred_for_delta(image: &LoadedImage, delta: u64) -> u64 {
        image.base_addr().wrapping_sub(delta)
    }

    #[test]
    fn dir64_adds_delta_exactly() {
        let stored: u64 = 0x1_4000_1234;
        let mut text = [0u8; 64];
        text[16..24].copy_from_slice(&stored.to_le_bytes());

        let (mut image, mut regions) = mapped(
            ImageBuilder::new()
                .text(&text)
                .with_reloc_block(TEXT_RVA, &[(16, REL_BASED_DIR64)]),
        );

        let delta: u64 = 0x7E_F000_0000;
        let preferred = preferred_for_delta(&image, delta);
        apply_relocations(&mut image, preferred).unwrap();

        let at = TEXT_RVA as usize + 16;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&image.bytes()[at..at + 8]);
        assert_eq!(u64::from_le_bytes(raw), stored.wrapping_add(delta));
        image.release(&mut regions);
    }

    #[test]
    fn highlow_wraps_modulo_32_bits() {
        let stored: u32 = 0xFFFF_FFF0;
        let mut text = [0u8; 32];
        text[8..12].copy_from_slice(&stored.to_le_bytes());

        let (mut image, mut regions) = mapped(
            ImageBuilder::new()
                .text(&text)
                .with_reloc_block(TEXT_RVA, &[(8, REL_BASED_HIGHLOW)]),
        );

        let delta: u64 = 0x20;
        let preferred = preferred_for_delta(&image, delta);
        apply_relocations(&mut image, preferred).unwrap();

        let at = TEXT_RVA as usize + 8;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&image.bytes()[at..at + 4]);
        assert_eq!(u32::from_le_bytes(raw), stored.wrapping_add(delta as u32));
        image.release(&mut regions);
    }

    #[test]
    fn absolute_entries_are_padding() {
        let text = [0x55u8; 32];
        let (mut image, mut regions) = mapped(
            ImageBuilder::new()
                .text(&text)
                .with_reloc_block(TEXT_RVA, &[(4, REL_BASED_ABSOLUTE)]),
        );

        let preferred = preferred_for_delta(&image, 0x1000);
        apply_relocations(&mut image, preferred).unwrap();
        assert_eq!(&image.bytes()[TEXT_RVA as usize..TEXT_RVA as usize + 32], &text);
        image.release(&mut regions);
    }

    #[test]
    fn zero_delta_is_a_noop_even_with_bad_directives() {
        let (mut image, mut regions) = mapped(
            ImageBuilder::new()
                .text(&[0x90; 16])
                .with_reloc_block(TEXT_RVA, &[(0, 7)]), // kind 7 is not supported
        );
        let preferred = image.base_addr();
        assert_eq!(apply_relocations(&mut image, preferred), Ok(()));
        image.release(&mut regions);
    }

    #[test]
    fn unknown_kind_fails_the_load() {
        let (mut image, mut regions) = mapped(
            ImageBuilder::new()
                .text(&[0x90; 16])
                .with_reloc_block(TEXT_RVA, &[(0, 7)]),
        );
        let preferred = preferred_for_delta(&image, 0x1000);
        assert_eq!(
            apply_relocations(&mut image, preferred),
            Err(LoaderError::Malformed)
        );
        image.release(&mut regions);
    }

    #[test]
    fn out_of_range_target_fails() {
        // Offset 0xFF8 in the last page: target + 8 crosses the image end.
        let (mut image, mut regions) = mapped(
            ImageBuilder::new()
                .text(&[0x90; 16])
                .with_reloc_block(0x3000, &[(0xFFC, REL_BASED_DIR64)]),
        );
        let preferred = preferred_for_delta(&image, 0x1000);
        assert_eq!(
            apply_relocations(&mut image, preferred),
            Err(LoaderError::Malformed)
        );
        image.release(&mut regions);
    }

    #[test]
    fn image_without_relocations_is_fine() {
        let (mut image, mut regions) = mapped(ImageBuilder::new().text(&[0x90; 16]));
        let preferred = preferred_for_delta(&image, 0x5000);
        assert_eq!(apply_relocations(&mut image, preferred), Ok(()));
        image.release(&mut regions);
    }
}
