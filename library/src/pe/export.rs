//! Export Resolver
//!
//! Maps an exported symbol name to an absolute callable address by walking
//! the export directory of a mapped image. Exactly one well-known name is
//! looked up in practice; most images legitimately carry no export
//! directory at all, which reports `NotFound` rather than an error worth
//! logging.

use crate::console_println;
use crate::error::{LoaderError, LoaderResult};
use crate::pe::constants::*;
use crate::pe::parser::PeParser;
use crate::pe::structures::LoadedImage;
use crate::pe::view::ImageView;

struct ExportTables {
    number_of_functions: u32,
    number_of_names: u32,
    functions: u32,
    names: u32,
    ordinals: u32,
}

fn export_tables(image: &LoadedImage) -> LoaderResult<ExportTables> {
    let directory = PeParser::new()
        .data_directory(image.bytes(), DIRECTORY_ENTRY_EXPORT)?
        .ok_or(LoaderError::NotFound)?;

    let dir_end = directory.virtual_address as u64 + directory.size as u64;
    if (directory.size as usize) < EXPORT_DIRECTORY_SIZE || dir_end > image.size() as u64 {
        return Err(LoaderError::Malformed);
    }

    let view = ImageView::new(image.bytes());
    let at = directory.virtual_address as usize;
    Ok(ExportTables {
        number_of_functions: view.read_u32(at + 20)?,
        number_of_names: view.read_u32(at + 24)?,
        functions: view.read_u32(at + 28)?,
        names: view.read_u32(at + 32)?,
        ordinals: view.read_u32(at + 36)?,
    })
}

/// Resolve `name` to an absolute address inside the mapped image.
///
/// Exact, case-sensitive match over the name table; ordinal-only lookup
/// and forwarded exports are not supported.
pub fn find_export(image: &LoadedImage, name: &str) -> LoaderResult<u64> {
    let tables = export_tables(image)?;
    let view = ImageView::new(image.bytes());

    for i in 0..tables.number_of_names as usize {
        let name_rva = view.read_u32(tables.names as usize + i * 4)?;
        let export_name = view.read_cstr(name_rva as usize, MAX_EXPORT_NAME)?;
        if export_name != name.as_bytes() {
            continue;
        }

        let ordinal = view.read_u16(tables.ordinals as usize + i * 2)? as u32;
        if ordinal >= tables.number_of_functions {
            return Err(LoaderError::Malformed);
        }

        let rva = view.read_u32(tables.functions as usize + ordinal as usize * 4)?;
        if rva == 0 || rva as u64 >= image.size() as u64 {
            return Err(LoaderError::Malformed);
        }

        let address = image.base_addr() + rva as u64;
        console_println!(
            "[o] Resolved export '{}' at 0x{:x} (base 0x{:x} + rva 0x{:x})",
            name,
            address,
            image.base_addr(),
            rva
        );
        return Ok(address);
    }

    Err(LoaderError::NotFound)
}

/// Log every exported name, for debugging a freshly loaded image.
pub fn log_exports(image: &LoadedImage) {
    let tables = match export_tables(image) {
        Ok(tables) => tables,
        Err(_) => {
            console_println!("[i] Image has no export directory");
            return;
        }
    };

    let view = ImageView::new(image.bytes());
    console_println!(
        "[i] Export table: {} functions, {} names",
        tables.number_of_functions,
        tables.number_of_names
    );
    for i in 0..tables.number_of_names as usize {
        let name = view
            .read_u32(tables.names as usize + i * 4)
            .and_then(|rva| view.read_cstr(rva as usize, MAX_EXPORT_NAME));
        match name.and_then(|bytes| core::str::from_utf8(bytes).map_err(|_| LoaderError::Malformed))
        {
            Ok(name) => console_println!("    [{}] {}", i, name),
            Err(_) => console_println!("    [{}] <unreadable>", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::loader::ImageMapper;
    use crate::pe::testsupport::{ImageBuilder, TestRegions};

    fn load(builder: ImageBuilder) -> (LoadedImage, TestRegions) {
        let file = builder.build();
        let mut regions = TestRegions::new();
        let image = ImageMapper::new()
            .validate_and_map(&file, &mut regions)
            .unwrap();
        (image, regions)
    }

    #[test]
    fn resolves_export_to_base_plus_rva() {
        let (image, mut regions) = load(
            ImageBuilder::new()
                .text(&[0x90; 64])
                .with_export("CryptoEntry", 0x1020),
        );
        let address = find_export(&image, "CryptoEntry").unwrap();
        assert_eq!(address, image.base_addr() + 0x1020);
        image.release(&mut regions);
    }

    #[test]
    fn example_scenario_entry_at_rva_0x10() {
        // Single .text at VA 0 is not expressible here (sections start at
        // 0x1000), but the property under test is the same: resolved
        // address equals actual base plus stored RVA, independent of the
        // preferred base.
        let (image, mut regions) = load(
            ImageBuilder::new()
                .preferred_base(0x1_4000_0000)
                .text(&[0x90; 64])
                .with_export("Entry", 0x1010),
        );
        assert_eq!(
            find_export(&image, "Entry").unwrap(),
            image.base_addr() + 0x1010
        );
        image.release(&mut regions);
    }

    #[test]
    fn missing_name_reports_not_found() {
        let (image, mut regions) = load(
            ImageBuilder::new()
                .text(&[0x90; 16])
                .with_export("CryptoEntry", 0x1000),
        );
        assert_eq!(
            find_export(&image, "cryptoentry"),
            Err(LoaderError::NotFound)
        );
        assert_eq!(find_export(&image, "Other"), Err(LoaderError::NotFound));
        image.release(&mut regions);
    }

    #[test]
    fn image_without_directory_reports_not_found() {
        let (image, mut regions) = load(ImageBuilder::new().text(&[0x90; 16]));
        assert_eq!(
            find_export(&image, "CryptoEntry"),
            Err(LoaderError::NotFound)
        );
        image.release(&mut regions);
    }

    #[test]
    fn multiple_exports_select_the_right_one() {
        let (image, mut regions) = load(
            ImageBuilder::new()
                .text(&[0x90; 128])
                .with_export("Alpha", 0x1000)
                .with_export("CryptoEntry", 0x1040)
                .with_export("Omega", 0x1060),
        );
        assert_eq!(
            find_export(&image, "CryptoEntry").unwrap(),
            image.base_addr() + 0x1040
        );
        image.release(&mut regions);
    }
}
