//! Host image loader round trips and the malformed-input harness.

use sharedcrypto_common::pe::testsupport::{ImageBuilder, TEXT_RVA};
use sharedcrypto_common::pe::REL_BASED_DIR64;
use sharedcrypto_common::LoaderError;
use sharedcrypto_host::loader::HostImage;
use sharedcrypto_host::mutate;

#[test]
fn roundtrip_resolves_export_at_base_plus_rva() {
    let file = ImageBuilder::new()
        .text(&[0x90; 64])
        .with_export("CryptoEntry", 0x1010)
        .build();

    let image = HostImage::load(&file).unwrap();
    assert_eq!(
        image.find_export("CryptoEntry").unwrap(),
        image.base() + 0x1010
    );
    assert_eq!(
        image.find_export("NotThere"),
        Err(LoaderError::NotFound)
    );
}

#[test]
fn relocations_are_applied_for_the_actual_base() {
    let stored: u64 = ImageBuilder::DEFAULT_BASE + 0x1040;
    let mut text = [0u8; 64];
    text[16..24].copy_from_slice(&stored.to_le_bytes());

    let file = ImageBuilder::new()
        .text(&text)
        .with_reloc_block(TEXT_RVA, &[(16, REL_BASED_DIR64)])
        .build();

    let image = HostImage::load(&file).unwrap();
    let delta = image.base().wrapping_sub(ImageBuilder::DEFAULT_BASE);

    let at = TEXT_RVA as usize + 16;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&image.bytes()[at..at + 8]);
    assert_eq!(u64::from_le_bytes(raw), stored.wrapping_add(delta));
}

#[test]
fn truncated_inputs_are_rejected_structurally() {
    let file = ImageBuilder::new()
        .text(&[0x90; 64])
        .with_export("CryptoEntry", 0x1010)
        .build();

    // Cuts chosen to land inside the header chain, the header block, and
    // a section's raw data respectively.
    for len in [0, 1, 0x3F, 0x40, 0x57, 0x100, 0x200, 0x40A] {
        let truncated = &file[..len];
        assert!(
            HostImage::load(truncated).is_err(),
            "length {} must not load",
            len
        );
    }
}

#[test]
fn seeded_mutation_sweep_never_panics() {
    let outcome = mutate::exercise_validator(0xC0FF_EE00_1234_5678, 500);
    assert_eq!(outcome.rounds, 500);
    assert_eq!(outcome.loaded + outcome.rejected, 500);
    // A single flipped byte frequently lands in padding; some mutants
    // loading is expected. Every signature-breaking mutant must reject.
    assert!(outcome.rejected > 0);
}

#[test]
fn different_seeds_are_still_structured() {
    for seed in [1u64, 42, 0xDEAD_BEEF, u64::MAX] {
        let outcome = mutate::exercise_validator(seed, 100);
        assert_eq!(outcome.rounds, 100);
    }
}
