//! Malformed-Input Harness
//!
//! Host-side stand-in for the corpus-seeded fuzzing of the validator:
//! start from a well-formed image, apply seeded byte mutations and
//! truncations, and require that every outcome is a structured result.
//! A panic anywhere in the load path fails the harness.

use crate::loader::HostImage;
use sharedcrypto_common::pe::testsupport::ImageBuilder;
use sharedcrypto_common::pe::REL_BASED_DIR64;

/// Small deterministic generator so failures reproduce from the seed.
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    pub fn new(seed: u64) -> Self {
        Xorshift64 {
            state: seed.max(1),
        }
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

#[derive(Debug, Default)]
pub struct MutationOutcome {
    pub rounds: u32,
    pub loaded: u32,
    pub rejected: u32,
}

/// Run `rounds` seeded mutations of a well-formed image through the full
/// load path (validate, map, relocate).
pub fn exercise_validator(seed: u64, rounds: u32) -> MutationOutcome {
    let base = ImageBuilder::new()
        .text(&[0x90; 64])
        .with_export("CryptoEntry", 0x1010)
        .with_reloc_block(0x1000, &[(16, REL_BASED_DIR64)])
        .build();

    let mut rng = Xorshift64::new(seed);
    let mut outcome = MutationOutcome::default();

    for _ in 0..rounds {
        let mut data = base.clone();

        // Either truncate, or flip a handful of bytes, or both.
        if rng.next() % 4 == 0 {
            let keep = (rng.next() as usize) % data.len();
            data.truncate(keep);
        }
        if !data.is_empty() {
            let flips = 1 + (rng.next() as usize) % 8;
            for _ in 0..flips {
                let at = (rng.next() as usize) % data.len();
                data[at] = rng.next() as u8;
            }
        }

        match HostImage::load(&data) {
            Ok(_) => outcome.loaded += 1,
            Err(_) => outcome.rejected += 1,
        }
        outcome.rounds += 1;
    }

    outcome
}
