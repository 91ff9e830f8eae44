//! Deterministic trait generator.
//!
//! Maps a seed string to a punk through a seeded linear-congruential PRNG
//! over the frozen rarity tables. The same seed always produces the same
//! `(metadata, payload, punk id)` triple, bit for bit, on every platform --
//! the PRNG is fully specified here rather than delegated to a library RNG
//! whose stream could change between versions.
//!
//! # Derivation
//!
//! 1. `h = SHA-256(seed)`.
//! 2. The 32-bit PRNG state is the XOR-fold of `h`'s eight little-endian
//!    4-byte words; a zero state becomes 1.
//! 3. Type roll: Alien below 0.01, Ape below 0.03, Zombie below 0.06,
//!    Male below 0.53, Female otherwise.
//! 4. Background drawn uniformly over the background table.
//! 5. 2-5 distinct attributes drawn by rejection sampling (at most 100
//!    retries per slot; an exhausted slot ends the draw with the set
//!    obtained so far).
//! 6. Attributes canonicalised ascending, encoded, hashed.

use bitcoin::hashes::{Hash, sha256};

use punks_core::PunkId;

use crate::metadata::PunkMetadata;
use crate::payload::{self, PAYLOAD_LEN};
use crate::tables::{BACKGROUNDS, PunkType};

// ---------------------------------------------------------------------------
// PRNG
// ---------------------------------------------------------------------------

/// LCG multiplier (glibc `rand` family).
const LCG_MULTIPLIER: u32 = 1_103_515_245;

/// LCG increment.
const LCG_INCREMENT: u32 = 12_345;

/// Retry cap per attribute slot during rejection sampling.
const MAX_ATTRIBUTE_RETRIES: u32 = 100;

/// Seeded linear-congruential PRNG with a 2^32 modulus.
struct Lcg {
    state: u32,
}

impl Lcg {
    /// Folds a SHA-256 digest into the initial 32-bit state.
    fn from_digest(digest: &[u8; 32]) -> Self {
        let mut state = 0u32;
        for chunk in digest.chunks_exact(4) {
            state ^= u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        if state == 0 {
            state = 1;
        }
        Self { state }
    }

    /// Advances the state and returns it.
    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// A roll in `[0, 1)`.
    fn next_roll(&mut self) -> f64 {
        f64::from(self.next_u32()) / (u64::from(u32::MAX) + 1) as f64
    }

    /// A uniform index in `[0, n)`.
    fn next_index(&mut self, n: usize) -> usize {
        (self.next_roll() * n as f64) as usize
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// A generated punk: decoded traits plus the canonical payload and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPunk {
    /// Decoded traits.
    pub metadata: PunkMetadata,
    /// Canonical six-byte payload.
    pub payload: [u8; PAYLOAD_LEN],
    /// `SHA-256` of the payload.
    pub punk_id: PunkId,
}

/// Generates a punk deterministically from a seed string.
pub fn generate(seed: &str) -> GeneratedPunk {
    let digest = sha256::Hash::hash(seed.as_bytes()).to_byte_array();
    let mut rng = Lcg::from_digest(&digest);

    let punk_type = draw_type(&mut rng);
    let background = rng.next_index(BACKGROUNDS.len()) as u8;
    let attributes = draw_attributes(&mut rng, punk_type);

    let metadata = PunkMetadata::from_indices(punk_type, background, attributes)
        .expect("drawn indices are within the frozen tables");
    let payload = payload::encode(&metadata).expect("drawn attributes are distinct");
    let punk_id = payload::punk_id_of(&payload);

    GeneratedPunk {
        metadata,
        payload,
        punk_id,
    }
}

/// Rarity thresholds: 1% Alien, 2% Ape, 3% Zombie, 47% Male, 47% Female.
fn draw_type(rng: &mut Lcg) -> PunkType {
    let roll = rng.next_roll();
    if roll < 0.01 {
        PunkType::Alien
    } else if roll < 0.03 {
        PunkType::Ape
    } else if roll < 0.06 {
        PunkType::Zombie
    } else if roll < 0.53 {
        PunkType::Male
    } else {
        PunkType::Female
    }
}

/// Draws 2-5 distinct attribute indices from the type's table.
fn draw_attributes(rng: &mut Lcg, punk_type: PunkType) -> Vec<u8> {
    let table_len = punk_type.attribute_table().len();
    let target = 2 + rng.next_index(4);

    let mut drawn: Vec<u8> = Vec::with_capacity(target);
    'slots: for _ in 0..target {
        for _ in 0..MAX_ATTRIBUTE_RETRIES {
            let idx = rng.next_index(table_len) as u8;
            if !drawn.contains(&idx) {
                drawn.push(idx);
                continue 'slots;
            }
        }
        // Pathological collision streak: stop with the set obtained so far.
        break;
    }
    drawn
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
