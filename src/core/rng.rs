//! Seeded Random Number Generator
//!
//! Xorshift128+ behind a small API: raw words, unit floats, ranges
//! and coin flips. Every room owns one generator, so serve angles and
//! directions replay exactly from the room seed.

use sha2::{Digest, Sha256};

/// Xorshift128+ generator.
///
/// Equal seeds yield equal sequences on every platform.
///
/// # Example
///
/// ```
/// use pong_arena::core::rng::SeededRng;
///
/// let mut a = SeededRng::new(7);
/// let mut b = SeededRng::new(7);
/// assert_eq!(a.next_f64(), b.next_f64());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeededRng {
    lanes: [u64; 2],
}

impl Default for SeededRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SeededRng {
    /// Seed the generator. Both lanes are filled by SplitMix64, so
    /// small or sequential seeds still start far apart.
    pub fn new(seed: u64) -> Self {
        let mut cursor = seed;
        let lanes = [splitmix64(&mut cursor), splitmix64(&mut cursor)];

        // all-zero lanes would only ever produce zero
        if lanes == [0, 0] {
            return Self { lanes: [1, 1] };
        }
        Self { lanes }
    }

    /// Next raw 64-bit word.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let [a, mut b] = self.lanes;
        let out = a.wrapping_add(b);

        b ^= a;
        self.lanes = [a.rotate_left(24) ^ b ^ (b << 16), b.rotate_left(37)];

        out
    }

    /// Float in `[0, 1)` built from the top 53 bits.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Float in `[min, max)`; `min` when the range is empty.
    #[inline]
    pub fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            min
        } else {
            min + self.next_f64() * (max - min)
        }
    }

    /// Fair coin flip.
    #[inline]
    pub fn next_bool(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }
}

#[inline]
fn splitmix64(cursor: &mut u64) -> u64 {
    *cursor = cursor.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *cursor;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive a room seed from its code and a caller-chosen salt.
///
/// The server salts with the room's creation time, so two matches
/// played under the same code do not share serves.
pub fn derive_room_seed(code: &str, salt: u64) -> u64 {
    let digest = Sha256::new()
        .chain_update(b"PONG_ARENA_SEED_V1")
        .chain_update(code.as_bytes())
        .chain_update(salt.to_le_bytes())
        .finalize();

    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededRng::new(2024);
        let mut b = a.clone();
        let mut c = SeededRng::new(2024);

        for _ in 0..500 {
            let x = a.next_u64();
            assert_eq!(x, b.next_u64());
            assert_eq!(x, c.next_u64());
        }
    }

    #[test]
    fn test_seeds_diverge() {
        let mut a = SeededRng::new(1);
        let mut b = SeededRng::new(2);

        let xs: Vec<u64> = (0..8).map(|_| a.next_u64()).collect();
        let ys: Vec<u64> = (0..8).map(|_| b.next_u64()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_next_f64_unit_interval() {
        let mut rng = SeededRng::new(9999);

        for _ in 0..1000 {
            let val = rng.next_f64();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_next_f64_range() {
        let mut rng = SeededRng::new(5678);

        for _ in 0..1000 {
            let val = rng.next_f64_range(-0.5, 0.5);
            assert!((-0.5..0.5).contains(&val));
        }

        assert_eq!(rng.next_f64_range(3.0, 3.0), 3.0);
        assert_eq!(rng.next_f64_range(4.0, 1.0), 4.0);
    }

    #[test]
    fn test_next_bool_produces_both() {
        let mut rng = SeededRng::new(42);
        let flips: Vec<bool> = (0..64).map(|_| rng.next_bool()).collect();

        assert!(flips.contains(&true));
        assert!(flips.contains(&false));
    }

    #[test]
    fn test_derive_room_seed() {
        let seed = derive_room_seed("ABCD", 7);
        assert_eq!(seed, derive_room_seed("ABCD", 7));

        assert_ne!(seed, derive_room_seed("ABCE", 7));
        assert_ne!(seed, derive_room_seed("ABCD", 8));
    }
}
