//! Injectable randomness for dice, card draws, and setup shuffles.
//!
//! The engine never touches a system RNG. Every randomness point (combat
//! dice, card draws, research dice, the initial territory shuffle) goes
//! through the [`Dice`] trait so games replay deterministically from a seed.

/// Source of randomness for the engine.
pub trait Dice {
    /// Generate a random number in range [0, max).
    fn next_range(&mut self, max: u32) -> u32;

    /// Roll a single six-sided die (1-6).
    fn roll_d6(&mut self) -> u8 {
        (self.next_range(6) + 1) as u8
    }
}

/// Shuffle a slice in place (Fisher-Yates).
pub fn shuffle<T>(rng: &mut dyn Dice, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.next_range(i as u32 + 1) as usize;
        items.swap(i, j);
    }
}

/// A deterministic random number generator using xorshift.
///
/// This simple PRNG ensures that the same seed always produces
/// the same sequence of random numbers across all platforms.
#[derive(Clone, Debug)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    /// Create a new RNG from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        // Combine seed bytes into initial state using a mixing function
        // to ensure different seeds produce different states
        let mut state: u64 = 0xcbf29ce484222325; // FNV offset basis
        for &byte in seed.iter() {
            state ^= byte as u64;
            state = state.wrapping_mul(0x100000001b3); // FNV prime
        }
        // Ensure non-zero state
        if state == 0 {
            state = 0x853c49e6748fea9b;
        }
        Self { state }
    }

    /// Generate next random u64.
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate a random u32.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }
}

impl Dice for SeededRng {
    fn next_range(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }
}

/// A scripted dice source that replays a fixed list of values (useful for
/// testing exact combat outcomes).
///
/// Each queued value is returned modulo the requested range; when the script
/// runs out it wraps around to the beginning.
#[derive(Clone, Debug)]
pub struct FixedDice {
    values: Vec<u32>,
    cursor: usize,
}

impl FixedDice {
    /// Script raw `next_range` outputs.
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Script d6 faces (1-6): `rolls(vec![1, 6])` yields a 1 then a 6.
    pub fn rolls(faces: Vec<u8>) -> Self {
        Self::new(faces.into_iter().map(|f| (f - 1) as u32).collect())
    }
}

impl Dice for FixedDice {
    fn next_range(&mut self, max: u32) -> u32 {
        if max == 0 || self.values.is_empty() {
            return 0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value % max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_deterministic() {
        let mut a = SeededRng::from_seed(&[7u8; 32]);
        let mut b = SeededRng::from_seed(&[7u8; 32]);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = SeededRng::from_seed(&[1u8; 32]);
        let mut b = SeededRng::from_seed(&[2u8; 32]);
        let same = (0..10).filter(|_| a.next_u64() == b.next_u64()).count();
        assert!(same < 10);
    }

    #[test]
    fn test_d6_range() {
        let mut rng = SeededRng::from_seed(&[42u8; 32]);
        for _ in 0..1000 {
            let roll = rng.roll_d6();
            assert!((1..=6).contains(&roll));
        }
    }

    #[test]
    fn test_fixed_dice_script() {
        let mut dice = FixedDice::rolls(vec![1, 6, 3]);
        assert_eq!(dice.roll_d6(), 1);
        assert_eq!(dice.roll_d6(), 6);
        assert_eq!(dice.roll_d6(), 3);
        // Wraps around
        assert_eq!(dice.roll_d6(), 1);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = SeededRng::from_seed(&[9u8; 32]);
        let mut items: Vec<u32> = (0..20).collect();
        shuffle(&mut rng, &mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }
}
