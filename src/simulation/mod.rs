//! Offline strategy simulation on a seeded single-zero wheel.

pub mod runner;

pub use runner::{SimulationReport, SimulationRound, Simulator};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::types::MAX_NUMBER;

/// A fair single-zero roulette wheel (0–36, uniform).
pub struct RouletteWheel {
    rng: ChaCha8Rng,
}

impl RouletteWheel {
    /// Reproducible wheel: the same seed yields the same spin sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn spin(&mut self) -> u8 {
        self.rng.gen_range(0..=MAX_NUMBER)
    }
}

impl Iterator for RouletteWheel {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.spin())
    }
}
