//! Deterministic random number generation
//!
//! A single 32-bit linear congruential stream per run. Every random draw the
//! engine makes comes from here, so `(config, seed)` fully determines a run.

use rand::{Error, RngCore, SeedableRng};

const MULTIPLIER: u32 = 1_664_525;
const INCREMENT: u32 = 1_013_904_223;

/// Restartable LCG: `state <- 1664525 * state + 1013904223 (mod 2^32)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LcgStream {
    state: u32,
}

impl LcgStream {
    /// Seeds are reduced modulo 2^32.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed as u32,
        }
    }

    /// Next draw scaled by `2^32 - 1`.
    pub fn next_unit(&mut self) -> f64 {
        self.next_u32() as f64 / u32::MAX as f64
    }
}

impl RngCore for LcgStream {
    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.next_u32() as u64;
        let high = self.next_u32() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for LcgStream {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            state: u32::from_le_bytes(seed),
        }
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
