//! Explicit random source for one experiment run.
//!
//! A run builds exactly one [`RunRng`] from its configured seed and hands it
//! to whoever needs randomness. Consumers either draw child seeds from it or
//! fork a keyed stream, so two runs with the same seed see the same numbers
//! no matter what else happens in the process.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct RunRng {
    seed: u64,
    rng: StdRng,
}

impl RunRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The seed this run was started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw the next child seed from the run stream.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// An independent generator for one consumer, keyed by the run seed and
    /// `stream` (see [`streams`]).
    ///
    /// The result does not depend on how many numbers were drawn from the run
    /// stream before.
    pub fn fork(&self, stream: u64) -> StdRng {
        let mut key = <StdRng as SeedableRng>::Seed::default();
        key[..8].copy_from_slice(&self.seed.to_le_bytes());
        key[8..16].copy_from_slice(&stream.to_le_bytes());
        StdRng::from_seed(key)
    }
}

/// Stream ids handed to [`RunRng::fork`].
pub mod streams {
    pub const POLICY: u64 = 1;
}
