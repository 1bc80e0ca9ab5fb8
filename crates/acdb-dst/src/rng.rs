//! Deterministic random number generation, identical in spirit to the
//! teacher's `vf_dst::random::DeterministicRng`: a seeded Xoshiro256**
//! wrapper that produces the same sequence for the same seed.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

pub struct DeterministicRng {
    seed: u64,
    rng: Xoshiro256StarStar,
}

impl DeterministicRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: Xoshiro256StarStar::seed_from_u64(seed) }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn gen_range<T>(&mut self, range: std::ops::Range<T>) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
    {
        self.rng.gen_range(range)
    }

    pub fn gen_bool(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability)
    }

    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.rng)
    }
}

/// Reads `DST_SEED` from the environment, or generates a fresh seed and
/// prints it so a failing run can be reproduced with
/// `DST_SEED=<seed> cargo test`.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED") {
        Ok(s) => {
            let seed: u64 = s.parse().expect("DST_SEED must be a valid u64");
            println!("DST_SEED={seed} (from environment)");
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={seed} (randomly generated)");
            seed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = DeterministicRng::new(42);
        let mut b = DeterministicRng::new(42);
        for _ in 0..50 {
            assert_eq!(a.gen_range(0..1000), b.gen_range(0..1000));
        }
    }
}
