use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

/// Pseudo-random deviates consumed by the growth models.
///
/// One generator is owned by the driver and passed by `&mut` into every
/// call that draws, so a seeded run is reproducible.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: StdRng,
    normal: Normal,
}

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Seeded when `seed` is given, otherwise entropy-seeded.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::from_entropy(),
        }
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            normal: Normal::standard(),
        }
    }

    /// Standard normal deviate.
    pub fn gauss_dev(&mut self) -> f64 {
        self.normal.sample(&mut self.rng)
    }

    /// Uniform deviate on [0, 1).
    pub fn uniform_0_1(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform index in `0..n`. `n` must be positive.
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}
