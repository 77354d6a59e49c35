//! Synthetic sensor noise and the cached measurement-covariance estimate.

use nalgebra::{Matrix6, Vector6};
use poserelay_env::Pose;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of independent draws used to estimate the covariance matrix.
const COVARIANCE_SAMPLES: usize = 100;

/// The noise distribution applied to published positions.
///
/// New distributions (Gaussian, etc.) are added as new variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseStrategy {
    /// Uniform in `[-offset/2, offset/2)`
    Uniform {
        /// Total width of the uniform band, in meters
        offset: f64,
    },
}

impl NoiseStrategy {
    /// Draws one value from the distribution.
    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Self::Uniform { offset } => rng.gen::<f64>() * offset - offset / 2.0,
        }
    }
}

/// Bounded random position offsets plus a cached covariance estimate.
///
/// The 6x6 covariance matrix is estimated once at construction from
/// [`COVARIANCE_SAMPLES`] independent triples of noise draws, padded with
/// zeros for the three unmodeled rotational axes. It is never recomputed;
/// every publication of a given model instance carries the same matrix.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    strategy: NoiseStrategy,
    covariance: Matrix6<f64>,
    rng: StdRng,
}

impl NoiseModel {
    /// Creates a model seeded from OS entropy.
    pub fn new(strategy: NoiseStrategy) -> Self {
        Self::with_rng(strategy, StdRng::from_entropy())
    }

    /// Creates a model with an explicit RNG (deterministic in tests).
    pub fn with_rng(strategy: NoiseStrategy, mut rng: StdRng) -> Self {
        let covariance = estimate_covariance(&strategy, &mut rng);
        Self {
            strategy,
            covariance,
            rng,
        }
    }

    /// Draws one noise value.
    pub fn sample(&mut self) -> f64 {
        self.strategy.sample(&mut self.rng)
    }

    /// Returns a copy of `pose` with three independent draws added to the
    /// position. Orientation is unchanged.
    pub fn apply_offset(&mut self, pose: &Pose) -> Pose {
        let mut noisy = *pose;
        noisy.position.x += self.sample();
        noisy.position.y += self.sample();
        noisy.position.z += self.sample();
        noisy
    }

    /// Returns the cached covariance estimate.
    ///
    /// Symmetric, positive-semidefinite, with an exactly-zero rotational
    /// 3x3 block.
    pub fn covariance(&self) -> &Matrix6<f64> {
        &self.covariance
    }

    /// Returns the covariance flattened row-major (36 elements), the form
    /// carried on pose-with-covariance publications.
    pub fn covariance_flat(&self) -> Vec<f64> {
        (0..6)
            .flat_map(|row| (0..6).map(move |col| (row, col)))
            .map(|(row, col)| self.covariance[(row, col)])
            .collect()
    }
}

/// Empirical covariance of the noise distribution across translational
/// and rotational axes (rotation is unmodeled, so those draws are zero).
///
/// Normalized by N-1, matching the usual sample-covariance estimator.
fn estimate_covariance(strategy: &NoiseStrategy, rng: &mut StdRng) -> Matrix6<f64> {
    let draws: Vec<Vector6<f64>> = (0..COVARIANCE_SAMPLES)
        .map(|_| {
            Vector6::new(
                strategy.sample(rng),
                strategy.sample(rng),
                strategy.sample(rng),
                0.0,
                0.0,
                0.0,
            )
        })
        .collect();

    let mean: Vector6<f64> =
        draws.iter().fold(Vector6::zeros(), |acc, draw| acc + draw) / COVARIANCE_SAMPLES as f64;

    let mut covariance = Matrix6::zeros();
    for draw in &draws {
        let centered = draw - mean;
        covariance += centered * centered.transpose();
    }
    covariance / (COVARIANCE_SAMPLES as f64 - 1.0)
}
