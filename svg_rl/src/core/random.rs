//! Splittable randomness keys.
//!
//! Every consumer of randomness (policy sampling, oracle rewards, transition
//! noise) receives its own [`PrngKey`]. Keys are plain values: splitting and
//! sampling are pure functions of the key, so the same key always reproduces
//! the same subkeys and the same samples.
//!
//! ```text
//! key ──split::<3>()──► [k_policy, k_reward, k_rest]
//!                          │
//!                          └─normal([b, 1, a])──► ε ~ N(0, I)
//! ```
//!
//! Reusing a spent key is a caller contract violation: shapes stay correct but
//! the draws are no longer independent. Nothing here can detect it.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// ChaCha stream used to derive subkeys.
const SPLIT_STREAM: u64 = 0;
/// ChaCha stream used to draw samples, disjoint from the subkey stream.
const SAMPLE_STREAM: u64 = 1;

/// Deterministic, splittable randomness key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrngKey(u64);

impl PrngKey {
    /// Create a root key from a seed.
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Raw seed value of this key.
    pub fn seed(&self) -> u64 {
        self.0
    }

    fn rng(&self, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.0);
        rng.set_stream(stream);
        rng
    }

    /// Split into `N` independent subkeys. The receiver is consumed.
    pub fn split<const N: usize>(self) -> [PrngKey; N] {
        let mut rng = self.rng(SPLIT_STREAM);
        std::array::from_fn(|_| PrngKey(rng.next_u64()))
    }

    /// Draw `n` standard-normal values.
    pub fn normal_values(self, n: usize) -> Vec<f32> {
        let mut rng = self.rng(SAMPLE_STREAM);
        (0..n)
            .map(|_| {
                let x: f32 = StandardNormal.sample(&mut rng);
                x
            })
            .collect()
    }

    /// Draw a standard-normal tensor of the given shape.
    pub fn normal<B: Backend, const D: usize>(
        self,
        shape: [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        let n = shape.iter().product();
        let values = self.normal_values(n);
        Tensor::from_data(TensorData::new(values, shape), device)
    }
}

impl From<u64> for PrngKey {
    fn from(seed: u64) -> Self {
        PrngKey::new(seed)
    }
}
