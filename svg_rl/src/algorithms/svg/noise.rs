//! Transition-noise strategies for stochastic imagined dynamics.
//!
//! When the loss engine runs with a stochastic transition model, each
//! imagined next observation is perturbed with noise drawn from its own
//! subkey. The layout of that noise is a strategy so environment-specific
//! noise models can be plugged in.

use burn::prelude::*;

use crate::core::error::{SvgError, SvgResult};
use crate::core::random::PrngKey;

/// Produces additive noise for a `[b, t, f]` next-observation tensor.
pub trait TransitionNoise<B: Backend>: Send + Sync {
    fn sample(&self, dims: [usize; 3], key: PrngKey, device: &B::Device) -> SvgResult<Tensor<B, 3>>;
}

/// Gaussian noise on a single feature; all other features are unperturbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleDimensionNoise {
    pub dim: usize,
    pub std: f32,
}

impl SingleDimensionNoise {
    pub fn new(dim: usize, std: f32) -> Self {
        Self { dim, std }
    }
}

impl Default for SingleDimensionNoise {
    fn default() -> Self {
        Self { dim: 0, std: 1.0 }
    }
}

impl<B: Backend> TransitionNoise<B> for SingleDimensionNoise {
    fn sample(&self, dims: [usize; 3], key: PrngKey, device: &B::Device) -> SvgResult<Tensor<B, 3>> {
        let [batch, time, features] = dims;
        if self.dim >= features {
            return Err(SvgError::config(format!(
                "noise dimension {} out of range for {} observation features",
                self.dim, features
            )));
        }

        let noisy = key.normal::<B, 3>([batch, time, 1], device).mul_scalar(self.std);
        let mut parts = Vec::with_capacity(3);
        if self.dim > 0 {
            parts.push(Tensor::zeros([batch, time, self.dim], device));
        }
        parts.push(noisy);
        let after = features - self.dim - 1;
        if after > 0 {
            parts.push(Tensor::zeros([batch, time, after], device));
        }
        Ok(Tensor::cat(parts, 2))
    }
}

/// Independent Gaussian noise on every feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicNoise {
    pub std: f32,
}

impl IsotropicNoise {
    pub fn new(std: f32) -> Self {
        Self { std }
    }
}

impl<B: Backend> TransitionNoise<B> for IsotropicNoise {
    fn sample(&self, dims: [usize; 3], key: PrngKey, device: &B::Device) -> SvgResult<Tensor<B, 3>> {
        Ok(key.normal::<B, 3>(dims, device).mul_scalar(self.std))
    }
}
