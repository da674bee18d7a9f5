//! Reference network implementations.

pub mod mlp;

pub use mlp::{gaussian_entropy, GaussianPolicy, Mlp, MlpCritic, MlpReward, MlpTransition};
