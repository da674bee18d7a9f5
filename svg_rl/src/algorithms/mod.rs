//! Model-based RL algorithms.
//!
//! - [`svg`]: Stochastic Value Gradients through a learned world model

pub mod svg;

pub use svg::{
    ArmConfig, ModelBatch, RewardModelKind, RewardSource, SvgLearner, SvgLossConfig, SvgLosses,
    SvgNetworks, SvgStepInfo,
};
