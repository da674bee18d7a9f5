//! # SVG: Stochastic Value Gradients on burn
//!
//! Loss functions and an imagination-rollout engine for model-based policy
//! optimisation. A learned world model (transition + reward) is trained on
//! replayed experience; the policy is trained by differentiating an imagined
//! rollout through that model, with a critic bootstrapping at the horizon.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           SvgLearner                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ModelBatch ──► transition_loss ──► Adam(transition)             │
//! │             └─► reward_loss     ──► Adam(reward)   (learned)     │
//! │             └─► critic_loss     ──► Adam(critic) ──► Polyak(tgt) │
//! │                                                                  │
//! │  s₀ ──► ImaginationRollout ──► Σ γᵗ rₜ + bootstrap·γᴴ V(s_H)     │
//! │                 │                        │                       │
//! │          policy, T, R (β-truncated)      └─► policy_loss ──► Adam │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use svg_rl::{ArmConfig, SvgLearner, SvgNetworks, RewardSource, PrngKey};
//!
//! let config = ArmConfig::default()
//!     .with_unroll_length(10)
//!     .with_policy_batch_size(16);
//!
//! let mut learner = SvgLearner::new(&config, networks, preprocessor, RewardSource::Learned, None)?;
//! let mut key = PrngKey::new(0);
//! learner.observe(&batch.observations);
//! let [next, step_key] = key.split();
//! key = next;
//! let info = learner.train_step(&batch, init_obs, step_key)?;
//! ```

pub mod core;
pub mod algorithms;
pub mod nn;
pub mod scheduling;
pub mod metrics;

pub use crate::core::{ObservationPreprocessor, PrngKey, RunningMeanStd, SvgError, SvgResult};
pub use algorithms::svg::{
    ArmConfig, FnRewardOracle, ImaginationPolicy, ImaginationRollout, ModelBatch,
    PolicyLossOutput, RewardModel, RewardModelKind, RewardOracle, RewardSource, SvgLearner,
    SvgLossConfig, SvgLosses, SvgNetworks, SvgStepInfo, TransitionModel, TransitionNoise,
    ValueModel,
};
pub use metrics::{ConsoleLogger, CsvLogger, MetricsLogger, MultiLogger, SvgSnapshot};
pub use scheduling::{ConstantSchedule, ExponentialDecay, Scheduler};
