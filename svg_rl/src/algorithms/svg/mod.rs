//! Stochastic Value Gradients (SVG) with a learned world model.
//!
//! The policy is improved by differentiating an imagined H-step rollout
//! through learned transition and reward models, bootstrapped with a critic
//! at the horizon.
//!
//! ## Losses
//!
//! | loss       | trains     |
//! |------------|------------|
//! | transition | dynamics   |
//! | reward     | reward net |
//! | critic     | critic     |
//! | policy     | policy     |
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = ArmConfig::default().with_unroll_length(10);
//! let mut learner = SvgLearner::new(&config, networks, pre, RewardSource::Learned, None)?;
//! let info = learner.train_step(&batch, init_obs, key)?;
//! ```

pub mod batch;
pub mod config;
pub mod gradient_flow;
pub mod learner;
pub mod losses;
pub mod networks;
pub mod noise;
pub mod rollout;


pub use batch::ModelBatch;
pub use config::{ArmConfig, RewardModelKind, SequenceModel, SvgLossConfig};
pub use gradient_flow::{truncate_backprop, GradientFlow};
pub use learner::{ModelStepInfo, PolicyStepInfo, SvgLearner, SvgNetworks, SvgStepInfo};
pub use losses::{half_mse, td_targets, PolicyLossOutput, SvgLosses};
pub use networks::{
    FnRewardOracle, ImaginationPolicy, PolicyHandle, PolicySample, RewardModel, RewardOracle,
    RewardSource, TransitionModel, ValueModel,
};
pub use noise::{IsotropicNoise, SingleDimensionNoise, TransitionNoise};
pub use rollout::{ImaginationRollout, ImaginedOutcome, ImaginedStep, ImaginedTrajectory, RolloutCarry};
