//! Configuration for the `arm` SVG variant and for the loss engine.
//!
//! [`ArmConfig`] is the flat hyperparameter set consumed by an outer training
//! loop and by network constructors. [`SvgLossConfig`] is the immutable subset
//! the loss engine binds at construction.

use crate::core::error::{SvgError, SvgResult};
use crate::scheduling::ExponentialDecay;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Enumerations
// ============================================================================

/// Recurrent architecture used by sequence models downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceModel {
    #[default]
    Lstm,
    Gru,
}

/// Where imagined and critic-target rewards come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardModelKind {
    /// A reward network trained by the reward loss.
    #[default]
    Learned,
    /// A ground-truth reward function supplied by the environment.
    Oracle,
}

// ============================================================================
// Arm Configuration
// ============================================================================

/// Hyperparameters of the `arm` algorithm.
///
/// Defaults reproduce the reference `arm` setup. `chunk_length` and
/// `unroll_length` are unset by default and must be chosen per environment
/// before a loss engine can be built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    /// Algorithm name.
    pub alg: String,

    // ========================================================================
    // Rollout Settings
    // ========================================================================
    /// Length of replayed sequence chunks. Negative values read as unset.
    #[serde(deserialize_with = "deserialize_length")]
    pub chunk_length: Option<usize>,
    /// Imagination horizon. Negative values read as unset.
    #[serde(deserialize_with = "deserialize_length")]
    pub unroll_length: Option<usize>,

    // ========================================================================
    // Training Cadence
    // ========================================================================
    /// Total environment steps.
    pub num_steps: usize,
    /// Steps collected before any update.
    pub warmup_steps: usize,
    /// Update every N environment steps.
    pub update_every: usize,
    /// Model/critic batch size.
    pub batch_size: usize,
    /// Number of imagined trajectories per policy update.
    pub policy_batch_size: usize,
    /// Evaluate every N episodes.
    pub eval_every: usize,
    pub action_repeat: usize,
    /// Re-initialise networks every N steps (0 = never).
    pub reset_every: usize,

    // ========================================================================
    // Networks
    // ========================================================================
    /// Hidden layer widths.
    pub network_sizes: Vec<usize>,
    /// Embedding dimension of sequence models.
    pub embd_dim: usize,
    /// Feed raw observations to the sequence model.
    pub input_observations: bool,
    #[serde(rename = "sequence_model_name")]
    pub sequence_model: SequenceModel,

    // ========================================================================
    // Objective
    // ========================================================================
    /// Exploration epsilon for data collection.
    pub epsilon: f32,
    /// Per-step gradient attenuation through the imagined trajectory.
    pub bp_discount: f32,
    /// Reward discount.
    pub discount: f32,
    /// Weight of the critic bootstrap at the horizon (0 disables it).
    pub bootstrap: f32,
    pub entropy_init: f64,
    pub entropy_decay_rate: f64,
    pub entropy_transition_steps: usize,

    // ========================================================================
    // Optimisation
    // ========================================================================
    /// Learning rate of transition and reward networks.
    pub dynamics_lr: f64,
    pub policy_lr: f64,
    pub critic_lr: f64,
    /// Polyak coefficient of the target critic.
    pub tau: f32,
    /// Gradient norm clip applied by every optimiser.
    pub grad_clip: f32,
    /// Replay buffer capacity.
    pub buffer_max: usize,

    // ========================================================================
    // Loss Engine Switches
    // ========================================================================
    pub deterministic_policy: bool,
    /// Perturb imagined next observations with transition noise.
    pub stochastic_transition: bool,
    pub reward_model: RewardModelKind,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            alg: "arm".to_string(),
            chunk_length: None,
            unroll_length: None,
            num_steps: 5000,
            warmup_steps: 500,
            update_every: 2,
            batch_size: 32,
            policy_batch_size: 8,
            eval_every: 5,
            action_repeat: 1,
            reset_every: 0,
            network_sizes: vec![64, 64],
            embd_dim: 48,
            input_observations: false,
            sequence_model: SequenceModel::Lstm,
            epsilon: 0.9,
            bp_discount: 0.99,
            discount: 0.99,
            bootstrap: 0.0,
            entropy_init: 0.001,
            entropy_decay_rate: 1.0,
            entropy_transition_steps: 100,
            dynamics_lr: 0.001,
            policy_lr: 0.001,
            critic_lr: 0.001,
            tau: 0.005,
            grad_clip: 10.0,
            buffer_max: 1_000_000,
            deterministic_policy: false,
            stochastic_transition: false,
            reward_model: RewardModelKind::Learned,
        }
    }
}

impl ArmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every hyperparameter the learner and loss engine depend on.
    pub fn validate(&self) -> SvgResult<()> {
        check_unit("discount", self.discount)?;
        check_unit("bp_discount", self.bp_discount)?;
        check_unit("epsilon", self.epsilon)?;
        check_bootstrap(self.bootstrap)?;

        if self.unroll_length == Some(0) {
            return Err(SvgError::config("unroll_length must be at least 1"));
        }
        if self.chunk_length == Some(0) {
            return Err(SvgError::config("chunk_length must be at least 1"));
        }
        if self.batch_size == 0 || self.policy_batch_size == 0 {
            return Err(SvgError::config(format!(
                "batch sizes must be positive, got batch_size={} policy_batch_size={}",
                self.batch_size, self.policy_batch_size
            )));
        }
        for (name, lr) in [
            ("dynamics_lr", self.dynamics_lr),
            ("policy_lr", self.policy_lr),
            ("critic_lr", self.critic_lr),
        ] {
            if !(lr > 0.0 && lr.is_finite()) {
                return Err(SvgError::config(format!("{} must be positive, got {}", name, lr)));
            }
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return Err(SvgError::config(format!("tau must lie in [0, 1], got {}", self.tau)));
        }
        if !(self.grad_clip > 0.0 && self.grad_clip.is_finite()) {
            return Err(SvgError::config(format!(
                "grad_clip must be positive, got {}",
                self.grad_clip
            )));
        }
        if self.entropy_init < 0.0 || !self.entropy_init.is_finite() {
            return Err(SvgError::config(format!(
                "entropy_init must be non-negative, got {}",
                self.entropy_init
            )));
        }
        if !(self.entropy_decay_rate > 0.0 && self.entropy_decay_rate.is_finite()) {
            return Err(SvgError::config(format!(
                "entropy_decay_rate must be positive, got {}",
                self.entropy_decay_rate
            )));
        }
        if self.entropy_transition_steps == 0 {
            return Err(SvgError::config("entropy_transition_steps must be at least 1"));
        }
        if self.network_sizes.is_empty() || self.network_sizes.contains(&0) {
            return Err(SvgError::config(format!(
                "network_sizes must be non-empty and positive, got {:?}",
                self.network_sizes
            )));
        }
        Ok(())
    }

    /// Loss-engine settings. Fails if the horizon is unset or any value is out of range.
    pub fn loss_config(&self) -> SvgResult<SvgLossConfig> {
        self.validate()?;
        let unroll_length = self
            .unroll_length
            .ok_or_else(|| SvgError::config("unroll_length must be set before building losses"))?;

        let config = SvgLossConfig {
            discount: self.discount,
            bp_discount: self.bp_discount,
            unroll_length,
            policy_batch_size: self.policy_batch_size,
            bootstrap: self.bootstrap,
            deterministic_policy: self.deterministic_policy,
            stochastic_transition: self.stochastic_transition,
        };
        config.validate()?;
        Ok(config)
    }

    /// Entropy-regularisation coefficient schedule.
    pub fn entropy_schedule(&self) -> ExponentialDecay {
        ExponentialDecay::new(
            self.entropy_init,
            self.entropy_decay_rate,
            self.entropy_transition_steps,
        )
    }

    // ========================================================================
    // Cadence
    // ========================================================================

    /// Still collecting warmup data at `step`.
    pub fn is_warmup(&self, step: usize) -> bool {
        step < self.warmup_steps
    }

    /// Run a training update at environment step `step`.
    pub fn should_update(&self, step: usize) -> bool {
        !self.is_warmup(step) && self.update_every > 0 && step % self.update_every == 0
    }

    /// Evaluate after episode `episode`.
    pub fn should_evaluate(&self, episode: usize) -> bool {
        self.eval_every > 0 && episode % self.eval_every == 0
    }

    /// Re-initialise networks at `step`.
    pub fn should_reset(&self, step: usize) -> bool {
        self.reset_every > 0 && step > 0 && step % self.reset_every == 0
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    pub fn with_unroll_length(mut self, length: usize) -> Self {
        self.unroll_length = Some(length);
        self
    }

    pub fn with_chunk_length(mut self, length: usize) -> Self {
        self.chunk_length = Some(length);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_policy_batch_size(mut self, batch_size: usize) -> Self {
        self.policy_batch_size = batch_size;
        self
    }

    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_bp_discount(mut self, bp_discount: f32) -> Self {
        self.bp_discount = bp_discount;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: f32) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set learning rates (same for all networks).
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.dynamics_lr = lr;
        self.policy_lr = lr;
        self.critic_lr = lr;
        self
    }

    pub fn with_dynamics_lr(mut self, lr: f64) -> Self {
        self.dynamics_lr = lr;
        self
    }

    pub fn with_policy_lr(mut self, lr: f64) -> Self {
        self.policy_lr = lr;
        self
    }

    pub fn with_critic_lr(mut self, lr: f64) -> Self {
        self.critic_lr = lr;
        self
    }

    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_grad_clip(mut self, grad_clip: f32) -> Self {
        self.grad_clip = grad_clip;
        self
    }

    /// Set the entropy coefficient schedule.
    pub fn with_entropy_schedule(mut self, init: f64, decay_rate: f64, transition_steps: usize) -> Self {
        self.entropy_init = init;
        self.entropy_decay_rate = decay_rate;
        self.entropy_transition_steps = transition_steps;
        self
    }

    pub fn with_network_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.network_sizes = sizes;
        self
    }

    pub fn with_sequence_model(mut self, model: SequenceModel) -> Self {
        self.sequence_model = model;
        self
    }

    pub fn with_deterministic_policy(mut self, deterministic: bool) -> Self {
        self.deterministic_policy = deterministic;
        self
    }

    pub fn with_stochastic_transition(mut self, stochastic: bool) -> Self {
        self.stochastic_transition = stochastic;
        self
    }

    pub fn with_reward_model(mut self, kind: RewardModelKind) -> Self {
        self.reward_model = kind;
        self
    }
}

// ============================================================================
// Loss Engine Configuration
// ============================================================================

/// Immutable settings bound into [`SvgLosses`](super::losses::SvgLosses).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvgLossConfig {
    pub discount: f32,
    pub bp_discount: f32,
    /// Imagination horizon H.
    pub unroll_length: usize,
    /// Expected batch size of rollout start observations.
    pub policy_batch_size: usize,
    /// Horizon bootstrap weight.
    pub bootstrap: f32,
    pub deterministic_policy: bool,
    pub stochastic_transition: bool,
}

impl SvgLossConfig {
    /// Loss settings for a horizon, with the loss-engine defaults for the rest.
    pub fn new(unroll_length: usize) -> Self {
        Self {
            discount: 0.99,
            bp_discount: 0.99,
            unroll_length,
            policy_batch_size: 16,
            bootstrap: 1.0,
            deterministic_policy: false,
            stochastic_transition: false,
        }
    }

    pub fn validate(&self) -> SvgResult<()> {
        check_unit("discount", self.discount)?;
        check_unit("bp_discount", self.bp_discount)?;
        check_bootstrap(self.bootstrap)?;
        if self.unroll_length == 0 {
            return Err(SvgError::config("unroll_length must be at least 1"));
        }
        if self.policy_batch_size == 0 {
            return Err(SvgError::config("policy_batch_size must be at least 1"));
        }
        Ok(())
    }

    /// `discount^t` for t in 0..H.
    pub fn step_discounts(&self) -> Vec<f32> {
        (0..self.unroll_length)
            .map(|t| self.discount.powi(t as i32))
            .collect()
    }

    /// Weight of the critic value at the horizon: `bootstrap * discount^H`.
    pub fn bootstrap_weight(&self) -> f32 {
        self.bootstrap * self.discount.powi(self.unroll_length as i32)
    }

    /// 0 for a deterministic policy, 1 otherwise.
    pub fn entropy_mask(&self) -> f32 {
        if self.deterministic_policy {
            0.0
        } else {
            1.0
        }
    }

    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_bp_discount(mut self, bp_discount: f32) -> Self {
        self.bp_discount = bp_discount;
        self
    }

    pub fn with_policy_batch_size(mut self, batch_size: usize) -> Self {
        self.policy_batch_size = batch_size;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: f32) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_deterministic_policy(mut self, deterministic: bool) -> Self {
        self.deterministic_policy = deterministic;
        self
    }

    pub fn with_stochastic_transition(mut self, stochastic: bool) -> Self {
        self.stochastic_transition = stochastic;
        self
    }
}

/// Lengths are stored as `-1` in config files when not chosen yet.
fn deserialize_length<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        Some(n) if n < 0 => Ok(None),
        Some(n) => usize::try_from(n).map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}

fn check_unit(name: &str, value: f32) -> SvgResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SvgError::config(format!("{} must lie in [0, 1], got {}", name, value)))
    }
}

fn check_bootstrap(bootstrap: f32) -> SvgResult<()> {
    if bootstrap >= 0.0 && bootstrap.is_finite() {
        Ok(())
    } else {
        Err(SvgError::config(format!(
            "bootstrap must be a finite non-negative weight, got {}",
            bootstrap
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================
