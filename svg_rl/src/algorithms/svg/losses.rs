//! The four SVG losses.
//!
//! [`SvgLosses`] binds an immutable [`SvgLossConfig`], a [`RewardSource`] and
//! an optional transition-noise strategy once. Every loss is then a pure
//! function of the modules and tensors passed in: nothing is cached between
//! calls, so losses are re-entrant as long as each call gets its own key.
//!
//! | loss       | trains                 | regression target / objective              |
//! |------------|------------------------|--------------------------------------------|
//! | transition | transition network     | observed next observation                  |
//! | reward     | reward network         | observed reward (0 with an oracle)         |
//! | critic     | critic                 | r + γ(1 − done)·V_target(T(s, π(s)))       |
//! | policy     | policy (through model) | −(mean target + α·mean entropy·(1 − det))  |

use std::sync::Arc;

use burn::prelude::*;

use crate::algorithms::svg::config::{RewardModelKind, SvgLossConfig};
use crate::algorithms::svg::gradient_flow::GradientFlow;
use crate::algorithms::svg::networks::{
    ImaginationPolicy, PolicyHandle, RewardModel, RewardSource, TransitionModel, ValueModel,
};
use crate::algorithms::svg::noise::{SingleDimensionNoise, TransitionNoise};
use crate::algorithms::svg::rollout::ImaginationRollout;
use crate::core::error::{SvgError, SvgResult};
use crate::core::preprocess::ObservationPreprocessor;
use crate::core::random::PrngKey;
use crate::core::tensor_ops::ensure_dims;

// ============================================================================
// Loss Outputs
// ============================================================================

/// Policy loss plus rollout diagnostics.
///
/// Diagnostics are detached copies; only `loss` carries a graph.
#[derive(Debug, Clone)]
pub struct PolicyLossOutput<B: Backend> {
    /// Scalar loss `[1]`.
    pub loss: Tensor<B, 1>,
    /// Per-trajectory imagined targets `[b]`.
    pub target_values: Tensor<B, 1>,
    /// Batch mean of total trajectory entropy `[1]`.
    pub mean_entropy: Tensor<B, 1>,
    /// Batch mean of imagined targets `[1]`.
    pub mean_return: Tensor<B, 1>,
}

// ============================================================================
// Pure Loss Helpers
// ============================================================================

/// `0.5 · mean((target − prediction)²)`.
pub fn half_mse<B: Backend, const D: usize>(prediction: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    (target - prediction).powf_scalar(2.0).mean().mul_scalar(0.5)
}

/// One-step TD target `r + γ · (1 − done) · V(s')`.
pub fn td_targets<B: Backend>(
    rewards: Tensor<B, 3>,
    dones: Tensor<B, 3>,
    next_values: Tensor<B, 3>,
    discount: f32,
) -> Tensor<B, 3> {
    let not_done = dones.neg().add_scalar(1.0);
    rewards + not_done * next_values.mul_scalar(discount)
}

// ============================================================================
// Loss Engine
// ============================================================================

/// Loss operations bound to one configuration.
pub struct SvgLosses<B: Backend> {
    config: SvgLossConfig,
    reward_source: RewardSource<B>,
    noise: Option<Arc<dyn TransitionNoise<B>>>,
}

impl<B: Backend> Clone for SvgLosses<B> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            reward_source: self.reward_source.clone(),
            noise: self.noise.clone(),
        }
    }
}

impl<B: Backend> std::fmt::Debug for SvgLosses<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgLosses")
            .field("config", &self.config)
            .field("reward_source", &self.reward_source)
            .field("noise", &self.noise.is_some())
            .finish()
    }
}

impl<B: Backend> SvgLosses<B> {
    /// Validate the configuration and bind the reward source and noise model.
    ///
    /// With `stochastic_transition` set and no noise given, imagined
    /// transitions get unit Gaussian noise on feature 0.
    pub fn new(
        config: SvgLossConfig,
        reward_source: RewardSource<B>,
        noise: Option<Arc<dyn TransitionNoise<B>>>,
    ) -> SvgResult<Self> {
        config.validate()?;

        let noise = if config.stochastic_transition {
            Some(noise.unwrap_or_else(|| {
                Arc::new(SingleDimensionNoise::default()) as Arc<dyn TransitionNoise<B>>
            }))
        } else {
            if noise.is_some() {
                log::warn!("Transition noise supplied but stochastic_transition is off; ignoring it");
            }
            None
        };

        Ok(Self {
            config,
            reward_source,
            noise,
        })
    }

    /// Like [`new`](Self::new), but also checks the source against the configured kind.
    pub fn with_expected_reward(
        config: SvgLossConfig,
        expected: RewardModelKind,
        reward_source: RewardSource<B>,
        noise: Option<Arc<dyn TransitionNoise<B>>>,
    ) -> SvgResult<Self> {
        if reward_source.kind() != expected {
            return Err(SvgError::config(format!(
                "reward model configured as {:?} but a {:?} reward source was supplied",
                expected,
                reward_source.kind()
            )));
        }
        Self::new(config, reward_source, noise)
    }

    pub fn config(&self) -> &SvgLossConfig {
        &self.config
    }

    pub fn reward_source(&self) -> &RewardSource<B> {
        &self.reward_source
    }

    // ========================================================================
    // Model Losses
    // ========================================================================

    /// Supervised next-observation regression: `0.5 · mse(s', T(s, a))`.
    pub fn transition_loss<T: TransitionModel<B>>(
        &self,
        transition: &T,
        pre: &ObservationPreprocessor,
        observations: Tensor<B, 3>,
        actions: Tensor<B, 3>,
        next_observations: Tensor<B, 3>,
    ) -> SvgResult<Tensor<B, 1>> {
        let [b, t, f] = observations.dims();
        ensure_dims("transition_loss: actions", [b, t, actions.dims()[2]], actions.dims())?;
        ensure_dims("transition_loss: next_observations", [b, t, f], next_observations.dims())?;

        let predicted = GradientFlow::Trainable.apply(transition.next_observation(pre, observations, actions));
        ensure_dims("transition_loss: prediction", [b, t, f], predicted.dims())?;

        Ok(half_mse(predicted, next_observations))
    }

    /// Supervised reward regression: `0.5 · mse(r, R(s, a))`.
    ///
    /// With an oracle reward source this is exactly 0 and the reward network
    /// is not evaluated.
    pub fn reward_loss<R: RewardModel<B>>(
        &self,
        reward: &R,
        pre: &ObservationPreprocessor,
        observations: Tensor<B, 3>,
        actions: Tensor<B, 3>,
        rewards: Tensor<B, 3>,
    ) -> SvgResult<Tensor<B, 1>> {
        if self.reward_source.is_oracle() {
            return Ok(Tensor::zeros([1], &rewards.device()));
        }

        let [b, t, _] = observations.dims();
        ensure_dims("reward_loss: actions", [b, t, actions.dims()[2]], actions.dims())?;
        ensure_dims("reward_loss: rewards", [b, t, 1], rewards.dims())?;

        let predicted = GradientFlow::Trainable.apply(reward.reward(pre, observations, actions));
        ensure_dims("reward_loss: prediction", [b, t, 1], predicted.dims())?;

        Ok(half_mse(predicted, rewards))
    }

    // ========================================================================
    // Critic Loss
    // ========================================================================

    /// One-step TD regression of the critic on `observations [b, l, f]`.
    ///
    /// The whole target (reward, imagined next observation and target-critic
    /// value) is frozen, so only the critic receives gradient.
    #[allow(clippy::too_many_arguments)]
    pub fn critic_loss<C, P, T, R, TC>(
        &self,
        critic: &C,
        pre: &ObservationPreprocessor,
        policy: &P,
        transition: &T,
        reward: &R,
        target_critic: &TC,
        observations: Tensor<B, 3>,
        dones: Tensor<B, 3>,
        key: PrngKey,
    ) -> SvgResult<Tensor<B, 1>>
    where
        C: ValueModel<B>,
        P: ImaginationPolicy<B>,
        T: TransitionModel<B>,
        R: RewardModel<B>,
        TC: ValueModel<B>,
    {
        let [b, l, f] = observations.dims();
        ensure_dims("critic_loss: dones", [b, l, 1], dones.dims())?;
        let [policy_key, reward_key, _] = key.split();

        let value = GradientFlow::Trainable.apply(critic.value(pre, observations.clone().detach()));
        ensure_dims("critic_loss: value", [b, l, 1], value.dims())?;

        let policy = PolicyHandle::new(policy, pre, self.config.deterministic_policy);
        let action = policy.act(observations.clone(), policy_key).action;
        let action_dim = action.dims()[2];
        ensure_dims("critic_loss: policy action", [b, l, action_dim], action.dims())?;

        let rewards = match &self.reward_source {
            RewardSource::Oracle(oracle) => {
                let r = oracle.reward(
                    observations.clone().reshape([b * l, f]),
                    action.clone().reshape([b * l, action_dim]),
                    reward_key,
                );
                ensure_dims("critic_loss: oracle reward", [b * l], r.dims())?;
                r.reshape([b, l, 1])
            }
            RewardSource::Learned => reward.reward(pre, observations.clone(), action.clone()),
        };
        let rewards = GradientFlow::Frozen.apply(rewards);
        ensure_dims("critic_loss: reward", [b, l, 1], rewards.dims())?;

        let next_obs = GradientFlow::Frozen.apply(transition.next_observation(pre, observations, action));
        let next_value = GradientFlow::Frozen.apply(target_critic.value(pre, next_obs));
        ensure_dims("critic_loss: target value", [b, l, 1], next_value.dims())?;

        let target = td_targets(rewards, dones, next_value, self.config.discount);
        Ok(half_mse(value, target))
    }

    // ========================================================================
    // Imagination & Policy Loss
    // ========================================================================

    /// Bind the rollout engine to a set of networks.
    pub fn rollout<'a, P, T, R>(
        &'a self,
        pre: &'a ObservationPreprocessor,
        policy: &'a P,
        transition: &'a T,
        reward: &'a R,
    ) -> ImaginationRollout<'a, B, P, T, R>
    where
        P: ImaginationPolicy<B>,
        T: TransitionModel<B>,
        R: RewardModel<B>,
    {
        ImaginationRollout::new(
            &self.config,
            &self.reward_source,
            self.noise.as_deref(),
            pre,
            policy,
            transition,
            reward,
        )
    }

    /// Negative imagined objective for `init_obs [policy_batch_size, 1, f]`.
    ///
    /// `entropy_reg` is the current entropy-regularisation coefficient; it has
    /// no effect when the policy is deterministic.
    #[allow(clippy::too_many_arguments)]
    pub fn policy_loss<P, T, R, C>(
        &self,
        policy: &P,
        pre: &ObservationPreprocessor,
        transition: &T,
        reward: &R,
        critic: &C,
        init_obs: Tensor<B, 3>,
        entropy_reg: f32,
        key: PrngKey,
    ) -> SvgResult<PolicyLossOutput<B>>
    where
        P: ImaginationPolicy<B>,
        T: TransitionModel<B>,
        R: RewardModel<B>,
        C: ValueModel<B>,
    {
        let outcome = self
            .rollout(pre, policy, transition, reward)
            .imagine(critic, init_obs, key)?;

        let mean_return = outcome.target_values.clone().mean();
        let mean_entropy = outcome.total_entropy.mean();

        // A deterministic policy has no entropy to maximise.
        let entropy_weight = entropy_reg * self.config.entropy_mask();
        let objective = if entropy_weight == 0.0 {
            mean_return.clone()
        } else {
            mean_return.clone() + mean_entropy.clone().mul_scalar(entropy_weight)
        };

        Ok(PolicyLossOutput {
            loss: objective.neg(),
            target_values: outcome.target_values.detach(),
            mean_entropy: mean_entropy.detach(),
            mean_return: mean_return.detach(),
        })
    }
}
