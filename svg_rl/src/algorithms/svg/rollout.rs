//! Differentiable imagination rollout.
//!
//! Starting from real observations `s₀ [b, 1, f]`, the policy is unrolled for
//! H steps through the learned transition model:
//!
//! ```text
//! carry (s_t, key)
//!   │ split ─► key', k_sample, k_reward, k_noise
//!   │ a_t  = π(detach(s_t), k_sample)
//!   │ r_t  = reward(s_t, a_t)             oracle or learned, Trainable
//!   │ s'   = T(s_t, a_t) [+ noise(k_noise)]
//!   ▼ carry ← (truncate_backprop(s', β), key')     emit (r_t, s_t, H_t)
//! ```
//!
//! After the unroll the trajectory is reduced to a per-trajectory target
//!
//! ```text
//! target = Σ_t γ^t r_t + bootstrap · γ^H · V(s_H)
//! ```
//!
//! and a per-trajectory entropy total `Σ_t H_t`.
//!
//! The loop is strictly sequential in time and fully vectorised over the
//! batch. Given the same parameters, start observations and key, it
//! reproduces the same trajectory bit for bit.

use burn::prelude::*;

use crate::algorithms::svg::config::SvgLossConfig;
use crate::algorithms::svg::gradient_flow::{truncate_backprop, GradientFlow};
use crate::algorithms::svg::networks::{
    ImaginationPolicy, PolicyHandle, RewardModel, RewardSource, TransitionModel, ValueModel,
};
use crate::algorithms::svg::noise::TransitionNoise;
use crate::core::error::SvgResult;
use crate::core::preprocess::ObservationPreprocessor;
use crate::core::random::PrngKey;
use crate::core::tensor_ops::ensure_dims;

// ============================================================================
// Rollout Data
// ============================================================================

/// State threaded through the unroll.
#[derive(Debug, Clone)]
pub struct RolloutCarry<B: Backend> {
    /// `[b, 1, f]`
    pub observation: Tensor<B, 3>,
    pub key: PrngKey,
}

/// What one imagined step emits.
#[derive(Debug, Clone)]
pub struct ImaginedStep<B: Backend> {
    /// `[b, 1, 1]`
    pub reward: Tensor<B, 3>,
    /// Observation the step started from, `[b, 1, f]`.
    pub observation: Tensor<B, 3>,
    /// Policy entropy estimate, `[b, 1, 1]`.
    pub entropy: Tensor<B, 3>,
}

/// Full imagined trajectory, in time order.
#[derive(Debug, Clone)]
pub struct ImaginedTrajectory<B: Backend> {
    pub steps: Vec<ImaginedStep<B>>,
    /// Carry observation after the last step, `[b, 1, f]`.
    pub final_observation: Tensor<B, 3>,
}

impl<B: Backend> ImaginedTrajectory<B> {
    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    fn batch_size(&self) -> usize {
        self.final_observation.dims()[0]
    }

    /// Rewards as `[b, H]`.
    pub fn rewards(&self) -> Tensor<B, 2> {
        let parts = self.steps.iter().map(|s| s.reward.clone()).collect();
        Tensor::cat(parts, 1).reshape([self.batch_size(), self.horizon()])
    }

    /// Entropy estimates as `[b, H]`.
    pub fn entropies(&self) -> Tensor<B, 2> {
        let parts = self.steps.iter().map(|s| s.entropy.clone()).collect();
        Tensor::cat(parts, 1).reshape([self.batch_size(), self.horizon()])
    }

    /// Visited observations as `[b, H, f]`.
    pub fn observations(&self) -> Tensor<B, 3> {
        let parts = self.steps.iter().map(|s| s.observation.clone()).collect();
        Tensor::cat(parts, 1)
    }
}

/// Per-trajectory reductions of an imagined rollout.
#[derive(Debug, Clone)]
pub struct ImaginedOutcome<B: Backend> {
    /// Discounted return plus horizon bootstrap, `[b]`.
    pub target_values: Tensor<B, 1>,
    /// Entropy estimates summed over time, `[b]`.
    pub total_entropy: Tensor<B, 1>,
}

// ============================================================================
// Rollout Engine
// ============================================================================

/// Policy, models and settings bound for one unroll.
pub struct ImaginationRollout<'a, B, P, T, R>
where
    B: Backend,
    P: ImaginationPolicy<B>,
    T: TransitionModel<B>,
    R: RewardModel<B>,
{
    config: &'a SvgLossConfig,
    reward_source: &'a RewardSource<B>,
    noise: Option<&'a dyn TransitionNoise<B>>,
    pre: &'a ObservationPreprocessor,
    policy: PolicyHandle<'a, B, P>,
    transition: &'a T,
    reward: &'a R,
}

impl<'a, B, P, T, R> ImaginationRollout<'a, B, P, T, R>
where
    B: Backend,
    P: ImaginationPolicy<B>,
    T: TransitionModel<B>,
    R: RewardModel<B>,
{
    /// `noise` is applied to every imagined transition when present.
    /// `reward` is ignored when `reward_source` is an oracle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a SvgLossConfig,
        reward_source: &'a RewardSource<B>,
        noise: Option<&'a dyn TransitionNoise<B>>,
        pre: &'a ObservationPreprocessor,
        policy: &'a P,
        transition: &'a T,
        reward: &'a R,
    ) -> Self {
        Self {
            config,
            reward_source,
            noise,
            pre,
            policy: PolicyHandle::new(policy, pre, config.deterministic_policy),
            transition,
            reward,
        }
    }

    /// Advance the carry by one imagined step.
    pub fn step(&self, carry: RolloutCarry<B>) -> SvgResult<(RolloutCarry<B>, ImaginedStep<B>)> {
        let RolloutCarry { observation: obs, key } = carry;
        let [b, t, f] = obs.dims();
        let [key, sample_key, reward_key, noise_key] = key.split();

        // Only the policy's own parameters see gradient through the action.
        let sample = self.policy.act(obs.clone().detach(), sample_key);
        let action = sample.action;
        let action_dim = action.dims()[2];
        ensure_dims("rollout: policy action", [b, t, action_dim], action.dims())?;
        ensure_dims("rollout: policy entropy", [b, t, 1], sample.entropy.dims())?;

        let reward = match self.reward_source {
            RewardSource::Oracle(oracle) => {
                let first_obs = obs.clone().narrow(1, 0, 1).reshape([b, f]);
                let first_action = action.clone().narrow(1, 0, 1).reshape([b, action_dim]);
                let r = oracle.reward(first_obs, first_action, reward_key);
                ensure_dims("rollout: oracle reward", [b], r.dims())?;
                GradientFlow::Trainable.apply(r.reshape([b, 1, 1]))
            }
            RewardSource::Learned => {
                let r = self.reward.reward(self.pre, obs.clone(), action.clone());
                ensure_dims("rollout: reward model", [b, t, 1], r.dims())?;
                GradientFlow::Trainable.apply(r)
            }
        };

        let mut next_obs = GradientFlow::Trainable.apply(self.transition.next_observation(
            self.pre,
            obs.clone(),
            action,
        ));
        ensure_dims("rollout: transition model", [b, t, f], next_obs.dims())?;

        if let Some(noise) = self.noise {
            next_obs = next_obs + noise.sample([b, t, f], noise_key, &obs.device())?;
        }

        let next_carry = RolloutCarry {
            observation: truncate_backprop(next_obs, self.config.bp_discount),
            key,
        };
        let emitted = ImaginedStep {
            reward,
            observation: obs,
            entropy: sample.entropy,
        };
        Ok((next_carry, emitted))
    }

    /// Run exactly `unroll_length` steps from `init_obs [policy_batch_size, 1, f]`.
    pub fn unroll(&self, init_obs: Tensor<B, 3>, key: PrngKey) -> SvgResult<ImaginedTrajectory<B>> {
        let [_, _, f] = init_obs.dims();
        ensure_dims(
            "rollout: initial observations",
            [self.config.policy_batch_size, 1, f],
            init_obs.dims(),
        )?;

        let mut carry = RolloutCarry {
            observation: init_obs,
            key,
        };
        let mut steps = Vec::with_capacity(self.config.unroll_length);
        for _ in 0..self.config.unroll_length {
            let (next, emitted) = self.step(carry)?;
            steps.push(emitted);
            carry = next;
        }

        Ok(ImaginedTrajectory {
            steps,
            final_observation: carry.observation,
        })
    }

    /// Reduce a trajectory to discounted targets and entropy totals.
    ///
    /// The critic is only evaluated when the bootstrap weight is non-zero.
    pub fn evaluate<C: ValueModel<B>>(
        &self,
        trajectory: &ImaginedTrajectory<B>,
        critic: &C,
    ) -> SvgResult<ImaginedOutcome<B>> {
        let [b, _, _] = trajectory.final_observation.dims();
        let horizon = trajectory.horizon();
        let device = trajectory.final_observation.device();

        let discounts = Tensor::<B, 1>::from_floats(self.config.step_discounts().as_slice(), &device)
            .reshape([1, horizon]);
        let nstep: Tensor<B, 1> = (trajectory.rewards() * discounts).sum_dim(1).reshape([b]);

        let weight = self.config.bootstrap_weight();
        let target_values = if weight != 0.0 {
            let bootstrapped = critic.value(self.pre, trajectory.final_observation.clone());
            ensure_dims("rollout: bootstrap value", [b, 1, 1], bootstrapped.dims())?;
            nstep + bootstrapped.reshape([b]).mul_scalar(weight)
        } else {
            nstep
        };

        let total_entropy = trajectory.entropies().sum_dim(1).reshape([b]);

        Ok(ImaginedOutcome {
            target_values,
            total_entropy,
        })
    }

    /// Unroll and reduce in one call.
    pub fn imagine<C: ValueModel<B>>(
        &self,
        critic: &C,
        init_obs: Tensor<B, 3>,
        key: PrngKey,
    ) -> SvgResult<ImaginedOutcome<B>> {
        let trajectory = self.unroll(init_obs, key)?;
        self.evaluate(&trajectory, critic)
    }
}
