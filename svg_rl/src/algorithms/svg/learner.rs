//! One optimisation step per network.
//!
//! [`SvgLearner`] owns the five networks, the shared preprocessor, one Adam
//! optimiser per trained network and the target-critic schedule. Each step
//! builds exactly one loss, backpropagates it and hands the optimiser only the
//! gradients of the module it owns:
//!
//! ```text
//! model_step   transition loss ─► transition opt
//!              reward loss     ─► reward opt        (skipped with an oracle)
//! critic_step  critic loss     ─► critic opt ─► Polyak(target critic)
//! policy_step  policy loss     ─► policy opt        (model and critic untouched)
//! ```

use std::sync::Arc;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::algorithms::svg::batch::ModelBatch;
use crate::algorithms::svg::config::ArmConfig;
use crate::algorithms::svg::losses::SvgLosses;
use crate::algorithms::svg::networks::{
    ImaginationPolicy, RewardModel, RewardSource, TransitionModel, ValueModel,
};
use crate::algorithms::svg::noise::TransitionNoise;
use crate::core::error::SvgResult;
use crate::core::preprocess::ObservationPreprocessor;
use crate::core::random::PrngKey;
use crate::core::target_network::{hard_copy, TargetNetworkManager};
use crate::core::tensor_ops::tensor_to_scalar;
use crate::scheduling::{ExponentialDecay, Scheduler};

// ============================================================================
// Step Info
// ============================================================================

/// Losses of one model step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelStepInfo {
    pub transition_loss: f32,
    /// 0 with an oracle reward source.
    pub reward_loss: f32,
}

/// Policy loss and rollout diagnostics of one policy step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyStepInfo {
    pub policy_loss: f32,
    pub mean_return: f32,
    pub mean_entropy: f32,
    /// Entropy coefficient used for this step.
    pub entropy_coef: f32,
}

/// Everything one [`SvgLearner::train_step`] reports.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SvgStepInfo {
    pub transition_loss: f32,
    pub reward_loss: f32,
    pub critic_loss: f32,
    pub policy_loss: f32,
    pub mean_return: f32,
    pub mean_entropy: f32,
    pub entropy_coef: f32,
}

impl SvgStepInfo {
    fn from_parts(model: ModelStepInfo, critic_loss: f32, policy: PolicyStepInfo) -> Self {
        Self {
            transition_loss: model.transition_loss,
            reward_loss: model.reward_loss,
            critic_loss,
            policy_loss: policy.policy_loss,
            mean_return: policy.mean_return,
            mean_entropy: policy.mean_entropy,
            entropy_coef: policy.entropy_coef,
        }
    }

    /// True when every reported value is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.transition_loss,
            self.reward_loss,
            self.critic_loss,
            self.policy_loss,
            self.mean_return,
            self.mean_entropy,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

fn warn_if_non_finite(name: &str, value: f32) {
    if !value.is_finite() {
        log::warn!("{} is non-finite: {}", name, value);
    }
}

// ============================================================================
// Networks
// ============================================================================

/// The four trained networks. The target critic starts as a copy of `critic`.
#[derive(Debug, Clone)]
pub struct SvgNetworks<P, T, R, C> {
    pub policy: P,
    pub transition: T,
    pub reward: R,
    pub critic: C,
}

// ============================================================================
// Learner
// ============================================================================

pub struct SvgLearner<B, P, T, R, C>
where
    B: AutodiffBackend,
    P: ImaginationPolicy<B> + AutodiffModule<B>,
    T: TransitionModel<B> + AutodiffModule<B>,
    R: RewardModel<B> + AutodiffModule<B>,
    C: ValueModel<B> + AutodiffModule<B>,
{
    policy: P,
    transition: T,
    reward: R,
    critic: C,
    target_critic: C,
    preprocessor: ObservationPreprocessor,
    losses: SvgLosses<B>,

    policy_optimizer: OptimizerAdaptor<Adam, P, B>,
    transition_optimizer: OptimizerAdaptor<Adam, T, B>,
    reward_optimizer: OptimizerAdaptor<Adam, R, B>,
    critic_optimizer: OptimizerAdaptor<Adam, C, B>,
    dynamics_lr: f64,
    policy_lr: f64,
    critic_lr: f64,

    entropy_schedule: ExponentialDecay,
    target_manager: TargetNetworkManager,
    model_steps: usize,
    policy_steps: usize,
}

/// Adam with the learner's epsilon and gradient-norm clipping.
fn adam_config(grad_clip: f32) -> AdamConfig {
    AdamConfig::new()
        .with_epsilon(1e-5)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(grad_clip)))
}

impl<B, P, T, R, C> SvgLearner<B, P, T, R, C>
where
    B: AutodiffBackend,
    P: ImaginationPolicy<B> + AutodiffModule<B>,
    T: TransitionModel<B> + AutodiffModule<B>,
    R: RewardModel<B> + AutodiffModule<B>,
    C: ValueModel<B> + AutodiffModule<B>,
{
    /// Build a learner from an `arm` configuration.
    ///
    /// Fails if the configuration is invalid, the horizon is unset, or the
    /// reward source does not match `config.reward_model`.
    pub fn new(
        config: &ArmConfig,
        networks: SvgNetworks<P, T, R, C>,
        preprocessor: ObservationPreprocessor,
        reward_source: RewardSource<B>,
        noise: Option<Arc<dyn TransitionNoise<B>>>,
    ) -> SvgResult<Self> {
        let loss_config = config.loss_config()?;
        let losses = SvgLosses::with_expected_reward(loss_config, config.reward_model, reward_source, noise)?;

        let SvgNetworks {
            policy,
            transition,
            reward,
            critic,
        } = networks;
        let target_critic = hard_copy::<B, C>(&critic);

        log::info!(
            "SVG learner: horizon={} policy_batch={} bootstrap={} reward={:?} deterministic={} stochastic_transition={}",
            loss_config.unroll_length,
            loss_config.policy_batch_size,
            loss_config.bootstrap,
            config.reward_model,
            loss_config.deterministic_policy,
            loss_config.stochastic_transition,
        );

        Ok(Self {
            policy,
            transition,
            reward,
            critic,
            target_critic,
            preprocessor,
            losses,
            policy_optimizer: adam_config(config.grad_clip).init(),
            transition_optimizer: adam_config(config.grad_clip).init(),
            reward_optimizer: adam_config(config.grad_clip).init(),
            critic_optimizer: adam_config(config.grad_clip).init(),
            dynamics_lr: config.dynamics_lr,
            policy_lr: config.policy_lr,
            critic_lr: config.critic_lr,
            entropy_schedule: config.entropy_schedule(),
            target_manager: TargetNetworkManager::soft(config.tau),
            model_steps: 0,
            policy_steps: 0,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn transition(&self) -> &T {
        &self.transition
    }

    pub fn reward(&self) -> &R {
        &self.reward
    }

    pub fn critic(&self) -> &C {
        &self.critic
    }

    pub fn target_critic(&self) -> &C {
        &self.target_critic
    }

    pub fn preprocessor(&self) -> &ObservationPreprocessor {
        &self.preprocessor
    }

    pub fn losses(&self) -> &SvgLosses<B> {
        &self.losses
    }

    pub fn model_steps(&self) -> usize {
        self.model_steps
    }

    pub fn critic_steps(&self) -> usize {
        self.target_manager.steps()
    }

    pub fn policy_steps(&self) -> usize {
        self.policy_steps
    }

    /// Entropy coefficient the next policy step will use.
    pub fn entropy_coefficient(&self) -> f32 {
        self.entropy_schedule.value(self.policy_steps) as f32
    }

    /// Fit the preprocessor on freshly collected observations `[b, t, f]`.
    pub fn observe(&mut self, observations: &Tensor<B, 3>) {
        self.preprocessor.update_tensor(observations);
    }

    /// Hand back the trained networks.
    pub fn into_networks(self) -> (SvgNetworks<P, T, R, C>, C) {
        (
            SvgNetworks {
                policy: self.policy,
                transition: self.transition,
                reward: self.reward,
                critic: self.critic,
            },
            self.target_critic,
        )
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Fit the transition model, and the reward model unless rewards come from an oracle.
    pub fn model_step(&mut self, batch: &ModelBatch<B>) -> SvgResult<ModelStepInfo> {
        let transition_loss = self.losses.transition_loss(
            &self.transition,
            &self.preprocessor,
            batch.observations.clone(),
            batch.actions.clone(),
            batch.next_observations.clone(),
        )?;
        let transition_loss_val = tensor_to_scalar(&transition_loss);
        warn_if_non_finite("transition_loss", transition_loss_val);

        let grads = transition_loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.transition);
        self.transition = self
            .transition_optimizer
            .step(self.dynamics_lr, self.transition.clone(), grads);

        let mut reward_loss_val = 0.0;
        if !self.losses.reward_source().is_oracle() {
            let reward_loss = self.losses.reward_loss(
                &self.reward,
                &self.preprocessor,
                batch.observations.clone(),
                batch.actions.clone(),
                batch.rewards.clone(),
            )?;
            reward_loss_val = tensor_to_scalar(&reward_loss);
            warn_if_non_finite("reward_loss", reward_loss_val);

            let grads = reward_loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.reward);
            self.reward = self
                .reward_optimizer
                .step(self.dynamics_lr, self.reward.clone(), grads);
        }

        self.model_steps += 1;
        Ok(ModelStepInfo {
            transition_loss: transition_loss_val,
            reward_loss: reward_loss_val,
        })
    }

    /// One TD step on the critic, then a Polyak update of the target critic.
    pub fn critic_step(
        &mut self,
        observations: Tensor<B, 3>,
        dones: Tensor<B, 3>,
        key: PrngKey,
    ) -> SvgResult<f32> {
        let critic_loss = self.losses.critic_loss(
            &self.critic,
            &self.preprocessor,
            &self.policy,
            &self.transition,
            &self.reward,
            &self.target_critic,
            observations,
            dones,
            key,
        )?;
        let critic_loss_val = tensor_to_scalar(&critic_loss);
        warn_if_non_finite("critic_loss", critic_loss_val);

        let grads = critic_loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.critic);
        self.critic = self
            .critic_optimizer
            .step(self.critic_lr, self.critic.clone(), grads);

        let target = self.target_critic.clone();
        self.target_critic = self.target_manager.step::<B, C>(&self.critic, target);

        Ok(critic_loss_val)
    }

    /// Improve the policy through an imagined rollout from `init_obs [policy_batch_size, 1, f]`.
    pub fn policy_step(&mut self, init_obs: Tensor<B, 3>, key: PrngKey) -> SvgResult<PolicyStepInfo> {
        let entropy_coef = self.entropy_coefficient();
        let output = self.losses.policy_loss(
            &self.policy,
            &self.preprocessor,
            &self.transition,
            &self.reward,
            &self.critic,
            init_obs,
            entropy_coef,
            key,
        )?;

        let policy_loss_val = tensor_to_scalar(&output.loss);
        warn_if_non_finite("policy_loss", policy_loss_val);

        let grads = output.loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.policy);
        self.policy = self
            .policy_optimizer
            .step(self.policy_lr, self.policy.clone(), grads);
        self.policy_steps += 1;

        Ok(PolicyStepInfo {
            policy_loss: policy_loss_val,
            mean_return: tensor_to_scalar(&output.mean_return),
            mean_entropy: tensor_to_scalar(&output.mean_entropy),
            entropy_coef,
        })
    }

    /// Model, critic and policy steps in that order.
    pub fn train_step(
        &mut self,
        batch: &ModelBatch<B>,
        init_obs: Tensor<B, 3>,
        key: PrngKey,
    ) -> SvgResult<SvgStepInfo> {
        let [critic_key, policy_key] = key.split();

        let model = self.model_step(batch)?;
        let critic_loss = self.critic_step(batch.observations.clone(), batch.dones.clone(), critic_key)?;
        let policy = self.policy_step(init_obs, policy_key)?;

        let info = SvgStepInfo::from_parts(model, critic_loss, policy);
        log::debug!(
            "SVG step {}: transition={:.5} reward={:.5} critic={:.5} policy={:.5} return={:.4} entropy={:.4} alpha={:.5}",
            self.policy_steps,
            info.transition_loss,
            info.reward_loss,
            info.critic_loss,
            info.policy_loss,
            info.mean_return,
            info.mean_entropy,
            info.entropy_coef,
        );
        Ok(info)
    }
}
