//! Collaborator network seams for the SVG losses.
//!
//! The losses never know how a network is parameterised. They see four
//! function approximators, each a burn [`Module`] whose parameters are the
//! module itself, plus the shared [`ObservationPreprocessor`]:
//!
//! - **Transition**: (s, a) → s'
//! - **Reward**: (s, a) → r
//! - **Value**: s → V(s) (online and target critic share this trait)
//! - **Policy**: (s, key) → (a, entropy estimate)
//!
//! Rewards can alternatively come from a ground-truth [`RewardOracle`]; the
//! choice is a [`RewardSource`] fixed when the loss engine is built.

use std::fmt;
use std::sync::Arc;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::algorithms::svg::config::RewardModelKind;
use crate::core::preprocess::ObservationPreprocessor;
use crate::core::random::PrngKey;

// ============================================================================
// Model Traits
// ============================================================================

/// Learned dynamics: predicts the next observation.
pub trait TransitionModel<B: Backend>: Module<B> {
    /// `obs [b, t, f]`, `action [b, t, a]` → `next_obs [b, t, f]`.
    fn next_observation(
        &self,
        pre: &ObservationPreprocessor,
        obs: Tensor<B, 3>,
        action: Tensor<B, 3>,
    ) -> Tensor<B, 3>;
}

/// Learned reward: predicts the immediate reward.
pub trait RewardModel<B: Backend>: Module<B> {
    /// `obs [b, t, f]`, `action [b, t, a]` → `reward [b, t, 1]`.
    fn reward(
        &self,
        pre: &ObservationPreprocessor,
        obs: Tensor<B, 3>,
        action: Tensor<B, 3>,
    ) -> Tensor<B, 3>;
}

/// State-value estimator, used for both the online and the target critic.
pub trait ValueModel<B: Backend>: Module<B> {
    /// `obs [b, t, f]` → `value [b, t, 1]`.
    fn value(&self, pre: &ObservationPreprocessor, obs: Tensor<B, 3>) -> Tensor<B, 3>;
}

/// Action and entropy estimate drawn from a policy.
#[derive(Debug, Clone)]
pub struct PolicySample<B: Backend> {
    /// `[b, t, a]`, differentiable w.r.t. the policy parameters.
    pub action: Tensor<B, 3>,
    /// `[b, t, 1]`.
    pub entropy: Tensor<B, 3>,
}

/// A policy the imagination rollout can query.
pub trait ImaginationPolicy<B: Backend>: Module<B> {
    /// Sample an action for `obs [b, t, f]`.
    ///
    /// With `deterministic` set the policy returns its mode and the key may be
    /// ignored. The reported entropy is still whatever the policy estimates.
    fn sample(
        &self,
        pre: &ObservationPreprocessor,
        obs: Tensor<B, 3>,
        key: PrngKey,
        deterministic: bool,
    ) -> PolicySample<B>;
}

/// A policy bound to preprocessing parameters and a determinism flag.
///
/// This is the policy factory the losses use: `(params, deterministic) →
/// (obs, key) → (action, entropy)`.
pub struct PolicyHandle<'a, B: Backend, P: ImaginationPolicy<B>> {
    policy: &'a P,
    pre: &'a ObservationPreprocessor,
    deterministic: bool,
    _backend: std::marker::PhantomData<B>,
}

impl<'a, B: Backend, P: ImaginationPolicy<B>> PolicyHandle<'a, B, P> {
    pub fn new(policy: &'a P, pre: &'a ObservationPreprocessor, deterministic: bool) -> Self {
        Self {
            policy,
            pre,
            deterministic,
            _backend: std::marker::PhantomData,
        }
    }

    pub fn act(&self, obs: Tensor<B, 3>, key: PrngKey) -> PolicySample<B> {
        self.policy.sample(self.pre, obs, key, self.deterministic)
    }
}

// ============================================================================
// Reward Sources
// ============================================================================

/// Ground-truth reward function supplied by the environment.
pub trait RewardOracle<B: Backend>: Send + Sync {
    /// `obs [n, f]`, `action [n, a]` → `reward [n]`.
    fn reward(&self, obs: Tensor<B, 2>, action: Tensor<B, 2>, key: PrngKey) -> Tensor<B, 1>;
}

/// Where rewards come from, chosen once when the loss engine is built.
pub enum RewardSource<B: Backend> {
    /// The reward network passed to each loss call.
    Learned,
    /// An environment-supplied reward function; the reward network is unused.
    Oracle(Arc<dyn RewardOracle<B>>),
}

impl<B: Backend> RewardSource<B> {
    pub fn oracle(oracle: impl RewardOracle<B> + 'static) -> Self {
        RewardSource::Oracle(Arc::new(oracle))
    }

    pub fn kind(&self) -> RewardModelKind {
        match self {
            RewardSource::Learned => RewardModelKind::Learned,
            RewardSource::Oracle(_) => RewardModelKind::Oracle,
        }
    }

    pub fn is_oracle(&self) -> bool {
        matches!(self, RewardSource::Oracle(_))
    }
}

impl<B: Backend> Clone for RewardSource<B> {
    fn clone(&self) -> Self {
        match self {
            RewardSource::Learned => RewardSource::Learned,
            RewardSource::Oracle(oracle) => RewardSource::Oracle(Arc::clone(oracle)),
        }
    }
}

impl<B: Backend> fmt::Debug for RewardSource<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardSource::Learned => write!(f, "RewardSource::Learned"),
            RewardSource::Oracle(_) => write!(f, "RewardSource::Oracle(..)"),
        }
    }
}

/// Oracle backed by a plain function of (obs, action).
pub struct FnRewardOracle<F> {
    f: F,
}

impl<F> FnRewardOracle<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<B, F> RewardOracle<B> for FnRewardOracle<F>
where
    B: Backend,
    F: Fn(Tensor<B, 2>, Tensor<B, 2>) -> Tensor<B, 1> + Send + Sync,
{
    fn reward(&self, obs: Tensor<B, 2>, action: Tensor<B, 2>, _key: PrngKey) -> Tensor<B, 1> {
        (self.f)(obs, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_reward_source_kind() {
        let learned = RewardSource::<B>::Learned;
        assert_eq!(learned.kind(), RewardModelKind::Learned);
        assert!(!learned.is_oracle());

        let oracle = RewardSource::<B>::oracle(FnRewardOracle::new(
            |obs: Tensor<B, 2>, _action: Tensor<B, 2>| obs.sum_dim(1).flatten::<1>(0, 1),
        ));
        assert_eq!(oracle.kind(), RewardModelKind::Oracle);
        assert!(oracle.clone().is_oracle());
        assert_eq!(format!("{:?}", oracle), "RewardSource::Oracle(..)");
    }

    #[test]
    fn test_fn_oracle_evaluates_closure() {
        let device = Default::default();
        let oracle = FnRewardOracle::new(|obs: Tensor<B, 2>, action: Tensor<B, 2>| {
            (obs.sum_dim(1) + action.sum_dim(1)).flatten::<1>(0, 1)
        });
        let obs = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let action = Tensor::<B, 2>::from_floats([[0.5], [-1.0]], &device);

        let r = RewardOracle::<B>::reward(&oracle, obs, action, PrngKey::new(0));
        assert_eq!(r.into_data().to_vec::<f32>().unwrap(), vec![3.5, 6.0]);
    }
}
