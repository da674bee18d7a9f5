//! Reference MLP implementations of the four SVG networks.
//!
//! All networks normalise observations with the shared preprocessor, flatten
//! `[b, t, _]` inputs to `[b·t, _]`, run a tanh MLP and reshape back.
//!
//! - [`MlpTransition`]: residual dynamics, `s' = s + f(pre(s), a)`
//! - [`MlpReward`]: `r = f(pre(s), a)`
//! - [`MlpCritic`]: `V = f(pre(s))`
//! - [`GaussianPolicy`]: `a = tanh(μ + σ·ε)` with a Gaussian entropy estimate

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::tanh;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::algorithms::svg::networks::{
    ImaginationPolicy, PolicySample, RewardModel, TransitionModel, ValueModel,
};
use crate::core::preprocess::ObservationPreprocessor;
use crate::core::random::PrngKey;

/// Log-std bounds of the Gaussian policy head.
pub const LOG_STD_MIN: f32 = -5.0;
pub const LOG_STD_MAX: f32 = 2.0;

// ============================================================================
// Mlp
// ============================================================================

/// Stack of tanh hidden layers followed by a linear head.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    head: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    pub fn new(d_input: usize, hidden_sizes: &[usize], d_output: usize, device: &B::Device) -> Self {
        let mut hidden = Vec::with_capacity(hidden_sizes.len());
        let mut width = d_input;
        for &size in hidden_sizes {
            hidden.push(LinearConfig::new(width, size).init(device));
            width = size;
        }
        Self {
            hidden,
            head: LinearConfig::new(width, d_output).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(input, |x, layer| tanh(layer.forward(x)));
        self.head.forward(x)
    }

    /// Apply to `[b, t, d_in]`, returning `[b, t, d_out]`.
    pub fn forward_3d(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [b, t, d] = input.dims();
        let out = self.forward(input.reshape([b * t, d]));
        let d_out = out.dims()[1];
        out.reshape([b, t, d_out])
    }
}

fn obs_action_input<B: Backend>(
    pre: &ObservationPreprocessor,
    obs: Tensor<B, 3>,
    action: Tensor<B, 3>,
) -> Tensor<B, 3> {
    Tensor::cat(vec![pre.apply(obs), action], 2)
}

// ============================================================================
// World Model & Critic
// ============================================================================

/// Residual transition network.
#[derive(Module, Debug)]
pub struct MlpTransition<B: Backend> {
    net: Mlp<B>,
}

impl<B: Backend> MlpTransition<B> {
    pub fn new(obs_dim: usize, action_dim: usize, hidden_sizes: &[usize], device: &B::Device) -> Self {
        Self {
            net: Mlp::new(obs_dim + action_dim, hidden_sizes, obs_dim, device),
        }
    }
}

impl<B: Backend> TransitionModel<B> for MlpTransition<B> {
    fn next_observation(
        &self,
        pre: &ObservationPreprocessor,
        obs: Tensor<B, 3>,
        action: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let delta = self.net.forward_3d(obs_action_input(pre, obs.clone(), action));
        obs + delta
    }
}

#[derive(Module, Debug)]
pub struct MlpReward<B: Backend> {
    net: Mlp<B>,
}

impl<B: Backend> MlpReward<B> {
    pub fn new(obs_dim: usize, action_dim: usize, hidden_sizes: &[usize], device: &B::Device) -> Self {
        Self {
            net: Mlp::new(obs_dim + action_dim, hidden_sizes, 1, device),
        }
    }
}

impl<B: Backend> RewardModel<B> for MlpReward<B> {
    fn reward(
        &self,
        pre: &ObservationPreprocessor,
        obs: Tensor<B, 3>,
        action: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        self.net.forward_3d(obs_action_input(pre, obs, action))
    }
}

#[derive(Module, Debug)]
pub struct MlpCritic<B: Backend> {
    net: Mlp<B>,
}

impl<B: Backend> MlpCritic<B> {
    pub fn new(obs_dim: usize, hidden_sizes: &[usize], device: &B::Device) -> Self {
        Self {
            net: Mlp::new(obs_dim, hidden_sizes, 1, device),
        }
    }
}

impl<B: Backend> ValueModel<B> for MlpCritic<B> {
    fn value(&self, pre: &ObservationPreprocessor, obs: Tensor<B, 3>) -> Tensor<B, 3> {
        self.net.forward_3d(pre.apply(obs))
    }
}

// ============================================================================
// Gaussian Policy
// ============================================================================

/// Tanh-squashed diagonal Gaussian policy.
///
/// The entropy estimate is that of the pre-squash Gaussian,
/// `0.5·D·(1 + ln 2π) + Σ log σ`.
#[derive(Module, Debug)]
pub struct GaussianPolicy<B: Backend> {
    trunk: Mlp<B>,
    mean_head: Linear<B>,
    log_std_head: Linear<B>,
}

impl<B: Backend> GaussianPolicy<B> {
    pub fn new(obs_dim: usize, action_dim: usize, hidden_sizes: &[usize], device: &B::Device) -> Self {
        // The last hidden width is the trunk's output feature size.
        let (trunk_sizes, width) = match hidden_sizes.split_last() {
            Some((&last, rest)) => (rest, last),
            None => (hidden_sizes, obs_dim),
        };
        Self {
            trunk: Mlp::new(obs_dim, trunk_sizes, width, device),
            mean_head: LinearConfig::new(width, action_dim).init(device),
            log_std_head: LinearConfig::new(width, action_dim).init(device),
        }
    }

    /// `(mean, log_std)`, each `[n, a]`.
    fn distribution(&self, pre: &ObservationPreprocessor, obs: Tensor<B, 3>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [b, t, f] = obs.dims();
        let x = pre.apply(obs).reshape([b * t, f]);
        let features = tanh(self.trunk.forward(x));
        let mean = self.mean_head.forward(features.clone());
        let log_std = self
            .log_std_head
            .forward(features)
            .clamp(LOG_STD_MIN, LOG_STD_MAX);
        (mean, log_std)
    }
}

/// Differential entropy of a diagonal Gaussian per row, `[n, 1]`.
pub fn gaussian_entropy<B: Backend>(log_std: Tensor<B, 2>) -> Tensor<B, 2> {
    let action_dim = log_std.dims()[1] as f32;
    let constant = 0.5 * action_dim * (1.0 + (2.0 * std::f32::consts::PI).ln());
    log_std.sum_dim(1).add_scalar(constant)
}

impl<B: Backend> ImaginationPolicy<B> for GaussianPolicy<B> {
    fn sample(
        &self,
        pre: &ObservationPreprocessor,
        obs: Tensor<B, 3>,
        key: PrngKey,
        deterministic: bool,
    ) -> PolicySample<B> {
        let [b, t, _] = obs.dims();
        let device = obs.device();
        let (mean, log_std) = self.distribution(pre, obs);
        let [n, a] = mean.dims();

        let entropy = gaussian_entropy(log_std.clone()).reshape([b, t, 1]);
        let pre_squash = if deterministic {
            mean
        } else {
            let eps = key.normal::<B, 2>([n, a], &device);
            mean + log_std.exp() * eps
        };

        PolicySample {
            action: tanh(pre_squash).reshape([b, t, a]),
            entropy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn values<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_network_output_shapes() {
        let device = Default::default();
        let pre = ObservationPreprocessor::new(3);
        let obs = Tensor::<B, 3>::ones([4, 2, 3], &device);
        let action = Tensor::<B, 3>::zeros([4, 2, 2], &device);

        let transition = MlpTransition::<B>::new(3, 2, &[8, 8], &device);
        let reward = MlpReward::<B>::new(3, 2, &[8], &device);
        let critic = MlpCritic::<B>::new(3, &[8, 8], &device);

        assert_eq!(transition.next_observation(&pre, obs.clone(), action.clone()).dims(), [4, 2, 3]);
        assert_eq!(reward.reward(&pre, obs.clone(), action).dims(), [4, 2, 1]);
        assert_eq!(critic.value(&pre, obs).dims(), [4, 2, 1]);
    }

    #[test]
    fn test_policy_sample_bounded_and_keyed() {
        let device = Default::default();
        let pre = ObservationPreprocessor::new(3);
        let policy = GaussianPolicy::<B>::new(3, 2, &[16, 16], &device);
        let obs = Tensor::<B, 3>::random([5, 1, 3], burn::tensor::Distribution::Default, &device);

        let a = policy.sample(&pre, obs.clone(), PrngKey::new(1), false);
        let b = policy.sample(&pre, obs.clone(), PrngKey::new(1), false);
        let c = policy.sample(&pre, obs, PrngKey::new(2), false);

        assert_eq!(a.action.dims(), [5, 1, 2]);
        assert_eq!(a.entropy.dims(), [5, 1, 1]);
        assert_eq!(values(a.action.clone()), values(b.action));
        assert_ne!(values(a.action.clone()), values(c.action));
        assert!(values(a.action).iter().all(|x| x.abs() <= 1.0));
    }

    #[test]
    fn test_deterministic_policy_ignores_key() {
        let device = Default::default();
        let pre = ObservationPreprocessor::new(2);
        let policy = GaussianPolicy::<B>::new(2, 1, &[8], &device);
        let obs = Tensor::<B, 3>::ones([3, 1, 2], &device);

        let a = policy.sample(&pre, obs.clone(), PrngKey::new(1), true);
        let b = policy.sample(&pre, obs, PrngKey::new(99), true);
        assert_eq!(values(a.action), values(b.action));
    }

    #[test]
    fn test_gaussian_entropy_unit_std() {
        let device = Default::default();
        let log_std = Tensor::<B, 2>::zeros([2, 3], &device);
        let expected = 1.5 * (1.0 + (2.0 * std::f32::consts::PI).ln());
        for h in values(gaussian_entropy(log_std)) {
            assert!((h - expected).abs() < 1e-5);
        }
    }
}
