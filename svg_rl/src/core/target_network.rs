//! Target critic maintenance.
//!
//! The critic loss bootstraps from a slowly moving snapshot of the critic.
//! That snapshot is owned by the learner, never by the losses, and is moved
//! toward the online critic with Polyak averaging after each critic step:
//!
//! ```text
//! θ_target ← τ · θ_online + (1 − τ) · θ_target
//! ```
//!
//! Parameters are paired by traversal order, so online and target only need
//! the same architecture, not shared parameter ids.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;

// ============================================================================
// Polyak averaging via ModuleMapper
// ============================================================================

/// Collects every float parameter of a module, flattened, in traversal order.
struct ParamCollector<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamCollector<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let numel: usize = val.dims().iter().product();
        self.params.push(val.reshape([numel]));
        param
    }
}

/// Rewrites each target parameter as an interpolation with its online twin.
struct PolyakMapper<B: Backend> {
    online: std::vec::IntoIter<Tensor<B, 1>>,
    tau: f32,
}

impl<B: Backend> ModuleMapper<B> for PolyakMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let Some(online) = self.online.next() else {
            log::warn!("Target network has more parameters than online network; keeping target");
            return param;
        };

        let target = param.val();
        let shape = target.dims();
        let numel: usize = shape.iter().product();

        let mixed = online.mul_scalar(self.tau) + target.reshape([numel]).mul_scalar(1.0 - self.tau);
        // The snapshot must not keep a graph back into the online parameters.
        Param::initialized(param.id.clone(), mixed.reshape(shape).detach())
    }
}

/// Move `target` toward `online` by `tau` and return the new target.
///
/// `tau = 0` returns the target untouched, `tau = 1` returns a copy of online.
pub fn soft_update<B, M>(online: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    if tau <= 0.0 {
        return target;
    }
    if tau >= 1.0 {
        return hard_copy::<B, M>(online);
    }

    let mut collector = ParamCollector { params: Vec::new() };
    let _ = online.clone().map(&mut collector);

    let mut mapper = PolyakMapper {
        online: collector.params.into_iter(),
        tau,
    };
    target.map(&mut mapper)
}

/// Replace the target with a copy of the online module.
pub fn hard_copy<B, M>(online: &M) -> M
where
    B: Backend,
    M: Module<B>,
{
    online.clone()
}

// ============================================================================
// Manager
// ============================================================================

/// When and how strongly the target critic follows the online critic.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetNetworkConfig {
    /// Polyak coefficient.
    pub tau: f32,
    /// Update once every `update_every` critic steps.
    pub update_every: usize,
}

impl Default for TargetNetworkConfig {
    fn default() -> Self {
        Self {
            tau: 0.005,
            update_every: 1,
        }
    }
}

impl TargetNetworkConfig {
    /// Soft updates on every step.
    pub fn soft(tau: f32) -> Self {
        Self {
            tau,
            update_every: 1,
        }
    }

    /// Set the update period.
    pub fn with_update_every(mut self, update_every: usize) -> Self {
        self.update_every = update_every.max(1);
        self
    }
}

/// Counts critic steps and applies target updates on schedule.
#[derive(Debug, Clone)]
pub struct TargetNetworkManager {
    config: TargetNetworkConfig,
    steps: usize,
}

impl TargetNetworkManager {
    pub fn new(config: TargetNetworkConfig) -> Self {
        Self { config, steps: 0 }
    }

    pub fn soft(tau: f32) -> Self {
        Self::new(TargetNetworkConfig::soft(tau))
    }

    /// Register one critic step and return the (possibly updated) target.
    pub fn step<B, M>(&mut self, online: &M, target: M) -> M
    where
        B: Backend,
        M: Module<B>,
    {
        self.steps += 1;
        if self.steps % self.config.update_every.max(1) == 0 {
            soft_update::<B, M>(online, target, self.config.tau)
        } else {
            target
        }
    }

    /// Critic steps registered so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn config(&self) -> &TargetNetworkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = NdArray<f32>;

    fn weights<B: Backend>(layer: &Linear<B>) -> Vec<f32> {
        layer.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    fn bias<B: Backend>(layer: &Linear<B>) -> Vec<f32> {
        layer.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap()
    }

    fn assert_mixed(updated: &[f32], online: &[f32], target: &[f32], tau: f32) {
        for i in 0..online.len() {
            let expected = tau * online[i] + (1.0 - tau) * target[i];
            assert!(
                (updated[i] - expected).abs() < 1e-5,
                "index {}: expected {}, got {} (tau={})",
                i,
                expected,
                updated[i],
                tau
            );
        }
    }

    #[test]
    fn test_tau_zero_keeps_target() {
        let device = Default::default();
        let online = LinearConfig::new(4, 3).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 3).init::<TestBackend>(&device);
        let before = weights(&target);

        let updated = soft_update::<TestBackend, _>(&online, target, 0.0);
        assert_eq!(weights(&updated), before);
    }

    #[test]
    fn test_tau_one_copies_online() {
        let device = Default::default();
        let online = LinearConfig::new(4, 3).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 3).init::<TestBackend>(&device);

        let updated = soft_update::<TestBackend, _>(&online, target, 1.0);
        assert_eq!(weights(&updated), weights(&online));
    }

    #[test]
    fn test_interpolates_weights_and_bias() {
        let device = Default::default();
        let online = LinearConfig::new(5, 2).init::<TestBackend>(&device);
        let target = LinearConfig::new(5, 2).init::<TestBackend>(&device);
        let (ow, ob) = (weights(&online), bias(&online));
        let (tw, tb) = (weights(&target), bias(&target));

        let updated = soft_update::<TestBackend, _>(&online, target, 0.3);

        assert_mixed(&weights(&updated), &ow, &tw, 0.3);
        assert_mixed(&bias(&updated), &ob, &tb, 0.3);
    }

    #[test]
    fn test_updated_target_is_detached() {
        type AD = Autodiff<NdArray<f32>>;
        let device = Default::default();
        let online = LinearConfig::new(2, 1).init::<AD>(&device);
        let target = LinearConfig::new(2, 1).init::<AD>(&device);

        let updated = soft_update::<AD, _>(&online, target, 0.5);
        let out = updated.forward(Tensor::<AD, 2>::ones([3, 2], &device).require_grad()).sum();
        let grads = out.backward();

        assert!(online.weight.val().grad(&grads).is_none());
    }

    #[test]
    fn test_manager_respects_period() {
        let device = Default::default();
        let online = LinearConfig::new(3, 3).init::<TestBackend>(&device);
        let mut target = LinearConfig::new(3, 3).init::<TestBackend>(&device);
        let (ow, tw) = (weights(&online), weights(&target));

        let mut manager = TargetNetworkManager::new(TargetNetworkConfig::soft(0.1).with_update_every(2));

        target = manager.step::<TestBackend, _>(&online, target);
        assert_eq!(manager.steps(), 1);
        assert_eq!(weights(&target), tw);

        target = manager.step::<TestBackend, _>(&online, target);
        assert_eq!(manager.steps(), 2);
        assert_mixed(&weights(&target), &ow, &tw, 0.1);
    }

    #[test]
    fn test_repeated_updates_converge() {
        let device = Default::default();
        let online = LinearConfig::new(2, 2).init::<TestBackend>(&device);
        let mut target = LinearConfig::new(2, 2).init::<TestBackend>(&device);
        let mut manager = TargetNetworkManager::soft(0.5);

        for _ in 0..40 {
            target = manager.step::<TestBackend, _>(&online, target);
        }

        for (t, o) in weights(&target).iter().zip(weights(&online)) {
            assert!((t - o).abs() < 1e-5);
        }
    }
}
