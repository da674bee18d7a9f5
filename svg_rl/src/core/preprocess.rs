//! Shared observation preprocessing.
//!
//! Every network (transition, reward, critic, policy) normalises its
//! observation input with the same [`ObservationPreprocessor`] before
//! consuming it. The statistics are fitted from observed data via
//! [`ObservationPreprocessor::update_batch`] and are plain constants inside a
//! loss: no gradient ever reaches them.
//!
//! ```ignore
//! let mut pre = ObservationPreprocessor::new(obs_dim);
//! pre.update_batch(&replay_observations);   // outer loop only
//! let x = pre.apply(observations);          // inside every network call
//! ```

use crate::core::tensor_ops::tensor_to_vec;
use crate::core::RunningMeanStd;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Running-statistics normaliser applied before every network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationPreprocessor {
    stats: RunningMeanStd,
    /// Clip normalised observations to this range.
    clip_range: Option<(f32, f32)>,
}

impl ObservationPreprocessor {
    /// Preprocessor for `obs_dim` features; identity until statistics are fitted.
    pub fn new(obs_dim: usize) -> Self {
        Self {
            stats: RunningMeanStd::new(obs_dim),
            clip_range: None,
        }
    }

    /// Clip normalised values to `(low, high)`.
    pub fn with_clip_range(mut self, range: Option<(f32, f32)>) -> Self {
        self.clip_range = range;
        self
    }

    /// Feature dimensionality.
    pub fn obs_dim(&self) -> usize {
        self.stats.dim()
    }

    /// Number of observations the statistics were fitted on.
    pub fn count(&self) -> f64 {
        self.stats.count()
    }

    /// Underlying statistics.
    pub fn stats(&self) -> &RunningMeanStd {
        &self.stats
    }

    /// Clip range, if any.
    pub fn clip_range(&self) -> Option<(f32, f32)> {
        self.clip_range
    }

    /// Fit statistics on a flattened `[n * obs_dim]` batch.
    ///
    /// A batch whose length is not a multiple of `obs_dim` is skipped with a
    /// warning.
    pub fn update_batch(&mut self, batch: &[f32]) {
        let dim = self.obs_dim();
        if dim == 0 || batch.len() % dim != 0 {
            log::warn!(
                "Skipping preprocessor update: {} values do not form rows of {} features",
                batch.len(),
                dim
            );
            return;
        }
        self.stats.update_batch(batch);
    }

    /// Fit statistics on a `[batch, time, obs_dim]` tensor.
    pub fn update_tensor<B: Backend>(&mut self, observations: &Tensor<B, 3>) {
        let [_, _, features] = observations.dims();
        if features != self.obs_dim() {
            log::warn!(
                "Skipping preprocessor update: expected {} features, got {}",
                self.obs_dim(),
                features
            );
            return;
        }
        self.update_batch(&tensor_to_vec(observations));
    }

    /// Normalise a `[batch, time, obs_dim]` tensor.
    ///
    /// Mean and std enter the graph as constants, so gradient flows to the
    /// observations but never to the statistics.
    pub fn apply<B: Backend>(&self, observations: Tensor<B, 3>) -> Tensor<B, 3> {
        let device = observations.device();
        let dim = self.stats.dim();

        let mean: Vec<f32> = self.stats.mean().iter().map(|&m| m as f32).collect();
        let std: Vec<f32> = self.stats.std().iter().map(|&s| s as f32).collect();
        let mean = Tensor::<B, 1>::from_floats(mean.as_slice(), &device).reshape([1, 1, dim]);
        let std = Tensor::<B, 1>::from_floats(std.as_slice(), &device).reshape([1, 1, dim]);

        let normalized = (observations - mean) / std;
        match self.clip_range {
            Some((low, high)) => normalized.clamp(low, high),
            None => normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray<f32>>;

    fn values(t: Tensor<B, 3>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_unfitted_is_identity() {
        let device = Default::default();
        let pre = ObservationPreprocessor::new(2);
        let obs = Tensor::<B, 3>::from_floats([[[1.5, -2.0]], [[0.0, 3.0]]], &device);

        assert_eq!(values(pre.apply(obs.clone())), values(obs));
    }

    #[test]
    fn test_normalizes_with_fitted_stats() {
        let device = Default::default();
        let mut pre = ObservationPreprocessor::new(1);
        pre.update_batch(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);

        let obs = Tensor::<B, 3>::from_floats([[[5.0]], [[9.0]]], &device);
        let out = values(pre.apply(obs));

        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_clip_range() {
        let device = Default::default();
        let pre = ObservationPreprocessor::new(1).with_clip_range(Some((-1.0, 1.0)));
        let obs = Tensor::<B, 3>::from_floats([[[5.0]], [[-5.0]], [[0.5]]], &device);

        assert_eq!(values(pre.apply(obs)), vec![1.0, -1.0, 0.5]);
    }

    #[test]
    fn test_update_tensor_matches_slice_update() {
        let device = Default::default();
        let mut from_tensor = ObservationPreprocessor::new(2);
        let mut from_slice = ObservationPreprocessor::new(2);

        let obs = Tensor::<B, 3>::from_floats([[[1.0, 2.0]], [[3.0, 6.0]]], &device);
        from_tensor.update_tensor(&obs);
        from_slice.update_batch(&[1.0, 2.0, 3.0, 6.0]);

        assert_eq!(from_tensor.stats(), from_slice.stats());
        assert_eq!(from_tensor.count(), 2.0);
    }

    #[test]
    fn test_update_tensor_ignores_wrong_feature_count() {
        let device = Default::default();
        let mut pre = ObservationPreprocessor::new(3);
        pre.update_tensor(&Tensor::<B, 3>::ones([2, 1, 2], &device));
        assert_eq!(pre.count(), 0.0);
    }

    #[test]
    fn test_update_batch_ignores_ragged_input() {
        let mut pre = ObservationPreprocessor::new(2);
        pre.update_batch(&[1.0, 2.0, 3.0]);
        assert_eq!(pre.count(), 0.0);

        let mut empty = ObservationPreprocessor::new(0);
        empty.update_batch(&[1.0]);
        assert_eq!(empty.count(), 0.0);

        pre.update_batch(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(pre.count(), 2.0);
    }

    #[test]
    fn test_serde_roundtrip_keeps_stats() {
        let mut pre = ObservationPreprocessor::new(2).with_clip_range(Some((-5.0, 5.0)));
        pre.update_batch(&[1.0, 2.0, 3.0, 4.0]);

        let json = serde_json::to_string(&pre).unwrap();
        let restored: ObservationPreprocessor = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.stats(), pre.stats());
        assert_eq!(restored.clip_range(), Some((-5.0, 5.0)));
    }
}
