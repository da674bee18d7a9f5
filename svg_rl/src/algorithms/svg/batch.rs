//! Validated batches of real experience for model and critic training.

use burn::prelude::*;

use crate::core::error::{SvgError, SvgResult};
use crate::core::tensor_ops::ensure_dims;

/// Replayed `(s, a, r, s', done)` sequences, all `[batch, time, _]`.
#[derive(Debug, Clone)]
pub struct ModelBatch<B: Backend> {
    /// `[b, t, f]`
    pub observations: Tensor<B, 3>,
    /// `[b, t, a]`
    pub actions: Tensor<B, 3>,
    /// `[b, t, 1]`
    pub rewards: Tensor<B, 3>,
    /// `[b, t, f]`
    pub next_observations: Tensor<B, 3>,
    /// `[b, t, 1]`, 1.0 where the episode terminated.
    pub dones: Tensor<B, 3>,
}

impl<B: Backend> ModelBatch<B> {
    /// Build a batch, rejecting tensors whose batch/time/feature dims disagree.
    pub fn new(
        observations: Tensor<B, 3>,
        actions: Tensor<B, 3>,
        rewards: Tensor<B, 3>,
        next_observations: Tensor<B, 3>,
        dones: Tensor<B, 3>,
    ) -> SvgResult<Self> {
        let [b, t, f] = observations.dims();
        let [_, _, a] = actions.dims();
        ensure_dims("ModelBatch: actions", [b, t, a], actions.dims())?;
        ensure_dims("ModelBatch: rewards", [b, t, 1], rewards.dims())?;
        ensure_dims("ModelBatch: next_observations", [b, t, f], next_observations.dims())?;
        ensure_dims("ModelBatch: dones", [b, t, 1], dones.dims())?;

        Ok(Self {
            observations,
            actions,
            rewards,
            next_observations,
            dones,
        })
    }

    /// Build a batch from host buffers laid out row-major as `[batch, time, _]`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_slices(
        observations: &[f32],
        actions: &[f32],
        rewards: &[f32],
        next_observations: &[f32],
        dones: &[bool],
        batch_size: usize,
        seq_len: usize,
        device: &B::Device,
    ) -> SvgResult<Self> {
        let rows = batch_size * seq_len;
        if rows == 0 {
            return Err(SvgError::shape("ModelBatch: empty batch", &[1, 1], &[batch_size, seq_len]));
        }
        let obs_dim = observations.len() / rows;
        let action_dim = actions.len() / rows;

        let expect_len = |context: &str, len: usize, width: usize| -> SvgResult<()> {
            if len == rows * width && width > 0 {
                Ok(())
            } else {
                Err(SvgError::shape(context, &[rows * width.max(1)], &[len]))
            }
        };
        expect_len("ModelBatch: observations", observations.len(), obs_dim)?;
        expect_len("ModelBatch: actions", actions.len(), action_dim)?;
        expect_len("ModelBatch: rewards", rewards.len(), 1)?;
        expect_len("ModelBatch: next_observations", next_observations.len(), obs_dim)?;
        expect_len("ModelBatch: dones", dones.len(), 1)?;

        let to_tensor = |values: &[f32], width: usize| {
            Tensor::<B, 1>::from_floats(values, device).reshape([batch_size, seq_len, width])
        };
        let dones: Vec<f32> = dones.iter().map(|&d| if d { 1.0 } else { 0.0 }).collect();

        Self::new(
            to_tensor(observations, obs_dim),
            to_tensor(actions, action_dim),
            to_tensor(rewards, 1),
            to_tensor(next_observations, obs_dim),
            to_tensor(&dones, 1),
        )
    }

    pub fn batch_size(&self) -> usize {
        self.observations.dims()[0]
    }

    pub fn seq_len(&self) -> usize {
        self.observations.dims()[1]
    }

    pub fn obs_dim(&self) -> usize {
        self.observations.dims()[2]
    }

    pub fn action_dim(&self) -> usize {
        self.actions.dims()[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_from_slices_shapes() {
        let device = Default::default();
        let batch = ModelBatch::<B>::from_slices(
            &[0.0; 12],
            &[0.0; 4],
            &[1.0, 2.0, 3.0, 4.0],
            &[0.0; 12],
            &[false, false, true, false],
            2,
            2,
            &device,
        )
        .unwrap();

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.seq_len(), 2);
        assert_eq!(batch.obs_dim(), 3);
        assert_eq!(batch.action_dim(), 1);
        assert_eq!(
            batch.dones.into_data().to_vec::<f32>().unwrap(),
            vec![0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_rejects_mismatched_next_observations() {
        let device = Default::default();
        let result = ModelBatch::<B>::new(
            Tensor::zeros([4, 1, 3], &device),
            Tensor::zeros([4, 1, 2], &device),
            Tensor::zeros([4, 1, 1], &device),
            Tensor::zeros([4, 1, 2], &device),
            Tensor::zeros([4, 1, 1], &device),
        );
        assert_eq!(
            result.unwrap_err(),
            SvgError::shape("ModelBatch: next_observations", &[4, 1, 3], &[4, 1, 2])
        );
    }

    #[test]
    fn test_rejects_wrong_reward_count() {
        let device = Default::default();
        let result = ModelBatch::<B>::from_slices(
            &[0.0; 4],
            &[0.0; 2],
            &[0.0; 3],
            &[0.0; 4],
            &[false, false],
            2,
            1,
            &device,
        );
        assert!(matches!(result, Err(SvgError::ShapeMismatch { .. })));
    }
}
