//! Explicit gradient-flow annotations.
//!
//! Every network call inside the losses is wrapped in a [`GradientFlow`] so
//! the differentiation boundary is visible at the call site:
//!
//! ```text
//! critic loss                         rollout step
//! ─────────────────────────────────   ─────────────────────────────────
//! V(detach(s))          Trainable     π(detach(s))          Trainable
//! r(s, π(s))            Frozen        r(s, a)               Trainable
//! T(s, π(s))            Frozen        T(s, a)               Trainable
//! V_target(T(s, π(s)))  Frozen        carry ← truncate_backprop(s', β)
//! ```

use burn::prelude::*;

/// Whether gradient may flow back through a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientFlow {
    /// Gradient flows through to the network's parameters and inputs.
    Trainable,
    /// Value is a constant regression target.
    Frozen,
}

impl GradientFlow {
    pub fn apply<B: Backend, const D: usize>(self, tensor: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            GradientFlow::Trainable => tensor,
            GradientFlow::Frozen => tensor.detach(),
        }
    }
}

/// `detach(x) + β·x − β·detach(x)`.
///
/// Forward value is `x` for every β; the gradient reaching `x` is scaled by β.
/// Applied once per imagined step, the gradient from step k back to step 0
/// is attenuated by β^k.
pub fn truncate_backprop<B: Backend, const D: usize>(x: Tensor<B, D>, bp_discount: f32) -> Tensor<B, D> {
    if bp_discount == 1.0 {
        return x;
    }
    let frozen = x.clone().detach();
    if bp_discount == 0.0 {
        return frozen;
    }
    frozen.clone() + x.mul_scalar(bp_discount) - frozen.mul_scalar(bp_discount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray<f32>>;

    fn grad_of_sum(bp_discount: f32) -> (Vec<f32>, Vec<f32>) {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([1.0, -2.0, 3.0], &device).require_grad();
        let y = truncate_backprop(x.clone().mul_scalar(2.0), bp_discount);
        let value = y.clone().into_data().to_vec::<f32>().unwrap();
        // Keep x in the graph even when y is fully detached.
        let loss = y.sum() + x.clone().sum().mul_scalar(0.0);
        let grads = loss.backward();
        let grad = x.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        (value, grad)
    }

    #[test]
    fn test_forward_value_independent_of_bp_discount() {
        for bp in [0.0, 0.25, 0.5, 0.99, 1.0] {
            let (value, _) = grad_of_sum(bp);
            for (v, e) in value.iter().zip([2.0, -4.0, 6.0]) {
                assert!((v - e).abs() < 1e-6, "bp={} value={}", bp, v);
            }
        }
    }

    #[test]
    fn test_gradient_scales_with_bp_discount() {
        for bp in [0.0, 0.25, 0.5, 1.0] {
            let (_, grad) = grad_of_sum(bp);
            for g in grad {
                assert!((g - 2.0 * bp).abs() < 1e-6, "bp={} grad={}", bp, g);
            }
        }
    }

    #[test]
    fn test_frozen_blocks_gradient() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([1.0, 2.0], &device).require_grad();
        let trainable = GradientFlow::Trainable.apply(x.clone().mul_scalar(3.0));
        let frozen = GradientFlow::Frozen.apply(x.clone().mul_scalar(5.0));
        let grads = (trainable + frozen).sum().backward();

        let grad = x.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        assert_eq!(grad, vec![3.0, 3.0]);
    }
}
