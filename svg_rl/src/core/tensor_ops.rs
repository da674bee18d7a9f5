//! Small tensor helpers shared by the losses and the learner.

use crate::core::error::{SvgError, SvgResult};
use burn::prelude::*;

/// Read a one-element tensor back to the host.
pub fn tensor_to_scalar<B: Backend>(tensor: &Tensor<B, 1>) -> f32 {
    tensor.clone().into_data().iter::<f32>().next().unwrap_or(f32::NAN)
}

/// Copy a tensor's values to the host in row-major order.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Vec<f32> {
    tensor.clone().into_data().iter::<f32>().collect()
}

/// Fail with `ShapeMismatch` unless `actual == expected`.
pub fn ensure_dims<const D: usize>(
    context: &str,
    expected: [usize; D],
    actual: [usize; D],
) -> SvgResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SvgError::shape(context, &expected, &actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_scalar_and_vec() {
        let device = Default::default();
        let t = Tensor::<B, 1>::from_floats([2.5], &device);
        assert_eq!(tensor_to_scalar(&t), 2.5);

        let m = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        assert_eq!(tensor_to_vec(&m), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_ensure_dims() {
        assert!(ensure_dims("obs", [4, 1, 3], [4, 1, 3]).is_ok());
        let err = ensure_dims("obs", [4, 1, 3], [4, 2, 3]).unwrap_err();
        assert_eq!(err, SvgError::shape("obs", &[4, 1, 3], &[4, 2, 3]));
    }
}
