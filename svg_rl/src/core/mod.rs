//! Core types shared by the SVG losses and learner.

pub mod error;
pub mod preprocess;
pub mod random;
pub mod running_stats;
pub mod target_network;
pub mod tensor_ops;

pub use error::{SvgError, SvgResult};
pub use preprocess::ObservationPreprocessor;
pub use random::PrngKey;
pub use running_stats::RunningMeanStd;
pub use target_network::{hard_copy, soft_update, TargetNetworkConfig, TargetNetworkManager};
pub use tensor_ops::{ensure_dims, tensor_to_scalar, tensor_to_vec};
