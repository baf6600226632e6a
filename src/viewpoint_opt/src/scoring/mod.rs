//! Reward model and full view evaluation.
//!
//! - **Reward**: Gaussian in the distance of each visible point to the camera
//! - **Objective**: negated sum or mean of rewards; zero for an empty view
//! - **Pipeline**: culling, occlusion and reward for one camera pose

pub mod pipeline;
pub mod reward;

pub use pipeline::{ViewEvaluation, ViewModel};
pub use reward::{Aggregation, RewardDistance, RewardModel, RewardParams};
