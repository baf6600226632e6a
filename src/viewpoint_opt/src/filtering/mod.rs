//! Frustum culling of world points against a camera.
//!
//! A point survives when, expressed in the camera frame:
//! - its depth (z) lies in `[min_dist, max_dist]`
//! - its pinhole projection falls inside `[0, width) x [0, height)`
//!
//! # Example
//!
//! ```ignore
//! use viewpoint_opt::filtering::{frustum_cull, FrustumParams};
//!
//! let params = FrustumParams { min_dist: 1.0, max_dist: 5.0 };
//! let result = frustum_cull(&cloud, &pose.transform(), &intrinsics, &params, &ctx);
//! println!("{} candidates", result.points.len());
//! ```

mod frustum;

pub use frustum::{classify_point, frustum_cull, Classification};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Depth range of the viewing volume.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrustumParams {
    /// Minimum depth along the camera forward axis
    pub min_dist: f64,
    /// Maximum depth along the camera forward axis
    pub max_dist: f64,
}

impl Default for FrustumParams {
    fn default() -> Self {
        Self {
            min_dist: 1.0,
            max_dist: 5.0,
        }
    }
}

/// A point that passed culling, with its camera-frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPoint {
    /// Index into the input cloud
    pub index: usize,
    /// Coordinates in the camera frame
    pub camera: Vector3<f64>,
}

/// Result of frustum culling.
#[derive(Debug, Clone, Default)]
pub struct FrustumResult {
    /// Surviving points in input order
    pub points: Vec<CameraPoint>,
    /// Number of points removed by the depth range
    pub removed_by_depth: usize,
    /// Number of points projecting outside the image
    pub removed_by_image: usize,
}

impl FrustumResult {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
