//! Hidden point removal.
//!
//! Decides, per frustum candidate, whether the point is seen from the camera
//! or hidden behind nearer points. The decision is discrete: a small pose
//! change can flip a point between [`Visibility::Visible`] and
//! [`Visibility::Occluded`]. Callers treat the result as piecewise constant
//! and recompute it every iteration.

pub mod hull;
mod hpr;

pub use hpr::{hidden_point_removal, visible_subset};

use serde::{Deserialize, Serialize};

/// Occlusion test parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionParams {
    /// When false every frustum candidate is visible.
    pub enabled: bool,
    /// Flip sphere radius is `max |p| * 10^radius_exponent`.
    pub radius_exponent: f64,
}

impl Default for OcclusionParams {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_exponent: 2.0,
        }
    }
}

impl OcclusionParams {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Per-point outcome of the occlusion test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Occluded,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}
