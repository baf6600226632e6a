//! Gradient of the view objective with respect to pose parameters.
//!
//! Projection and reward are differentiable; the occlusion test is not. Two
//! gradient sources are available and combined per parameter:
//!
//! - **Analytic**: exact derivative of `-w Σ r(d(p_c))` with the visible set
//!   held fixed at the current pose (straight-through)
//! - **Finite difference**: `(f(p + δ) - f(p - δ)) / 2δ` through the full
//!   pipeline, occlusion included
//!
//! Under [`GradientMode::Auto`] a parameter keeps its analytic component unless
//! a `±δ` probe changes which points are visible, in which case the central
//! difference replaces it. A zero-visibility evaluation always yields a zero
//! gradient.

pub mod analytic;
pub mod engine;
pub mod numeric;
pub mod types;

pub use analytic::{euler_pose_gradient, waypoint_gradient};
pub use engine::{compute_pose_gradient, compute_waypoint_gradient, GradientSettings};
pub use numeric::{probe_parameter, Probe};
pub use types::{GradientMode, GradientSource, PoseGradient, WaypointGradient};
