//! Observation hook for publishing intermediate solver state.

use crate::filtering::CameraPoint;
use crate::geometry::{EulerPose, Waypoint};
use crate::scoring::ViewEvaluation;

/// State of the single-pose solver at one published iteration.
#[derive(Debug, Clone, Copy)]
pub struct PoseSnapshot<'a> {
    pub iteration: usize,
    /// Pose the visible set was computed at.
    pub pose: &'a EulerPose,
    /// Visible points in camera frame.
    pub visible: &'a [CameraPoint],
    /// Reward per visible point.
    pub rewards: &'a [f64],
    pub objective: f64,
}

/// State of the trajectory solver at one published iteration.
#[derive(Debug, Clone, Copy)]
pub struct PathSnapshot<'a> {
    pub iteration: usize,
    /// Waypoints the evaluations were computed at.
    pub waypoints: &'a [Waypoint],
    /// One evaluation per waypoint.
    pub evaluations: &'a [ViewEvaluation],
    /// Total objective including penalties.
    pub objective: f64,
}

/// Receives solver state every `publish_every` iterations.
///
/// Never called for an iteration interrupted by cancellation.
pub trait SolverObserver {
    fn on_pose(&mut self, _snapshot: &PoseSnapshot<'_>) {}

    fn on_path(&mut self, _snapshot: &PathSnapshot<'_>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SolverObserver for NoopObserver {}

/// Whether `iteration` falls on the publishing cadence. Zero disables publishing.
pub(crate) fn should_publish(iteration: usize, publish_every: usize) -> bool {
    publish_every > 0 && iteration % publish_every == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence() {
        let published: Vec<usize> = (0..10).filter(|i| should_publish(*i, 4)).collect();
        assert_eq!(published, vec![0, 4, 8]);
        assert!((0..10).all(|i| !should_publish(i, 0)));
        assert!((0..10).all(|i| should_publish(i, 1)));
    }
}
