//! Trajectory solver.
//!
//! Jointly refines an ordered sequence of waypoints. The objective is the sum
//! of each waypoint's view objective plus weighted smoothness and length
//! penalties on the positions. Positions and quaternions form two Adam groups
//! with their own learning rates; a zero rate freezes a group. Quaternions
//! are kept raw during the run and normalized on every read and on output.

use std::time::Instant;

use nalgebra::{Vector3, Vector4};
use tracing::{debug, info, trace};

use super::adam::{AdamConfig, AdamGroup};
use super::debug::{mean_ms, PathIterationDebug, RunDebug};
use super::observer::{should_publish, PathSnapshot, SolverObserver};
use super::oscillation::{count_oscillation, DEFAULT_OSCILLATION_THRESHOLD};
use super::regularization::RegularizationConfig;
use super::types::{SolveStatus, TrajectorySolveResult};
use crate::derivatives::{
    compute_waypoint_gradient, GradientMode, GradientSettings, GradientSource,
};
use crate::error::{Result, ViewOptError};
use crate::geometry::{check_unit_quaternion, PointCloud, Waypoint};
use crate::runtime::ExecutionContext;
use crate::scoring::{ViewEvaluation, ViewModel};

/// Configuration of the trajectory solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySolverConfig {
    /// Learning rate of waypoint positions.
    pub lr_pose: f64,
    /// Learning rate of waypoint quaternions (0 freezes orientation).
    pub lr_quat: f64,
    pub adam: AdamConfig,
    pub regularization: RegularizationConfig,
    pub n_steps: usize,
    pub gradient: GradientSettings,
    pub publish_every: usize,
}

impl Default for TrajectorySolverConfig {
    fn default() -> Self {
        Self {
            lr_pose: 0.1,
            lr_quat: 0.0,
            adam: AdamConfig::default(),
            regularization: RegularizationConfig::default(),
            n_steps: 10,
            gradient: GradientSettings {
                mode: GradientMode::Analytic,
                delta: 0.05,
            },
            publish_every: 4,
        }
    }
}

impl TrajectorySolverConfig {
    fn learnable_mask(&self) -> [bool; 7] {
        let pos = self.lr_pose > 0.0;
        let quat = self.lr_quat > 0.0;
        [pos, pos, pos, quat, quat, quat, quat]
    }
}

/// Validate a path before optimization: at least two waypoints, finite
/// positions and unit quaternions.
pub fn validate_path(waypoints: &[Waypoint]) -> Result<()> {
    if waypoints.len() < 2 {
        return Err(ViewOptError::TooFewWaypoints(waypoints.len()));
    }
    for (index, waypoint) in waypoints.iter().enumerate() {
        if waypoint.position.iter().any(|v| !v.is_finite()) {
            return Err(ViewOptError::NonFiniteInput {
                field: "waypoint position",
            });
        }
        check_unit_quaternion(index, &waypoint.quat)?;
    }
    Ok(())
}

/// Full objective of a path: view terms plus weighted penalties.
#[derive(Debug, Clone, Default)]
struct PathObjective {
    total: f64,
    view: f64,
    smoothness: f64,
    length: f64,
}

/// Adam-driven optimizer for a waypoint sequence.
#[derive(Debug, Clone)]
pub struct TrajectorySolver {
    model: ViewModel,
    config: TrajectorySolverConfig,
}

impl TrajectorySolver {
    pub fn new(model: ViewModel, config: TrajectorySolverConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &TrajectorySolverConfig {
        &self.config
    }

    /// Optimize `initial` against `cloud`.
    ///
    /// # Errors
    /// Fewer than two waypoints, non-finite positions or non-unit quaternions
    /// are rejected before the first iteration.
    pub fn solve(
        &self,
        cloud: &PointCloud,
        initial: &[Waypoint],
        ctx: &ExecutionContext,
        observer: &mut dyn SolverObserver,
    ) -> Result<TrajectorySolveResult> {
        validate_path(initial)?;

        let n = initial.len();
        let learnable = self.config.learnable_mask();

        // Flat parameter buffers, one Adam group each
        let mut positions: Vec<f64> = initial
            .iter()
            .flat_map(|w| [w.position.x, w.position.y, w.position.z])
            .collect();
        let mut quats: Vec<f64> = initial
            .iter()
            .flat_map(|w| {
                let q = w.normalized_quat();
                [q[0], q[1], q[2], q[3]]
            })
            .collect();
        let mut position_group = AdamGroup::new(3 * n, self.config.lr_pose, self.config.adam);
        let mut quat_group = AdamGroup::new(4 * n, self.config.lr_quat, self.config.adam);

        let mut tracks: Vec<Vec<Vector3<f64>>> =
            initial.iter().map(|w| vec![w.position]).collect();
        let mut records = Vec::with_capacity(self.config.n_steps);
        let mut status = SolveStatus::BudgetExhausted;
        let mut initial_objective = None;
        let mut completed = 0;

        for iteration in 0..self.config.n_steps {
            if ctx.is_cancelled() {
                info!("Trajectory optimization cancelled before iteration {iteration}");
                status = SolveStatus::Cancelled;
                break;
            }

            let start = Instant::now();
            let waypoints = unpack(&positions, &quats);
            let grads: Vec<_> = waypoints
                .iter()
                .map(|w| {
                    compute_waypoint_gradient(
                        &self.model,
                        cloud,
                        w,
                        &learnable,
                        &self.config.gradient,
                        ctx,
                    )
                })
                .collect();

            if ctx.is_cancelled() {
                info!("Trajectory optimization cancelled during iteration {iteration}");
                status = SolveStatus::Cancelled;
                break;
            }

            let centers: Vec<Vector3<f64>> = waypoints.iter().map(|w| w.position).collect();
            let (penalty, smoothness, length, penalty_grad) =
                self.config.regularization.evaluate(&centers);
            let view: f64 = grads.iter().map(|g| g.objective()).sum();
            let objective = view + penalty;
            initial_objective.get_or_insert(objective);

            for (i, grad) in grads.iter().enumerate() {
                if grad.evaluation.is_degenerate() {
                    debug!("Iteration {iteration}: waypoint {i} sees no points");
                }
            }

            let position_grad: Vec<f64> = grads
                .iter()
                .zip(&penalty_grad)
                .flat_map(|(g, p)| {
                    let total = if learnable[0] { g.position + p } else { Vector3::zeros() };
                    [total.x, total.y, total.z]
                })
                .collect();
            let quat_grad: Vec<f64> = grads
                .iter()
                .flat_map(|g| [g.quat[0], g.quat[1], g.quat[2], g.quat[3]])
                .collect();

            position_group.step(&mut positions, &position_grad);
            quat_group.step(&mut quats, &quat_grad);

            let record = PathIterationDebug {
                iteration,
                objective,
                view_objective: view,
                smoothness,
                length,
                num_visible: grads.iter().map(|g| g.evaluation.num_visible()).collect(),
                position_gradient_norm: norm(&position_grad),
                quat_gradient_norm: norm(&quat_grad),
                num_finite_difference: grads
                    .iter()
                    .flat_map(|g| g.sources.iter())
                    .filter(|s| **s == GradientSource::FiniteDifference)
                    .count(),
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            };
            trace!("{}", record.to_log_line());

            if should_publish(iteration, self.config.publish_every) {
                let evaluations: Vec<ViewEvaluation> =
                    grads.into_iter().map(|g| g.evaluation).collect();
                observer.on_path(&PathSnapshot {
                    iteration,
                    waypoints: &waypoints,
                    evaluations: &evaluations,
                    objective,
                });
            }

            for (track, chunk) in tracks.iter_mut().zip(positions.chunks_exact(3)) {
                track.push(Vector3::new(chunk[0], chunk[1], chunk[2]));
            }
            records.push(record);
            completed = iteration + 1;
        }

        let waypoints: Vec<Waypoint> = unpack(&positions, &quats)
            .into_iter()
            .map(|w| Waypoint::new(w.position, w.normalized_quat()))
            .collect();
        let evaluations: Vec<ViewEvaluation> = waypoints
            .iter()
            .map(|w| self.model.evaluate(cloud, &w.transform(), ctx))
            .collect();
        let final_objective = self.path_objective(&waypoints, &evaluations);
        let initial_objective = initial_objective.unwrap_or(final_objective.total);

        let oscillation_count = tracks
            .iter()
            .map(|t| count_oscillation(t, DEFAULT_OSCILLATION_THRESHOLD).max_oscillation_count)
            .max()
            .unwrap_or(0);
        let mean_step_ms = mean_ms(records.iter().map(|r| r.elapsed_ms));

        info!(
            "Trajectory optimization {}: {n} waypoints, {completed} iterations, \
             {mean_step_ms:.2} msec/step, objective {initial_objective:.4} -> {:.4}",
            status.as_str(),
            final_objective.total,
        );

        let debug = RunDebug {
            kind: "trajectory".to_string(),
            status: status.as_str().to_string(),
            total_iterations: completed,
            final_objective: final_objective.total,
            oscillation_count,
            mean_step_ms,
            iterations: Vec::new(),
            path_iterations: records,
        };

        Ok(TrajectorySolveResult {
            waypoints,
            status,
            iterations: completed,
            objective: final_objective.total,
            view_objective: final_objective.view,
            smoothness: final_objective.smoothness,
            length: final_objective.length,
            initial_objective,
            evaluations,
            oscillation_count,
            mean_step_ms,
            debug,
        })
    }

    fn path_objective(
        &self,
        waypoints: &[Waypoint],
        evaluations: &[ViewEvaluation],
    ) -> PathObjective {
        let centers: Vec<Vector3<f64>> = waypoints.iter().map(|w| w.position).collect();
        let (penalty, smoothness, length, _) = self.config.regularization.evaluate(&centers);
        let view: f64 = evaluations.iter().map(|e| e.objective).sum();
        PathObjective {
            total: view + penalty,
            view,
            smoothness,
            length,
        }
    }
}

fn unpack(positions: &[f64], quats: &[f64]) -> Vec<Waypoint> {
    positions
        .chunks_exact(3)
        .zip(quats.chunks_exact(4))
        .map(|(p, q)| {
            Waypoint::new(
                Vector3::new(p[0], p[1], p[2]),
                Vector4::new(q[0], q[1], q[2], q[3]),
            )
        })
        .collect()
}

fn norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}
