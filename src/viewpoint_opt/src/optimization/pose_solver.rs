//! Single-pose solver.
//!
//! Each iteration runs the full view pipeline at the current pose, computes
//! the gradient over the free parameters and applies one Adam update per
//! parameter. The run ends when the iteration budget is spent or the
//! execution context is cancelled; there is no convergence test.

use std::time::Instant;

use tracing::{debug, info, trace};

use super::adam::{AdamConfig, AdamGroup};
use super::debug::{mean_ms, IterationDebug, RunDebug};
use super::observer::{should_publish, PoseSnapshot, SolverObserver};
use super::oscillation::{count_oscillation, DEFAULT_OSCILLATION_THRESHOLD};
use super::types::{PoseParamConfig, PoseSolveResult, SolveStatus};
use crate::derivatives::{compute_pose_gradient, GradientMode, GradientSettings};
use crate::error::{Result, ViewOptError};
use crate::geometry::{EulerPose, PointCloud};
use crate::runtime::ExecutionContext;
use crate::scoring::ViewModel;

/// Configuration of the single-pose solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSolverConfig {
    pub params: PoseParamConfig,
    pub adam: AdamConfig,
    /// Iteration budget.
    pub n_steps: usize,
    pub gradient: GradientSettings,
    /// Observer cadence in iterations (0 disables).
    pub publish_every: usize,
}

impl Default for PoseSolverConfig {
    fn default() -> Self {
        Self {
            params: PoseParamConfig::default(),
            adam: AdamConfig::default(),
            n_steps: 10,
            gradient: GradientSettings {
                mode: GradientMode::Auto,
                delta: 0.05,
            },
            publish_every: 4,
        }
    }
}

/// Adam-driven optimizer for one camera pose.
#[derive(Debug, Clone)]
pub struct PoseSolver {
    model: ViewModel,
    config: PoseSolverConfig,
}

impl PoseSolver {
    pub fn new(model: ViewModel, config: PoseSolverConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &ViewModel {
        &self.model
    }

    pub fn config(&self) -> &PoseSolverConfig {
        &self.config
    }

    /// Optimize `initial` against `cloud`.
    ///
    /// # Errors
    /// Returns [`ViewOptError::NonFiniteInput`] if the initial pose has a
    /// non-finite component. Nothing else fails once the run has started.
    pub fn solve(
        &self,
        cloud: &PointCloud,
        initial: &EulerPose,
        ctx: &ExecutionContext,
        observer: &mut dyn SolverObserver,
    ) -> Result<PoseSolveResult> {
        if initial.params().iter().any(|v| !v.is_finite()) {
            return Err(ViewOptError::NonFiniteInput {
                field: "initial pose",
            });
        }

        let specs = self.config.params.specs();
        let learnable = self.config.params.learnable_mask();
        let mut groups: Vec<Option<AdamGroup>> = specs
            .iter()
            .map(|spec| {
                spec.is_free()
                    .then(|| AdamGroup::new(1, spec.lr, self.config.adam))
            })
            .collect();

        let mut params = initial.params();
        let mut track = Vec::with_capacity(self.config.n_steps + 1);
        track.push(initial.position);

        let mut records = Vec::with_capacity(self.config.n_steps);
        let mut status = SolveStatus::BudgetExhausted;
        let mut initial_objective = None;
        let mut completed = 0;

        for iteration in 0..self.config.n_steps {
            if ctx.is_cancelled() {
                info!("Pose optimization cancelled before iteration {iteration}");
                status = SolveStatus::Cancelled;
                break;
            }

            let start = Instant::now();
            let pose = EulerPose::from_params(&params);
            let grad = compute_pose_gradient(
                &self.model,
                cloud,
                &pose,
                &learnable,
                &self.config.gradient,
                ctx,
            );
            initial_objective.get_or_insert(grad.objective());

            // The evaluation may have been cut short; drop it
            if ctx.is_cancelled() {
                info!("Pose optimization cancelled during iteration {iteration}");
                status = SolveStatus::Cancelled;
                break;
            }

            let mut record = IterationDebug::new(iteration);
            record.pose = params.to_vec();
            record.objective = grad.objective();
            record.num_candidates = grad.evaluation.num_candidates;
            record.num_visible = grad.evaluation.num_visible();
            record.gradient = grad.gradient.iter().copied().collect();
            record.sources = grad.sources.to_vec();

            if grad.is_degenerate() {
                debug!("Iteration {iteration}: no visible points, skipping update");
                record.skipped = true;
            } else {
                for (k, group) in groups.iter_mut().enumerate() {
                    if let Some(group) = group {
                        let mut value = [params[k]];
                        group.step(&mut value, &[grad.gradient[k]]);
                        params[k] = value[0];
                    }
                }
                for angle in &mut params[3..] {
                    *angle = wrap_angle(*angle);
                }
            }

            record.pose_after = params.to_vec();
            record.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            trace!("{}", record.to_log_line());

            if should_publish(iteration, self.config.publish_every) {
                observer.on_pose(&PoseSnapshot {
                    iteration,
                    pose: &pose,
                    visible: &grad.evaluation.visible,
                    rewards: &grad.evaluation.rewards,
                    objective: grad.objective(),
                });
            }

            track.push(EulerPose::from_params(&params).position);
            records.push(record);
            completed = iteration + 1;
        }

        let pose = EulerPose::from_params(&params);
        let evaluation = self.model.evaluate(cloud, &pose.transform(), ctx);
        let initial_objective = initial_objective.unwrap_or(evaluation.objective);
        let oscillation = count_oscillation(&track, DEFAULT_OSCILLATION_THRESHOLD);
        let mean_step_ms = mean_ms(records.iter().map(|r| r.elapsed_ms));

        if oscillation.is_oscillating {
            debug!(
                "Position oscillated {} times in a row",
                oscillation.max_oscillation_count
            );
        }
        info!(
            "Pose optimization {}: {completed} iterations, {mean_step_ms:.2} msec/step, \
             objective {initial_objective:.4} -> {:.4}, {} visible",
            status.as_str(),
            evaluation.objective,
            evaluation.num_visible(),
        );

        let debug = RunDebug {
            kind: "pose".to_string(),
            status: status.as_str().to_string(),
            total_iterations: completed,
            final_objective: evaluation.objective,
            oscillation_count: oscillation.max_oscillation_count,
            mean_step_ms,
            iterations: records,
            path_iterations: Vec::new(),
        };

        Ok(PoseSolveResult {
            pose,
            status,
            iterations: completed,
            objective: evaluation.objective,
            initial_objective,
            evaluation,
            oscillation_count: oscillation.max_oscillation_count,
            mean_step_ms,
            debug,
        })
    }
}

/// Wrap an angle to `[-pi, pi]`.
fn wrap_angle(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivatives::GradientSource;
    use crate::optimization::observer::NoopObserver;
    use crate::optimization::types::ParamSpec;
    use crate::runtime::CancelFlag;
    use crate::test_utils::make_wall;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn wall(depth: f64) -> PointCloud {
        PointCloud::new(make_wall(depth, 0.5, 0.1)).unwrap()
    }

    fn analytic_config(params: PoseParamConfig, n_steps: usize) -> PoseSolverConfig {
        PoseSolverConfig {
            params,
            n_steps,
            gradient: GradientSettings {
                mode: GradientMode::Analytic,
                delta: 0.05,
            },
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        iterations: Vec<usize>,
        visible: Vec<usize>,
        cancel_at: Option<(usize, CancelFlag)>,
    }

    impl SolverObserver for Recorder {
        fn on_pose(&mut self, snapshot: &PoseSnapshot<'_>) {
            assert_eq!(snapshot.visible.len(), snapshot.rewards.len());
            self.iterations.push(snapshot.iteration);
            self.visible.push(snapshot.visible.len());
            if let Some((at, flag)) = &self.cancel_at {
                if *at == snapshot.iteration {
                    flag.cancel();
                }
            }
        }
    }

    #[test]
    fn test_wall_at_preferred_distance_is_stationary() {
        let cloud = wall(3.0);
        let solver = PoseSolver::new(
            ViewModel::default(),
            analytic_config(PoseParamConfig::default(), 10),
        );
        let initial = EulerPose::default();

        let result = solver
            .solve(&cloud, &initial, &ExecutionContext::sequential(), &mut NoopObserver)
            .unwrap();

        assert_eq!(result.status, SolveStatus::BudgetExhausted);
        assert_eq!(result.iterations, 10);
        for (a, b) in result.pose.params().iter().zip(initial.params()) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
        assert_relative_eq!(result.objective, result.initial_objective, epsilon = 1e-9);
        for record in &result.debug.iterations {
            assert!(record.gradient.iter().all(|g| g.abs() < 1e-9));
        }
    }

    #[test]
    fn test_moves_toward_preferred_distance() {
        let cloud = wall(4.0);
        let mut params = PoseParamConfig::all_free(0.0);
        params.z = ParamSpec::free(0.1);
        let solver = PoseSolver::new(ViewModel::default(), analytic_config(params, 10));

        let result = solver
            .solve(
                &cloud,
                &EulerPose::default(),
                &ExecutionContext::sequential(),
                &mut NoopObserver,
            )
            .unwrap();

        assert!(result.pose.position.z > 0.5);
        assert!(result.objective < result.initial_objective);
        // Frozen parameters never move
        assert_eq!(result.pose.position.x, 0.0);
        assert_eq!(result.pose.yaw, 0.0);
        assert_eq!(result.debug.iterations[0].sources[0], GradientSource::Frozen);
    }

    #[test]
    fn test_degenerate_iterations_leave_pose_untouched() {
        // Wall behind the camera
        let cloud = wall(-3.0);
        let solver = PoseSolver::new(
            ViewModel::default(),
            PoseSolverConfig {
                params: PoseParamConfig::all_free(0.1),
                ..Default::default()
            },
        );
        let initial = EulerPose::new(0.1, 0.2, 0.0, 0.0, 0.1, 0.0);

        let result = solver
            .solve(&cloud, &initial, &ExecutionContext::sequential(), &mut NoopObserver)
            .unwrap();

        assert_eq!(result.pose, initial);
        assert_eq!(result.objective, 0.0);
        assert_eq!(result.initial_objective, 0.0);
        assert_eq!(result.iterations, 10);
        assert!(result.debug.iterations.iter().all(|r| r.skipped));
        assert!(result.debug.iterations.iter().all(|r| r.pose == r.pose_after));
        assert_eq!(result.oscillation_count, 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cloud = wall(3.0);
        let flag = CancelFlag::new();
        flag.cancel();
        let ctx = ExecutionContext::sequential().with_cancel_flag(flag);
        let initial = EulerPose::new(0.3, 0.0, 0.0, 0.0, 0.0, 0.0);
        let mut recorder = Recorder::default();

        let result = PoseSolver::new(ViewModel::default(), PoseSolverConfig::default())
            .solve(&cloud, &initial, &ctx, &mut recorder)
            .unwrap();

        assert_eq!(result.status, SolveStatus::Cancelled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.pose, initial);
        assert!(recorder.iterations.is_empty());
        assert_relative_eq!(result.initial_objective, result.objective);
    }

    #[test]
    fn test_cancelled_mid_run() {
        let cloud = wall(4.0);
        let flag = CancelFlag::new();
        let ctx = ExecutionContext::sequential().with_cancel_flag(flag.clone());
        let mut recorder = Recorder {
            cancel_at: Some((2, flag)),
            ..Default::default()
        };
        let config = PoseSolverConfig {
            publish_every: 1,
            ..analytic_config(PoseParamConfig::all_free(0.05), 10)
        };

        let result = PoseSolver::new(ViewModel::default(), config)
            .solve(&cloud, &EulerPose::default(), &ctx, &mut recorder)
            .unwrap();

        assert_eq!(result.status, SolveStatus::Cancelled);
        assert_eq!(result.iterations, 3);
        assert_eq!(recorder.iterations, vec![0, 1, 2]);
        let last = result.debug.iterations.last().unwrap();
        assert_eq!(result.pose.params().to_vec(), last.pose_after);
    }

    #[test]
    fn test_observer_cadence() {
        let cloud = wall(3.0);
        let mut recorder = Recorder::default();
        let config = PoseSolverConfig {
            publish_every: 3,
            ..analytic_config(PoseParamConfig::default(), 10)
        };

        PoseSolver::new(ViewModel::default(), config)
            .solve(
                &cloud,
                &EulerPose::default(),
                &ExecutionContext::sequential(),
                &mut recorder,
            )
            .unwrap();

        assert_eq!(recorder.iterations, vec![0, 3, 6, 9]);
        assert!(recorder.visible.iter().all(|n| *n == cloud.len()));
    }

    #[test]
    fn test_rejects_non_finite_pose() {
        let solver = PoseSolver::new(ViewModel::default(), PoseSolverConfig::default());
        let result = solver.solve(
            &wall(3.0),
            &EulerPose::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0),
            &ExecutionContext::sequential(),
            &mut NoopObserver,
        );
        assert!(matches!(result, Err(ViewOptError::NonFiniteInput { .. })));
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(0.3), 0.3, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(2.0 * PI + 0.3), 0.3, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-2.0 * PI - 0.3), -0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_debug_trace_json() {
        let config = analytic_config(PoseParamConfig::default(), 2);
        let result = PoseSolver::new(ViewModel::default(), config)
            .solve(
                &wall(3.0),
                &EulerPose::default(),
                &ExecutionContext::sequential(),
                &mut NoopObserver,
            )
            .unwrap();
        let json = result.debug.to_json().unwrap();
        assert!(json.contains("\"kind\":\"pose\""));
        assert!(json.contains("\"status\":\"budget_exhausted\""));
        assert_eq!(result.debug.iterations.len(), 2);
    }
}
