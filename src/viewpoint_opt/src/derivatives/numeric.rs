//! Central finite differences through the full pipeline.
//!
//! Unlike the analytic path these re-run culling and occlusion at each probe,
//! so they see objective changes caused by points entering or leaving the
//! visible set.

use crate::scoring::ViewEvaluation;

/// Objective differences within this many relative ulps of the objective
/// are summation round-off, not signal.
const ROUNDOFF_ULPS: f64 = 1e3;

/// Result of probing one parameter at `±delta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    /// Central-difference derivative of the objective.
    pub derivative: f64,
    /// Whether either probe selected a different visible set than the base.
    pub membership_changed: bool,
}

/// Probe one parameter.
///
/// `evaluate(step)` must return the pipeline output with the parameter offset
/// by `step`. A derivative below the round-off floor of the objective is
/// reported as exactly zero, so a pose sitting at an optimum stays there.
pub fn probe_parameter<F>(base: &ViewEvaluation, delta: f64, evaluate: F) -> Probe
where
    F: Fn(f64) -> ViewEvaluation,
{
    let plus = evaluate(delta);
    let minus = evaluate(-delta);
    Probe {
        derivative: central_difference(plus.objective, minus.objective, delta),
        membership_changed: !base.same_visible_set(&plus) || !base.same_visible_set(&minus),
    }
}

fn central_difference(plus: f64, minus: f64, delta: f64) -> f64 {
    let derivative = (plus - minus) / (2.0 * delta);
    let floor = ROUNDOFF_ULPS * f64::EPSILON * plus.abs().max(minus.abs()) / delta;
    if derivative.abs() <= floor {
        0.0
    } else {
        derivative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::CameraPoint;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_central_difference_sin() {
        for delta in [1e-2, 1e-3, 1e-4] {
            let x = 0.7f64;
            let d = central_difference((x + delta).sin(), (x - delta).sin(), delta);
            assert_relative_eq!(d, x.cos(), max_relative = 1e-3);
        }
    }

    #[test]
    fn test_central_difference_roundoff_is_zero() {
        // One ulp apart at the scale of a 121-point objective
        let plus = -121.0;
        let minus = plus + 121.0 * f64::EPSILON;
        assert_eq!(central_difference(plus, minus, 0.05), 0.0);
        assert_eq!(central_difference(minus, plus, 1e-4), 0.0);

        // A real slope well above the floor survives
        let d = central_difference(-121.0 + 1e-6, -121.0 - 1e-6, 0.05);
        assert_relative_eq!(d, 2e-5, max_relative = 1e-6);
    }

    #[test]
    fn test_probe_detects_membership_change() {
        let point = |index| CameraPoint {
            index,
            camera: Vector3::new(0.0, 0.0, 3.0),
        };
        let base = ViewEvaluation {
            visible: vec![point(0), point(1)],
            rewards: vec![1.0, 1.0],
            objective: -2.0,
            num_candidates: 2,
        };

        let probe = probe_parameter(&base, 0.5, |step| {
            if step > 0.0 {
                ViewEvaluation {
                    visible: vec![point(0)],
                    rewards: vec![1.0],
                    objective: -1.0,
                    num_candidates: 1,
                }
            } else {
                base.clone()
            }
        });

        assert!(probe.membership_changed);
        assert_relative_eq!(probe.derivative, 1.0);

        let stable = probe_parameter(&base, 0.5, |_| base.clone());
        assert!(!stable.membership_changed);
        assert_eq!(stable.derivative, 0.0);
    }
}
