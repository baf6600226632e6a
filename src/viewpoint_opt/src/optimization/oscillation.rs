//! Oscillation detection for pose updates.
//!
//! Adam with a fixed budget does not stop on its own, so a position track that
//! keeps reversing direction is the main sign that the learning rate is too
//! large for the scene. Two consecutive movement vectors count as a reversal
//! when the cosine between them is below -0.9 (about 154 degrees).

use nalgebra::Vector3;

/// Threshold on the cosine between consecutive movement vectors.
const INVERSION_VECTOR_THRESHOLD: f64 = -0.9;

/// Movements shorter than this break a reversal streak.
const MIN_MOVEMENT: f64 = 1e-10;

/// Oscillation count above which a run is reported as oscillating.
pub const DEFAULT_OSCILLATION_THRESHOLD: usize = 3;

/// Result of oscillation analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OscillationResult {
    /// Longest run of consecutive reversals.
    pub max_oscillation_count: usize,
    /// Whether the count exceeds the threshold.
    pub is_oscillating: bool,
    /// Track indices at which a reversal was detected.
    pub oscillation_indices: Vec<usize>,
}

/// Count direction reversals in a position track.
///
/// # Arguments
/// * `positions` - Position at the start of each iteration, plus the final one
/// * `threshold` - Count above which `is_oscillating` is set
pub fn count_oscillation(positions: &[Vector3<f64>], threshold: usize) -> OscillationResult {
    if positions.len() < 3 {
        return OscillationResult::default();
    }

    let mut count = 0;
    let mut max_count = 0;
    let mut indices = Vec::new();

    for i in 2..positions.len() {
        let current = positions[i] - positions[i - 1];
        let previous = positions[i - 1] - positions[i - 2];

        let current_norm = current.norm();
        let previous_norm = previous.norm();
        if current_norm < MIN_MOVEMENT || previous_norm < MIN_MOVEMENT {
            count = 0;
            continue;
        }

        let cosine = current.dot(&previous) / (current_norm * previous_norm);
        if cosine < INVERSION_VECTOR_THRESHOLD {
            count += 1;
            indices.push(i);
        } else {
            count = 0;
        }

        max_count = max_count.max(count);
    }

    OscillationResult {
        max_oscillation_count: max_count,
        is_oscillating: max_count > threshold,
        oscillation_indices: indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(xs: &[f64]) -> Vec<Vector3<f64>> {
        xs.iter().map(|&x| Vector3::new(x, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_linear_motion() {
        let result = count_oscillation(&track(&[0.0, 1.0, 2.0, 3.0]), 3);
        assert_eq!(result.max_oscillation_count, 0);
        assert!(!result.is_oscillating);
    }

    #[test]
    fn test_back_and_forth() {
        let result = count_oscillation(&track(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]), 3);
        assert_eq!(result.max_oscillation_count, 5);
        assert!(result.is_oscillating);
        assert_eq!(result.oscillation_indices, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_stationary_breaks_streak() {
        let result = count_oscillation(&track(&[0.0, 1.0, 0.0, 0.0, 1.0, 0.0]), 3);
        assert_eq!(result.max_oscillation_count, 1);
    }

    #[test]
    fn test_curved_motion() {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.5, 0.5, 0.0),
            Vector3::new(1.8, 1.0, 0.0),
        ];
        assert_eq!(count_oscillation(&positions, 3).max_oscillation_count, 0);
    }

    #[test]
    fn test_short_track() {
        assert_eq!(
            count_oscillation(&track(&[0.0, 1.0]), 3),
            OscillationResult::default()
        );
    }
}
