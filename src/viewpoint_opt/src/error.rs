//! Error types for request validation.
//!
//! Only malformed input is an error. Degenerate visibility, numerical guards,
//! backend fallback and cancellation are handled inside a run and reported
//! through result status fields instead.

use thiserror::Error;

/// Errors raised when a request is rejected before any iteration runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewOptError {
    #[error("invalid point cloud: {0}")]
    InvalidPointCloud(String),

    #[error("point cloud is empty")]
    EmptyPointCloud,

    #[error("non-finite value in {field}")]
    NonFiniteInput { field: &'static str },

    #[error("path needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("quaternion at index {index} is not unit length (norm={norm})")]
    NonUnitQuaternion { index: usize, norm: f64 },

    #[error("invalid intrinsics: {0}")]
    InvalidIntrinsics(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ViewOptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ViewOptError::TooFewWaypoints(1);
        assert_eq!(err.to_string(), "path needs at least 2 waypoints, got 1");

        let err = ViewOptError::NonUnitQuaternion {
            index: 3,
            norm: 2.0,
        };
        assert!(err.to_string().contains("index 3"));
    }
}
