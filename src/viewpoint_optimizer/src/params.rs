//! Request and configuration files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use viewpoint_opt::{InitialPath, InitialPose, OptimizerConfig, PointCloudSnapshot};

/// Single-pose request file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseRequest {
    pub cloud: PointCloudSnapshot,
    pub pose: InitialPose,
}

/// Trajectory request file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRequest {
    pub cloud: PointCloudSnapshot,
    pub path: InitialPath,
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the optimizer configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<OptimizerConfig> {
    match path {
        Some(path) => load_json(path),
        None => Ok(OptimizerConfig::default()),
    }
}

/// Write pretty JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match path {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
