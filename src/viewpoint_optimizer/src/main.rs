mod params;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use viewpoint_opt::{
    CancelFlag, Intrinsics, PathSnapshot, PoseSnapshot, RunDebug, SolverObserver, ViewPlanner,
};

use crate::params::{load_config, load_json, write_json, PathRequest, PoseRequest};

#[derive(Parser, Debug)]
#[command(name = "viewpoint_optimizer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimize a single camera pose
    Pose(RunArgs),
    /// Optimize a waypoint path
    Path(RunArgs),
    /// Score a pose without optimizing it
    Evaluate(RunArgs),
    /// Print the default configuration as JSON
    DefaultConfig,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Request JSON with the point cloud and the initial pose or path
    #[arg(short, long)]
    input: PathBuf,

    /// Optimizer configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Result JSON (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-point visibility report JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Per-iteration debug records JSON
    #[arg(long)]
    debug: Option<PathBuf>,
}

/// Logs intermediate solver states as they are published.
struct LogObserver;

impl SolverObserver for LogObserver {
    fn on_pose(&mut self, snapshot: &PoseSnapshot<'_>) {
        let p = snapshot.pose;
        info!(
            "iter {}: objective={:.4} visible={} position=({:.3}, {:.3}, {:.3}) rpy=({:.3}, {:.3}, {:.3})",
            snapshot.iteration,
            snapshot.objective,
            snapshot.visible.len(),
            p.position.x,
            p.position.y,
            p.position.z,
            p.roll,
            p.pitch,
            p.yaw
        );
    }

    fn on_path(&mut self, snapshot: &PathSnapshot<'_>) {
        let visible: Vec<usize> = snapshot
            .evaluations
            .iter()
            .map(|e| e.num_visible())
            .collect();
        info!(
            "iter {}: objective={:.4} waypoints={} visible={:?}",
            snapshot.iteration,
            snapshot.objective,
            snapshot.waypoints.len(),
            visible
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let args = match cli.command {
        Command::DefaultConfig => {
            return write_json(&viewpoint_opt::OptimizerConfig::default(), None);
        }
        Command::Pose(ref args) | Command::Path(ref args) | Command::Evaluate(ref args) => args,
    };

    let config = load_config(args.config.as_deref())?;
    let cancelled = Arc::new(AtomicBool::new(false));
    let c = cancelled.clone();
    ctrlc::set_handler(move || {
        c.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let planner = ViewPlanner::new(config)
        .context("Invalid optimizer configuration")?
        .with_cancel_flag(CancelFlag::from_arc(cancelled));

    match cli.command {
        Command::Pose(_) => run_pose(&planner, args),
        Command::Path(_) => run_path(&planner, args),
        Command::Evaluate(_) => run_evaluate(&planner, args),
        Command::DefaultConfig => Ok(()),
    }
}

fn run_pose(planner: &ViewPlanner, args: &RunArgs) -> Result<()> {
    let request: PoseRequest = load_json(&args.input)?;
    info!(
        "Optimizing pose over {} points in frame {}",
        request.cloud.points.len(),
        request.cloud.frame_id
    );

    let response = planner
        .optimize_pose_request(&request.cloud, &request.pose, &mut LogObserver)
        .context("Pose optimization failed")?;
    if response.pose.status.is_cancelled() {
        warn!("Interrupted after {} iterations", response.pose.iterations);
    }

    write_json(&response.pose, args.output.as_deref())?;
    write_optional(&response.report, args.report.as_deref())?;
    write_debug(&response.debug, args.debug.as_deref())
}

fn run_path(planner: &ViewPlanner, args: &RunArgs) -> Result<()> {
    let request: PathRequest = load_json(&args.input)?;
    info!(
        "Optimizing {} waypoints over {} points",
        request.path.waypoints.len(),
        request.cloud.points.len()
    );

    let response = planner
        .optimize_path_request(&request.cloud, &request.path, &mut LogObserver)
        .context("Path optimization failed")?;
    if response.path.status.is_cancelled() {
        warn!("Interrupted after {} iterations", response.path.iterations);
    }

    write_json(&response.path, args.output.as_deref())?;
    write_optional(&response.report, args.report.as_deref())?;
    write_debug(&response.debug, args.debug.as_deref())
}

fn run_evaluate(planner: &ViewPlanner, args: &RunArgs) -> Result<()> {
    let request: PoseRequest = load_json(&args.input)?;
    let cloud = request.cloud.to_point_cloud()?;
    let pose = request.pose.to_euler_pose()?;

    let evaluation = match request.pose.intrinsics {
        Some(intrinsics) => with_intrinsics(planner, intrinsics)?.evaluate_pose(&cloud, &pose)?,
        None => planner.evaluate_pose(&cloud, &pose)?,
    };
    info!(
        "objective={:.4} visible={}/{}",
        evaluation.objective,
        evaluation.report.num_visible(),
        cloud.len()
    );

    write_json(&evaluation.report, args.output.as_deref())
}

/// Planner identical to `planner` except for its intrinsics, sharing its cancel flag.
fn with_intrinsics(planner: &ViewPlanner, intrinsics: Intrinsics) -> Result<ViewPlanner> {
    let mut config = planner.config().clone();
    config.intrinsics = intrinsics;
    let planner = ViewPlanner::new(config)
        .context("Invalid request intrinsics")?
        .with_cancel_flag(planner.cancel_flag().clone());
    Ok(planner)
}

fn write_optional<T: serde::Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => write_json(value, Some(path)),
        None => Ok(()),
    }
}

fn write_debug(debug: &RunDebug, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        info!(
            "{} run: {} iterations, {:.3} msec/step",
            debug.kind, debug.total_iterations, debug.mean_step_ms
        );
        let json = debug.to_json().context("Failed to serialize debug trace")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_intrinsics_keeps_cancel_flag() {
        let flag = CancelFlag::new();
        let planner = ViewPlanner::builder().cancel_flag(flag.clone()).build().unwrap();
        let intrinsics = Intrinsics {
            width: 320,
            height: 240,
            ..Default::default()
        };

        let derived = with_intrinsics(&planner, intrinsics).unwrap();
        assert_eq!(derived.config().intrinsics, intrinsics);
        assert!(!derived.cancel_flag().is_cancelled());

        flag.cancel();
        assert!(derived.cancel_flag().is_cancelled());
    }

    #[test]
    fn test_with_intrinsics_rejects_invalid() {
        let planner = ViewPlanner::builder().build().unwrap();
        let intrinsics = Intrinsics {
            fx: -1.0,
            ..Default::default()
        };
        assert!(with_intrinsics(&planner, intrinsics).is_err());
    }
}
