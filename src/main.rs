use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use teleop_kinematics::cartesian::Trajectory;
use teleop_kinematics::config::KinematicsConfig;
use teleop_kinematics::kinematic_traits::{CartesianPose, ForwardKinematics, Joints};
use teleop_kinematics::synthetic_arms::{GantryArm, PlanarArm};
use teleop_kinematics::utils::{format_joints, format_pose};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Arm {
    /// Every joint drives one pose component
    Gantry,
    /// Two link arm in the XY plane
    Planar,
}

/// Plans one straight Cartesian segment against a synthetic arm and prints the waypoints.
#[derive(Parser, Debug)]
#[command(name = "plan-dry-run", version, about)]
struct Cli {
    /// YAML configuration (joint limits, solver, planner, tool, axis mask)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Arm::Gantry)]
    arm: Arm,

    /// Start joints in degrees, comma separated. They are clamped into the joint limits
    /// (PAROL6 unless configured) and the start pose is their forward kinematics
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true,
          default_values_t = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0])]
    from: Vec<f64>,

    /// End pose x,y,z,rx,ry,rz in mm and degrees
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    to: Vec<f64>,

    /// Duration of the motion, seconds
    #[arg(short, long, default_value_t = 1.0)]
    duration: f64,

    /// Print the trajectory as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn to_six(values: &[f64], what: &str) -> Result<[f64; 6]> {
    match <[f64; 6]>::try_from(values) {
        Ok(six) => Ok(six),
        Err(_) => bail!("{} needs 6 values, got {}", what, values.len()),
    }
}

fn print_table(trajectory: &Trajectory) {
    for (i, waypoint) in trajectory.waypoints.iter().enumerate() {
        println!(
            "{:4} {} {} {}",
            i,
            if waypoint.valid { "ok  " } else { "FAIL" },
            format_joints(&waypoint.joint_angles),
            format_pose(&waypoint.pose)
        );
    }
    println!("{} of {} samples reachable", trajectory.valid_count(), trajectory.len());
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => KinematicsConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => KinematicsConfig::default(),
    };

    let robot: Arc<dyn ForwardKinematics> = match cli.arm {
        Arm::Gantry => Arc::new(GantryArm::new(10.0)),
        Arm::Planar => Arc::new(PlanarArm::new(200.0, 150.0)),
    };

    let seed: Joints = config.limits.clamp(&to_six(&cli.from, "--from")?);
    let end = CartesianPose::from_array(to_six(&cli.to, "--to")?);
    let start = robot
        .forward(&seed, &config.tool)
        .context("Forward kinematics undefined at the start joints")?;

    let planner = config.planner(robot);
    let trajectory = planner.plan(&start, &end, &seed, cli.duration, &config.tool, config.axis_mask);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&trajectory)?);
    } else {
        print_table(&trajectory);
    }
    Ok(())
}
