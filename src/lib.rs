//! Numerical inverse kinematics and Cartesian trajectory planning for teleoperated six-axis arms
//!
//! The crate is the kinematic core of a teleoperation console. It does not know the geometry of
//! the robot: forward kinematics is supplied by the host through the [`ForwardKinematics`]
//! trait, and everything else is built on top of it by numerical means.
//!
//! # Features
//!
//! - Damped least squares IK with a finite difference Jacobian, a per-iteration step limit and
//!   hard joint limits. Failures are reported as values, with the closest attempt where useful.
//! - Axis masking: any subset of x, y, z, rx, ry, rz can be excluded from the solve, for
//!   instance to let the wrist orientation float.
//! - Straight line Cartesian segments sampled at a fixed rate, each sample seeded from the
//!   previous solution. Unreachable samples are marked and the segment continues.
//! - A cache of planned segments keyed by a fingerprint of their inputs, with explicit
//!   invalidation and replay of loop iterations shifted by per-keyframe deltas.
//! - Conversion between the robot convention (Z up) and the scene convention (Y up).
//! - YAML configuration of joint limits, solver tuning, tool offset and axis mask.
//!
//! # Units
//!
//! Positions are in millimetres, rotations and joint angles in degrees. Poses handed to the
//! core are always in the robot convention; scene poses are converted at the boundary, see
//! [`coordinates`].
//!
//! [`ForwardKinematics`]: kinematic_traits::ForwardKinematics

pub mod kinematic_traits;

pub mod matrix;

pub mod coordinates;

pub mod constraints;

pub mod axis_mask;

#[path = "utils/utils.rs"]
pub mod utils;

pub mod jacobian;

pub mod ik_solver;

pub mod synthetic_arms;

#[path = "path_plan/cartesian.rs"]
pub mod cartesian;

#[path = "path_plan/trajectory_cache.rs"]
pub mod trajectory_cache;

pub mod config;
pub mod config_error;

#[cfg(test)]
mod tests;
