//! Numerical inverse kinematics by damped least squares.
//!
//! The solver only needs forward kinematics, which it treats as an oracle: the Jacobian is
//! estimated by finite differences, so no analytic model of the kinematic chain is required.
//! It returns a single local solution found from the caller's seed. Every iterate is
//! clamped into the joint limits, so any joints returned respect the limits.
//!
//! ```
//! use std::sync::Arc;
//! use teleop_kinematics::axis_mask::IkAxisMask;
//! use teleop_kinematics::constraints::JointLimits;
//! use teleop_kinematics::ik_solver::IkSolver;
//! use teleop_kinematics::kinematic_traits::{CartesianPose, ToolOffset};
//! use teleop_kinematics::synthetic_arms::GantryArm;
//!
//! let solver = IkSolver::new(Arc::new(GantryArm::new(10.0)), JointLimits::symmetric(180.0));
//! let target = CartesianPose::new(120.0, -40.0, 35.0, 10.0, 0.0, -25.0);
//! let result = solver.solve(&target, &[0.0; 6], &ToolOffset::NONE, IkAxisMask::ALL);
//! assert!(result.success);
//! println!("Solved in {} iterations: {:?}", result.iterations, result.joint_angles);
//! ```

use std::fmt;
use std::sync::Arc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use crate::axis_mask::IkAxisMask;
use crate::constraints::JointLimits;
use crate::jacobian::Jacobian;
use crate::kinematic_traits::{CartesianPose, FIRST_ROTATION, ForwardKinematics, Joints, ToolOffset};
use crate::utils::{format_joints, format_pose, joints_finite, wrap_degrees};

/// Tuning of the solver. Angles are in degrees, the tolerance applies to the combined
/// position (mm) and orientation (degrees) error norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParameters {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Damping λ added to J·Jᵗ before inversion
    pub damping: f64,
    /// Joint perturbation for the finite difference Jacobian
    pub jacobian_step: f64,
    /// Largest change of a single joint per iteration
    pub max_step: f64,
}

impl Default for SolverParameters {
    fn default() -> Self {
        SolverParameters {
            max_iterations: 30,
            tolerance: 1.0,
            damping: 0.1,
            jacobian_step: 0.01,
            max_step: 5.0,
        }
    }
}

/// Reasons why the solve did not converge. None of these are fatal: the caller may retry
/// with another seed, relax the tolerance or report to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IkFailure {
    /// The forward kinematics model is not available
    NoKinematicModel,
    /// The target pose or the seed contains NaN or infinity
    InvalidInput,
    /// Forward kinematics failed for the current iterate
    FkFailure,
    /// Forward kinematics failed for one of the perturbed joint sets
    JacobianFailure,
    /// The damped system could not be inverted
    Singular,
    /// The iteration budget was exhausted without reaching the tolerance
    OutOfReach,
}

impl IkFailure {
    /// Failures that may go away when the solve is started from a different seed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IkFailure::JacobianFailure | IkFailure::Singular | IkFailure::OutOfReach)
    }
}

impl fmt::Display for IkFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IkFailure::NoKinematicModel => write!(f, "Kinematic model is not loaded"),
            IkFailure::InvalidInput => write!(f, "Target pose or seed is not finite"),
            IkFailure::FkFailure => write!(f, "Forward kinematics failed"),
            IkFailure::JacobianFailure => write!(f, "Forward kinematics failed while estimating the Jacobian"),
            IkFailure::Singular => write!(f, "Singular configuration, damped inversion failed"),
            IkFailure::OutOfReach => write!(f, "Target out of reach within the iteration budget"),
        }
    }
}

impl std::error::Error for IkFailure {}

/// Outcome of a single solve, with the diagnostics needed to report it.
///
/// `joint_angles` holds the solution on success and the best attempt on `OutOfReach`.
/// After `FkFailure` and `Singular` it holds the iterate the solver stopped at (the seed if
/// that happened on the first iteration). It is None after `NoKinematicModel`,
/// `InvalidInput` and `JacobianFailure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkResult {
    pub success: bool,
    pub joint_angles: Option<Joints>,
    /// Number of steps applied
    pub iterations: usize,
    /// Error norm at the returned joints, infinite if it was never measured
    pub final_error: f64,
    pub failure: Option<IkFailure>,
}

impl IkResult {
    fn converged(joints: Joints, iterations: usize, error: f64) -> Self {
        IkResult {
            success: true,
            joint_angles: Some(joints),
            iterations,
            final_error: error,
            failure: None,
        }
    }

    fn failed(failure: IkFailure, joints: Option<Joints>, iterations: usize, error: f64) -> Self {
        IkResult {
            success: false,
            joint_angles: joints,
            iterations,
            final_error: error,
            failure: Some(failure),
        }
    }

    /// Joints of a converged solve. Best attempts of failed solves are not returned here.
    pub fn solution(&self) -> Option<Joints> {
        if self.success { self.joint_angles } else { None }
    }
}

/// Per-axis error between target and current pose. Masked out axes are zero, rotations are
/// wrapped into [-180, 180].
pub fn pose_error(target: &CartesianPose, current: &CartesianPose, mask: IkAxisMask) -> [f64; 6] {
    let target = target.to_array();
    let current = current.to_array();
    let enabled = mask.enabled();
    std::array::from_fn(|i| {
        if !enabled[i] {
            0.0
        } else if i < FIRST_ROTATION {
            target[i] - current[i]
        } else {
            wrap_degrees(target[i] - current[i])
        }
    })
}

/// Euclidean norm over all six components. Millimeters and degrees share this one norm.
pub fn error_norm(error: &[f64; 6]) -> f64 {
    error.iter().map(|e| e * e).sum::<f64>().sqrt()
}

/// Damped least squares IK solver over a forward kinematics oracle.
#[derive(Clone)]
pub struct IkSolver {
    pub robot: Arc<dyn ForwardKinematics>,
    pub limits: JointLimits,
    pub parameters: SolverParameters,
}

impl IkSolver {
    pub fn new(robot: Arc<dyn ForwardKinematics>, limits: JointLimits) -> Self {
        IkSolver {
            robot,
            limits,
            parameters: SolverParameters::default(),
        }
    }

    pub fn with_parameters(robot: Arc<dyn ForwardKinematics>, limits: JointLimits,
                           parameters: SolverParameters) -> Self {
        IkSolver { robot, limits, parameters }
    }

    /// Solve for joints that bring the tool center point to `target` on the axes enabled in
    /// `mask`, starting from `seed`.
    pub fn solve(&self, target: &CartesianPose, seed: &Joints, tool: &ToolOffset, mask: IkAxisMask) -> IkResult {
        if !self.robot.model_loaded() {
            return IkResult::failed(IkFailure::NoKinematicModel, None, 0, f64::INFINITY);
        }
        if !target.is_finite() || !joints_finite(seed) {
            debug!("IK: rejecting non-finite input, target {}, seed {}", format_pose(target), format_joints(seed));
            return IkResult::failed(IkFailure::InvalidInput, None, 0, f64::INFINITY);
        }

        let robot = self.robot.as_ref();
        let parameters = &self.parameters;
        let mut joints = self.limits.clamp(seed);
        let mut last_error = f64::INFINITY;

        for iteration in 0..parameters.max_iterations {
            let Some(current) = robot.forward(&joints, tool) else {
                debug!("IK: forward kinematics failed at {}", format_joints(&joints));
                return IkResult::failed(IkFailure::FkFailure, Some(joints), iteration, last_error);
            };

            let error = pose_error(target, &current, mask);
            let norm = error_norm(&error);
            last_error = norm;
            trace!("IK iteration {}: error {:.4} at {}", iteration, norm, format_joints(&joints));

            if norm < parameters.tolerance {
                debug!("IK converged after {} iterations, error {:.4}", iteration, norm);
                return IkResult::converged(joints, iteration, norm);
            }

            let Some(jacobian) = Jacobian::new(robot, &joints, tool, &current, mask, parameters.jacobian_step)
            else {
                debug!("IK: Jacobian estimation failed at {}", format_joints(&joints));
                return IkResult::failed(IkFailure::JacobianFailure, None, iteration, norm);
            };

            let delta = match jacobian.damped_step(&error, parameters.damping) {
                Ok(delta) if joints_finite(&delta) => delta,
                Ok(delta) => {
                    debug!("IK: non-finite step {} at {}", format_joints(&delta), format_joints(&joints));
                    return IkResult::failed(IkFailure::Singular, Some(joints), iteration, norm);
                }
                Err(e) => {
                    debug!("IK: {} at {}", e, format_joints(&joints));
                    return IkResult::failed(IkFailure::Singular, Some(joints), iteration, norm);
                }
            };

            let stepped: Joints = std::array::from_fn(|i| {
                joints[i] + delta[i].clamp(-parameters.max_step, parameters.max_step)
            });
            joints = self.limits.clamp(&stepped);
        }

        let iterations = parameters.max_iterations;
        match robot.forward(&joints, tool) {
            Some(current) => {
                let final_error = error_norm(&pose_error(target, &current, mask));
                debug!(
                    "IK out of reach for {} after {} iterations, error {:.4}",
                    format_pose(target), iterations, final_error
                );
                IkResult::failed(IkFailure::OutOfReach, Some(joints), iterations, final_error)
            }
            None => IkResult::failed(IkFailure::FkFailure, Some(joints), iterations, last_error),
        }
    }

    /// Solve, and if the failure may depend on the seed, retry up to `attempts` more times
    /// from the seed perturbed by up to `spread` degrees per joint. Returns the first success,
    /// otherwise the attempt that came closest to the target. Only the sign-free magnitude of
    /// `spread` is used; a zero or non-finite spread disables the retries.
    pub fn solve_with_retries<R: Rng + ?Sized>(
        &self,
        target: &CartesianPose,
        seed: &Joints,
        tool: &ToolOffset,
        mask: IkAxisMask,
        attempts: usize,
        spread: f64,
        rng: &mut R,
    ) -> IkResult {
        let mut best = self.solve(target, seed, tool, mask);
        let spread = spread.abs();
        if !(spread.is_finite() && spread > 0.0) {
            return best;
        }
        for attempt in 0..attempts {
            match best.failure {
                Some(failure) if failure.is_retryable() => {}
                _ => break,
            }
            let perturbed: Joints = std::array::from_fn(|i| seed[i] + rng.gen_range(-spread..=spread));
            let perturbed = self.limits.clamp(&perturbed);
            let result = self.solve(target, &perturbed, tool, mask);
            debug!(
                "IK retry {} from {}: {:?}, error {:.4}",
                attempt + 1, format_joints(&perturbed), result.failure, result.final_error
            );
            if result.success || (result.joint_angles.is_some() && result.final_error < best.final_error) {
                best = result;
            }
        }
        best
    }
}
