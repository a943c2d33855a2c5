//! Cartesian segment planning

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::axis_mask::IkAxisMask;
use crate::ik_solver::IkSolver;
use crate::kinematic_traits::{CartesianPose, Joints, ToolOffset};
use crate::trajectory_cache::{compute_dependency_hash, CachedTrajectory, SegmentKey, TrajectoryCache};
use crate::utils::{format_joints, format_pose, joints_finite};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerParameters {
    /// Samples per second of motion
    pub sample_rate_hz: f64,

    /// Joints closer than this to a limit (degrees) are reported in the log
    pub limit_warning_margin: f64,
}

impl Default for PlannerParameters {
    fn default() -> Self {
        PlannerParameters {
            sample_rate_hz: 100.0,
            limit_warning_margin: 5.0,
        }
    }
}

/// One time sample of a planned trajectory. When `valid` is false, IK did not converge for
/// `pose` and `joint_angles` repeats the previous sample's solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub pose: CartesianPose,
    pub joint_angles: Joints,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    pub waypoints: Vec<Waypoint>,
    /// Parallel to `waypoints`
    pub validity: Vec<bool>,
}

impl Trajectory {
    pub fn from_waypoints(waypoints: Vec<Waypoint>) -> Self {
        let validity = waypoints.iter().map(|w| w.valid).collect();
        Trajectory { waypoints, validity }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.validity.iter().filter(|v| **v).count()
    }

    pub fn first_invalid(&self) -> Option<usize> {
        self.validity.iter().position(|v| !*v)
    }

    pub fn is_fully_valid(&self) -> bool {
        self.validity.iter().all(|v| *v)
    }
}

/// Everything that determines the planned trajectory of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRequest {
    pub start: CartesianPose,
    pub end: CartesianPose,
    pub start_seed: Joints,
    /// Seconds
    pub duration: f64,
    pub tool: ToolOffset,
    pub mask: IkAxisMask,
}

impl SegmentRequest {
    pub fn dependency_hash(&self) -> String {
        compute_dependency_hash(&self.tool, self.mask, &self.start, &self.end, self.duration)
    }
}

/// Plans straight Cartesian segments: the pose is interpolated linearly at a fixed rate and
/// IK is solved for every sample, each seeded with the solution of the previous one.
#[derive(Clone)]
pub struct Cartesian {
    pub solver: IkSolver,
    pub parameters: PlannerParameters,
}

impl Cartesian {
    pub fn new(solver: IkSolver) -> Self {
        Cartesian { solver, parameters: PlannerParameters::default() }
    }

    pub fn with_parameters(solver: IkSolver, parameters: PlannerParameters) -> Self {
        Cartesian { solver, parameters }
    }

    /// Number of intervals the segment is split into, at least 1.
    pub fn sample_count(&self, duration: f64) -> usize {
        let n = (duration * self.parameters.sample_rate_hz).ceil();
        if n.is_finite() && n >= 1.0 { n as usize } else { 1 }
    }

    /// Plan the segment from `start` to `end`. The result always has `n + 1` waypoints; a
    /// sample where IK fails is kept, marked invalid, with the previous joints carried over.
    pub fn plan(
        &self,
        start: &CartesianPose,
        end: &CartesianPose,
        start_seed: &Joints,
        duration: f64,
        tool: &ToolOffset,
        mask: IkAxisMask,
    ) -> Trajectory {
        let n = self.sample_count(duration);
        debug!(
            "Planning {} samples from {} to {}",
            n + 1, format_pose(start), format_pose(end)
        );

        let mut waypoints = Vec::with_capacity(n + 1);
        let mut previous = self.start_joints(start_seed);
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let pose = start.lerp(end, t);
            let result = self.solver.solve(&pose, &previous, tool, mask);
            let waypoint = match (result.success, result.joint_angles) {
                (true, Some(joints)) => Waypoint { pose, joint_angles: joints, valid: true },
                _ => {
                    warn!(
                        "Sample {} of {} unreachable ({:?}, error {:.3}): {}",
                        i, n, result.failure, result.final_error, format_pose(&pose)
                    );
                    Waypoint { pose, joint_angles: previous, valid: false }
                }
            };
            previous = waypoint.joint_angles;
            waypoints.push(waypoint);
        }

        let trajectory = Trajectory::from_waypoints(waypoints);
        self.warn_near_limits(&trajectory);
        debug!("Planned {} of {} samples", trajectory.valid_count(), trajectory.len());
        trajectory
    }

    pub fn plan_request(&self, request: &SegmentRequest) -> Trajectory {
        self.plan(
            &request.start,
            &request.end,
            &request.start_seed,
            request.duration,
            &request.tool,
            request.mask,
        )
    }

    /// Returns the cached trajectory for `key` if it was planned from the same inputs,
    /// otherwise plans it and stores it under `key`.
    pub fn plan_cached<'c>(
        &self,
        cache: &'c mut TrajectoryCache,
        key: &SegmentKey,
        request: &SegmentRequest,
    ) -> &'c CachedTrajectory {
        cache.get_or_plan(key.clone(), request.dependency_hash(), || self.plan_request(request))
    }

    /// The seed clamped into the limits. Components that are NaN or infinite are replaced
    /// by the middle of their range, as failing samples carry these joints forward.
    fn start_joints(&self, start_seed: &Joints) -> Joints {
        let limits = &self.solver.limits;
        if joints_finite(start_seed) {
            return limits.clamp(start_seed);
        }
        let centers = limits.centers();
        let seed: Joints = std::array::from_fn(|i| {
            if start_seed[i].is_finite() { start_seed[i] } else { centers[i] }
        });
        warn!("Non-finite start seed {}, planning from {}", format_joints(start_seed), format_joints(&seed));
        limits.clamp(&seed)
    }

    fn warn_near_limits(&self, trajectory: &Trajectory) {
        let margin = self.parameters.limit_warning_margin;
        if margin <= 0.0 {
            return;
        }
        for (i, waypoint) in trajectory.waypoints.iter().enumerate() {
            let near = self.solver.limits.near_limits(&waypoint.joint_angles, margin);
            if !near.is_empty() {
                warn!(
                    "Sample {}: joints {:?} within {} degrees of their limits {}",
                    i, near, margin, format_joints(&waypoint.joint_angles)
                );
            }
        }
    }
}
