//! Core value types and the forward kinematics capability the solver depends on.

use serde::{Deserialize, Serialize};

/// Six joint angles in degrees, base joint first.
pub type Joints = [f64; 6];

/// Index of the first rotational component in the 6 component pose arrays.
pub const FIRST_ROTATION: usize = 3;

/// Pose of the tool center point in the robot convention (Z up).
/// Position is in millimeters, orientation is intrinsic Euler angles in degrees.
///
/// The scene convention (Y up) uses [`crate::coordinates::ScenePose`] instead, so the
/// two conventions cannot be mixed without passing through the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartesianPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

/// Per axis linear offsets attached to a keyframe, replayed over loop iterations.
pub type PoseDelta = CartesianPose;

impl CartesianPose {
    pub const fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        CartesianPose { x, y, z, rx, ry, rz }
    }

    /// Components in the order x, y, z, rx, ry, rz
    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }

    pub fn from_array(c: [f64; 6]) -> Self {
        CartesianPose::new(c[0], c[1], c[2], c[3], c[4], c[5])
    }

    /// False if any component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }

    /// Component-wise linear interpolation. Orientation is interpolated as plain numbers,
    /// not along the rotation group.
    pub fn lerp(&self, other: &CartesianPose, t: f64) -> CartesianPose {
        let a = self.to_array();
        let b = other.to_array();
        CartesianPose::from_array(std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t))
    }

    /// This pose shifted by `delta` taken `times` times.
    pub fn shifted(&self, delta: &PoseDelta, times: f64) -> CartesianPose {
        let a = self.to_array();
        let d = delta.to_array();
        CartesianPose::from_array(std::array::from_fn(|i| a[i] + d[i] * times))
    }
}

/// Offset of the tool center point from the flange of the last link, in the robot convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOffset {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub rx: f64,
    #[serde(default)]
    pub ry: f64,
    #[serde(default)]
    pub rz: f64,
}

impl ToolOffset {
    /// Bare flange, no tool mounted.
    pub const NONE: ToolOffset = ToolOffset { x: 0.0, y: 0.0, z: 0.0, rx: 0.0, ry: 0.0, rz: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        ToolOffset { x, y, z, rx, ry, rz }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }
}

/// Forward kinematics supplied by the host. The host owns the kinematic chain; the solver
/// only queries it.
///
/// Implementations must be deterministic and leave any internal state consistent before
/// returning. `None` means the pose could not be evaluated (for instance, the robot
/// description is not loaded yet) and is never retried by the caller.
pub trait ForwardKinematics: Send + Sync {
    /// Pose of the tool center point for the given joints, in the robot convention.
    fn forward(&self, joints: &Joints, tool: &ToolOffset) -> Option<CartesianPose>;

    /// False while the kinematic model is not available.
    fn model_loaded(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints_and_middle() {
        let a = CartesianPose::new(0.0, 10.0, -4.0, 0.0, 90.0, -180.0);
        let b = CartesianPose::new(8.0, 20.0, 4.0, 10.0, 0.0, 180.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), CartesianPose::new(4.0, 15.0, 0.0, 5.0, 45.0, 0.0));
    }

    #[test]
    fn test_is_finite() {
        let pose = CartesianPose::new(1.0, -2.0, 3.0, 180.0, -90.0, 0.0);
        assert!(pose.is_finite());
        assert!(!CartesianPose { ry: f64::NAN, ..pose }.is_finite());
        assert!(!CartesianPose { x: f64::NEG_INFINITY, ..pose }.is_finite());
    }

    #[test]
    fn test_shifted() {
        let base = CartesianPose::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let delta = PoseDelta::new(0.5, 0.0, -1.0, 0.25, 0.0, 2.0);
        assert_eq!(base.shifted(&delta, 2.0), CartesianPose::new(2.0, 2.0, 1.0, 4.5, 5.0, 10.0));
    }
}
