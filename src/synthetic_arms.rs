//! Analytic forward kinematics of simple synthetic arms. They stand in for the host's
//! kinematic model in tests, documentation examples and the dry run planner.

use crate::kinematic_traits::{CartesianPose, ForwardKinematics, Joints, ToolOffset};
use crate::utils::wrap_degrees;

/// Two link arm moving in the XY plane. Joint 1 rotates the shoulder, joint 2 the elbow,
/// the other joints have no effect. The tool extends the second link by `tool.x` and lifts
/// the tip by `tool.z`.
#[derive(Debug, Clone)]
pub struct PlanarArm {
    /// Upper arm length, mm
    pub l1: f64,
    /// Forearm length, mm
    pub l2: f64,
}

impl PlanarArm {
    pub fn new(l1: f64, l2: f64) -> Self {
        PlanarArm { l1, l2 }
    }
}

impl ForwardKinematics for PlanarArm {
    fn forward(&self, joints: &Joints, tool: &ToolOffset) -> Option<CartesianPose> {
        let shoulder = joints[0].to_radians();
        let elbow = (joints[0] + joints[1]).to_radians();
        let forearm = self.l2 + tool.x;
        Some(CartesianPose::new(
            self.l1 * shoulder.cos() + forearm * elbow.cos(),
            self.l1 * shoulder.sin() + forearm * elbow.sin(),
            tool.z,
            0.0,
            0.0,
            wrap_degrees(joints[0] + joints[1] + tool.rz),
        ))
    }
}

/// Arm where every joint drives exactly one pose component: joints 1 to 3 translate along
/// x, y and z by `mm_per_degree`, joints 4 to 6 rotate about x, y and z one to one.
/// The tool offset adds to the matching components.
#[derive(Debug, Clone)]
pub struct GantryArm {
    pub mm_per_degree: f64,
}

impl GantryArm {
    pub fn new(mm_per_degree: f64) -> Self {
        GantryArm { mm_per_degree }
    }
}

impl ForwardKinematics for GantryArm {
    fn forward(&self, joints: &Joints, tool: &ToolOffset) -> Option<CartesianPose> {
        let s = self.mm_per_degree;
        Some(CartesianPose::new(
            s * joints[0] + tool.x,
            s * joints[1] + tool.y,
            s * joints[2] + tool.z,
            joints[3] + tool.rx,
            joints[4] + tool.ry,
            joints[5] + tool.rz,
        ))
    }
}

/// Arm with all joints locked: the pose never changes, so the Jacobian is zero.
#[derive(Debug, Clone, Default)]
pub struct FrozenArm;

impl ForwardKinematics for FrozenArm {
    fn forward(&self, _joints: &Joints, tool: &ToolOffset) -> Option<CartesianPose> {
        Some(CartesianPose::new(tool.x, tool.y, tool.z, tool.rx, tool.ry, tool.rz))
    }
}

/// Model that has not been loaded yet.
#[derive(Debug, Clone, Default)]
pub struct UnloadedArm;

impl ForwardKinematics for UnloadedArm {
    fn forward(&self, _joints: &Joints, _tool: &ToolOffset) -> Option<CartesianPose> {
        None
    }

    fn model_loaded(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_arm_straight() {
        let arm = PlanarArm::new(200.0, 150.0);
        let pose = arm.forward(&[0.0; 6], &ToolOffset::NONE).unwrap();
        assert_eq!(pose, CartesianPose::new(350.0, 0.0, 0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_planar_arm_folded_with_tool() {
        let arm = PlanarArm::new(200.0, 150.0);
        let tool = ToolOffset::new(50.0, 0.0, 20.0, 0.0, 0.0, 0.0);
        let pose = arm.forward(&[90.0, 90.0, 0.0, 0.0, 0.0, 0.0], &tool).unwrap();
        assert!((pose.x + 200.0).abs() < 1e-9);
        assert!((pose.y - 200.0).abs() < 1e-9);
        assert_eq!(pose.z, 20.0);
        assert_eq!(pose.rz, 180.0);
    }

    #[test]
    fn test_gantry_arm_tool() {
        let arm = GantryArm::new(2.0);
        let tool = ToolOffset::new(1.0, 0.0, -1.0, 0.0, 0.0, 90.0);
        let pose = arm.forward(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &tool).unwrap();
        assert_eq!(pose, CartesianPose::new(3.0, 4.0, 5.0, 4.0, 5.0, 96.0));
    }

    #[test]
    fn test_unloaded_arm() {
        assert!(!UnloadedArm.model_loaded());
        assert!(FrozenArm.model_loaded());
        assert!(UnloadedArm.forward(&[0.0; 6], &ToolOffset::NONE).is_none());
    }
}
