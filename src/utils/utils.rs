//! Helper functions

use crate::kinematic_traits::{CartesianPose, Joints};

/// False if any joint is NaN or infinite. Clamping cannot repair such a value, as
/// `f64::clamp` passes NaN through.
pub fn joints_finite(joints: &Joints) -> bool {
    joints.iter().all(|q| q.is_finite())
}

/// Wraps the angle in degrees into [-180, 180].
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped < -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Joint values as a compact string, for log output.
pub fn format_joints(joints: &Joints) -> String {
    let values: Vec<String> = joints.iter().map(|q| format!("{:7.2}", q)).collect();
    format!("[{}]", values.join(" "))
}

/// Pose as a compact string, for log output.
pub fn format_pose(pose: &CartesianPose) -> String {
    format!(
        "x: {:.3}, y: {:.3}, z: {:.3}, rx: {:.3}, ry: {:.3}, rz: {:.3}",
        pose.x, pose.y, pose.z, pose.rx, pose.ry, pose.rz
    )
}

/// Panics if the two poses differ by more than the given tolerances. Rotations are
/// compared after wrapping the difference.
pub fn assert_pose_eq(a: &CartesianPose, b: &CartesianPose, distance_tolerance: f64, angular_tolerance: f64) {
    let a = a.to_array();
    let b = b.to_array();
    for i in 0..3 {
        assert!(
            (a[i] - b[i]).abs() <= distance_tolerance,
            "Poses have too different translations: {:?} vs {:?}", a, b
        );
    }
    for i in 3..6 {
        assert!(
            wrap_degrees(a[i] - b[i]).abs() <= angular_tolerance,
            "Poses have too different angles: {:?} vs {:?}", a, b
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joints_finite() {
        assert!(joints_finite(&[-123.05, -3.38, 287.87, 0.0, 90.0, 360.0]));
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut joints = [0.0; 6];
            joints[4] = bad;
            assert!(!joints_finite(&joints), "{:?} accepted", joints);
        }
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), -180.0);
        assert_eq!(wrap_degrees(359.0), -1.0);
        assert_eq!(wrap_degrees(720.0 + 10.0), 10.0);
        // Across the discontinuity: 179 to -179 is a 2 degree turn
        assert_eq!(wrap_degrees(-179.0 - 179.0), 2.0);
    }
}
