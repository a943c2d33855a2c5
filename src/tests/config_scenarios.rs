use std::sync::Arc;
use crate::config::KinematicsConfig;
use crate::kinematic_traits::ForwardKinematics;
use crate::synthetic_arms::PlanarArm;
use crate::utils::assert_pose_eq;

const READ_ERROR: &str = "Failed to load configuration from file";

#[test]
fn test_planar_configuration_from_file() {
    let config = KinematicsConfig::from_yaml_file("src/tests/data/planar_teleop.yaml").expect(READ_ERROR);
    assert_eq!(config.solver.max_iterations, 40);
    assert_eq!(config.solver.damping, 0.1);
    assert_eq!(config.tool.x, 50.0);

    let robot = Arc::new(PlanarArm::new(200.0, 150.0));
    let planner = config.planner(robot.clone());
    let seed = [30.0, 40.0, 0.0, 0.0, 0.0, 0.0];
    let start = robot.forward(&seed, &config.tool).unwrap();
    let end = robot.forward(&[45.0, 60.0, 0.0, 0.0, 0.0, 0.0], &config.tool).unwrap();

    let trajectory = planner.plan(&start, &end, &seed, 0.1, &config.tool, config.axis_mask);
    assert_eq!(trajectory.len(), 11);
    assert!(trajectory.is_fully_valid());
    for waypoint in &trajectory.waypoints {
        let reached = robot.forward(&waypoint.joint_angles, &config.tool).unwrap();
        // Orientation is not part of the mask, only the position has to match
        assert_pose_eq(
            &waypoint.pose,
            &crate::kinematic_traits::CartesianPose { rz: waypoint.pose.rz, ..reached },
            config.solver.tolerance,
            0.0,
        );
        assert!(config.limits.compliant(&waypoint.joint_angles));
    }
}
