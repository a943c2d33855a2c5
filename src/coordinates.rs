//! Conversion between the robot convention (Z up) and the scene convention (Y up, Z pointing
//! against the robot's Y). The mapping is a signed permutation of the six components, so
//! converting there and back restores the pose exactly.
//!
//! The host's scene graph evaluates forward kinematics in the scene convention while the
//! solver, planner and cache work in the robot convention. [`SceneOracle`] sits at that
//! boundary and converts every pose exactly once:
//! ```
//! use std::sync::Arc;
//! use teleop_kinematics::coordinates::{SceneKinematics, SceneOracle, ScenePose};
//! use teleop_kinematics::kinematic_traits::{ForwardKinematics, Joints, ToolOffset};
//!
//! struct Scene;
//! impl SceneKinematics for Scene {
//!     fn forward_scene(&self, joints: &Joints, _tool: &ToolOffset) -> Option<ScenePose> {
//!         // Flange 200 mm above the floor, joint 1 slides along the scene X axis
//!         Some(ScenePose::new(joints[0], 200.0, 0.0, 0.0, 0.0, 0.0))
//!     }
//! }
//!
//! let robot = SceneOracle::new(Arc::new(Scene));
//! let pose = robot.forward(&[15.0, 0.0, 0.0, 0.0, 0.0, 0.0], &ToolOffset::NONE).unwrap();
//! assert_eq!(pose.x, 15.0);
//! assert_eq!(pose.z, 200.0); // "up" is Z in the robot convention
//! ```

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::kinematic_traits::{CartesianPose, ForwardKinematics, Joints, ToolOffset};

/// Pose in the scene convention (Y up). Units are the same as for [`CartesianPose`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenePose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl ScenePose {
    pub const fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        ScenePose { x, y, z, rx, ry, rz }
    }
}

/// Robot convention to scene convention.
pub fn to_scene(pose: &CartesianPose) -> ScenePose {
    ScenePose {
        x: pose.x,
        y: pose.z,
        z: -pose.y,
        rx: pose.rx,
        ry: pose.rz,
        rz: -pose.ry,
    }
}

/// Scene convention to robot convention.
pub fn to_robot(pose: &ScenePose) -> CartesianPose {
    CartesianPose {
        x: pose.x,
        y: -pose.z,
        z: pose.y,
        rx: pose.rx,
        ry: -pose.rz,
        rz: pose.ry,
    }
}

impl From<CartesianPose> for ScenePose {
    fn from(pose: CartesianPose) -> Self {
        to_scene(&pose)
    }
}

impl From<ScenePose> for CartesianPose {
    fn from(pose: ScenePose) -> Self {
        to_robot(&pose)
    }
}

/// Forward kinematics as the host scene evaluates it, in the scene convention.
pub trait SceneKinematics: Send + Sync {
    fn forward_scene(&self, joints: &Joints, tool: &ToolOffset) -> Option<ScenePose>;

    fn model_loaded(&self) -> bool {
        true
    }
}

/// Presents a scene-convention oracle as robot-convention [`ForwardKinematics`].
#[derive(Clone)]
pub struct SceneOracle {
    pub scene: Arc<dyn SceneKinematics>,
}

impl SceneOracle {
    pub fn new(scene: Arc<dyn SceneKinematics>) -> Self {
        SceneOracle { scene }
    }
}

impl ForwardKinematics for SceneOracle {
    fn forward(&self, joints: &Joints, tool: &ToolOffset) -> Option<CartesianPose> {
        self.scene.forward_scene(joints, tool).map(|pose| to_robot(&pose))
    }

    fn model_loaded(&self) -> bool {
        self.scene.model_loaded()
    }
}
