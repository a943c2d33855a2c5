use crate::axis_mask::IkAxisMask;
use crate::kinematic_traits::{CartesianPose, FIRST_ROTATION, ForwardKinematics, Joints, ToolOffset};
use crate::matrix::{Matrix, MatrixError};
use crate::utils::wrap_degrees;

/// Struct representing the Jacobian matrix, estimated numerically from the forward kinematics
pub struct Jacobian {
    /// A 6x6 matrix of partial derivatives. Each column corresponds to a joint, each row to
    /// a pose component (x, y, z in mm per degree, rx, ry, rz in degrees per degree).
    /// Rows of masked out pose components are zero.
    matrix: Matrix,

    /// The disturbance in degrees used for computing the Jacobian
    epsilon: f64,
}

impl Jacobian {
    /// Estimates the Jacobian at `joints` by forward differences, where `current` is the pose
    /// already computed for these joints.
    ///
    /// Returns None if any of the perturbed forward kinematics evaluations fails.
    pub fn new(
        robot: &dyn ForwardKinematics,
        joints: &Joints,
        tool: &ToolOffset,
        current: &CartesianPose,
        mask: IkAxisMask,
        epsilon: f64,
    ) -> Option<Self> {
        let matrix = compute_jacobian(robot, joints, tool, current, mask, epsilon)?;
        Some(Jacobian { matrix, epsilon })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Damped least squares step: the joint change that reduces `error` (a pose difference
    /// in the same units as the Jacobian rows).
    pub fn damped_step(&self, error: &[f64; 6], lambda: f64) -> Result<Joints, MatrixError> {
        let pseudo_inverse = self.matrix.damped_pseudo_inverse(lambda)?;
        let delta = pseudo_inverse.multiply(&Matrix::column(error))?;
        Ok(std::array::from_fn(|i| delta.get(i, 0)))
    }
}

/// Function to compute the Jacobian matrix for a given robot and joint configuration.
/// Rotation rows use the wrapped angle difference, so a pose crossing ±180 degrees during
/// the perturbation does not produce a spurious 360 degree jump.
pub fn compute_jacobian(
    robot: &dyn ForwardKinematics,
    joints: &Joints,
    tool: &ToolOffset,
    current: &CartesianPose,
    mask: IkAxisMask,
    epsilon: f64,
) -> Option<Matrix> {
    let mut jacobian = Matrix::zeros(6, 6);
    let current = current.to_array();
    let enabled = mask.enabled();

    for joint in 0..6 {
        let mut perturbed_joints = *joints;
        perturbed_joints[joint] += epsilon;
        let perturbed = robot.forward(&perturbed_joints, tool)?.to_array();

        for row in 0..6 {
            if !enabled[row] {
                continue;
            }
            let difference = if row < FIRST_ROTATION {
                perturbed[row] - current[row]
            } else {
                wrap_degrees(perturbed[row] - current[row])
            };
            jacobian.set(row, joint, difference / epsilon);
        }
    }

    Some(jacobian)
}
