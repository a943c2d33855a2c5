use serde::{Deserialize, Serialize};
use crate::kinematic_traits::Joints;

/// Static joint limits in degrees. Unlike angle ranges on a circle, the limits here are
/// hard stops of the hardware, so the range never wraps around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower limit for each joint
    pub min: [f64; 6],

    /// Upper limit for each joint
    pub max: [f64; 6],
}

impl JointLimits {
    pub fn new(min: [f64; 6], max: [f64; 6]) -> Self {
        JointLimits { min, max }
    }

    /// Same symmetric range for every joint.
    pub fn symmetric(range: f64) -> Self {
        JointLimits::new([-range; 6], [range; 6])
    }

    /// Limits of the PAROL6 desktop arm
    pub fn parol6() -> Self {
        JointLimits::new(
            [-123.05, -145.01, 107.87, -105.47, -90.0, 0.0],
            [123.05, -3.38, 287.87, 105.47, 90.0, 360.0],
        )
    }

    pub fn compliant(&self, joints: &Joints) -> bool {
        (0..6).all(|i| joints[i] >= self.min[i] && joints[i] <= self.max[i])
    }

    /// Hard clamp of every joint into its range.
    pub fn clamp(&self, joints: &Joints) -> Joints {
        std::array::from_fn(|i| joints[i].clamp(self.min[i], self.max[i]))
    }

    /// Indices of the joints closer than `margin` degrees to either of their limits.
    pub fn near_limits(&self, joints: &Joints, margin: f64) -> Vec<usize> {
        (0..6)
            .filter(|&i| joints[i] - self.min[i] < margin || self.max[i] - joints[i] < margin)
            .collect()
    }

    /// Middle of each range.
    pub fn centers(&self) -> Joints {
        std::array::from_fn(|i| (self.min[i] + self.max[i]) / 2.0)
    }
}

impl Default for JointLimits {
    fn default() -> Self {
        JointLimits::parol6()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliant() {
        let limits = JointLimits::parol6();
        assert!(limits.compliant(&[0.0, -90.0, 180.0, 0.0, 0.0, 180.0]));
        assert!(limits.compliant(&limits.min));
        assert!(limits.compliant(&limits.max));
        assert!(!limits.compliant(&[0.0, 0.0, 180.0, 0.0, 0.0, 180.0]));
    }

    #[test]
    fn test_clamp() {
        let limits = JointLimits::symmetric(90.0);
        let clamped = limits.clamp(&[100.0, -100.0, 45.0, 90.0, -90.0, f64::MAX]);
        assert_eq!(clamped, [90.0, -90.0, 45.0, 90.0, -90.0, 90.0]);
        assert!(limits.compliant(&clamped));
    }

    #[test]
    fn test_near_limits() {
        let limits = JointLimits::symmetric(90.0);
        let near = limits.near_limits(&[88.0, 0.0, -80.0, -89.5, 10.0, 84.0], 5.0);
        assert_eq!(near, vec![0, 3]);
    }

    #[test]
    fn test_centers() {
        let limits = JointLimits::parol6();
        let centers = limits.centers();
        assert!(limits.compliant(&centers));
        assert_eq!(centers[5], 180.0);
    }
}
