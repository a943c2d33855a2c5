//! Supports reading the solver and planner configuration from a YAML file

use std::path::Path;
use std::sync::Arc;
use serde::Deserialize;

use crate::axis_mask::{IkAxisMask, PoseAxis};
use crate::cartesian::{Cartesian, PlannerParameters};
use crate::config_error::ConfigError;
use crate::constraints::JointLimits;
use crate::ik_solver::{IkSolver, SolverParameters};
use crate::kinematic_traits::{ForwardKinematics, ToolOffset};

#[derive(Deserialize)]
struct LimitsSection {
    min: Vec<f64>,
    max: Vec<f64>,
}

fn default_axes() -> Vec<PoseAxis> {
    vec![PoseAxis::X, PoseAxis::Y, PoseAxis::Z, PoseAxis::Rx, PoseAxis::Ry, PoseAxis::Rz]
}

#[derive(Deserialize)]
struct Root {
    #[serde(default)]
    joint_limits: Option<LimitsSection>,
    #[serde(default)]
    solver: SolverParameters,
    #[serde(default)]
    planner: PlannerParameters,
    #[serde(default)]
    tool: ToolOffset,
    #[serde(default = "default_axes")]
    axis_mask: Vec<PoseAxis>,
}

/// Everything the host configures about the kinematic core. Sections that are missing in
/// the file take their defaults: PAROL6 limits, default solver and planner tuning, no tool,
/// all axes enabled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KinematicsConfig {
    pub limits: JointLimits,
    pub solver: SolverParameters,
    pub planner: PlannerParameters,
    pub tool: ToolOffset,
    pub axis_mask: IkAxisMask,
}

impl KinematicsConfig {
    /// Read the configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// joint_limits:
    ///   min: [-123.05, -145.01, 107.87, -105.47, -90.0, 0.0]
    ///   max: [123.05, -3.38, 287.87, 105.47, 90.0, 360.0]
    /// solver:
    ///   max_iterations: 30
    ///   tolerance: 1.0
    ///   damping: 0.1
    /// planner:
    ///   sample_rate_hz: 100.0
    /// tool: { z: 45.0 }
    /// axis_mask: [x, y, z, rz]
    /// ```
    /// Every section and every field inside a section is optional.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let root: Root = serde_saphyr::from_str(contents)
            .map_err(|e| ConfigError::Parse(format!("{}", e)))?;

        let limits = match root.joint_limits {
            Some(section) => JointLimits::new(
                vec_to_six(section.min, "joint_limits.min")?,
                vec_to_six(section.max, "joint_limits.max")?,
            ),
            None => JointLimits::default(),
        };

        let config = KinematicsConfig {
            limits,
            solver: root.solver,
            planner: root.planner,
            tool: root.tool,
            axis_mask: IkAxisMask::from_axes(&root.axis_mask),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for i in 0..6 {
            let (min, max) = (self.limits.min[i], self.limits.max[i]);
            if !min.is_finite() || !max.is_finite() {
                return Err(ConfigError::InvalidValue(format!(
                    "limits of joint {} must be finite (got {} .. {})", i + 1, min, max
                )));
            }
            if min > max {
                return Err(ConfigError::InvalidValue(format!(
                    "lower limit of joint {} is above the upper one ({} > {})", i + 1, min, max
                )));
            }
        }

        let solver = &self.solver;
        if solver.max_iterations < 1 {
            return Err(ConfigError::InvalidValue("solver.max_iterations must be at least 1".into()));
        }
        for (name, value) in [
            ("solver.tolerance", solver.tolerance),
            ("solver.jacobian_step", solver.jacobian_step),
            ("solver.max_step", solver.max_step),
            ("planner.sample_rate_hz", self.planner.sample_rate_hz),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be finite and positive (got {})", name, value
                )));
            }
        }
        for (name, value) in [
            ("solver.damping", solver.damping),
            ("planner.limit_warning_margin", self.planner.limit_warning_margin),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be finite and not negative (got {})", name, value
                )));
            }
        }

        let tool = self.tool.to_array();
        if tool.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidValue(format!("tool offset must be finite (got {:?})", tool)));
        }
        if self.axis_mask.is_empty() {
            return Err(ConfigError::InvalidValue("axis_mask must enable at least one axis".into()));
        }
        Ok(())
    }

    /// Solver for the given forward kinematics with the configured limits and tuning.
    pub fn solver(&self, robot: Arc<dyn ForwardKinematics>) -> IkSolver {
        IkSolver::with_parameters(robot, self.limits.clone(), self.solver.clone())
    }

    pub fn planner(&self, robot: Arc<dyn ForwardKinematics>) -> Cartesian {
        Cartesian::with_parameters(self.solver(robot), self.planner.clone())
    }
}

fn vec_to_six(values: Vec<f64>, field: &str) -> Result<[f64; 6], ConfigError> {
    <[f64; 6]>::try_from(values.as_slice()).map_err(|_| ConfigError::InvalidLength {
        field: field.to_string(),
        expected: 6,
        found: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = KinematicsConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, KinematicsConfig::default());
        assert_eq!(config.limits, JointLimits::parol6());
        assert_eq!(config.axis_mask, IkAxisMask::ALL);
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
joint_limits:
  min: [-90.0, -90.0, -90.0, -90.0, -90.0, -90.0]
  max: [90.0, 90.0, 90.0, 90.0, 90.0, 90.0]
solver:
  max_iterations: 50
  damping: 0.05
planner:
  sample_rate_hz: 50.0
tool: { z: 45.0, rz: 90.0 }
axis_mask: [x, y, z, rz]
"#;
        let config = KinematicsConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.limits, JointLimits::symmetric(90.0));
        assert_eq!(config.solver.max_iterations, 50);
        assert_eq!(config.solver.damping, 0.05);
        assert_eq!(config.solver.tolerance, 1.0);
        assert_eq!(config.planner.sample_rate_hz, 50.0);
        assert_eq!(config.planner.limit_warning_margin, 5.0);
        assert_eq!(config.tool, ToolOffset::new(0.0, 0.0, 45.0, 0.0, 0.0, 90.0));
        assert_eq!(config.axis_mask, IkAxisMask::POSITION | IkAxisMask::RZ);
    }

    #[test]
    fn test_wrong_limit_count() {
        let yaml = "joint_limits:\n  min: [0.0, 0.0, 0.0, 0.0, 0.0]\n  max: [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]\n";
        match KinematicsConfig::from_yaml_str(yaml) {
            Err(ConfigError::InvalidLength { field, expected: 6, found: 5 }) =>
                assert_eq!(field, "joint_limits.min"),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_inverted_limits() {
        let yaml = "joint_limits:\n  min: [0.0, 0.0, 10.0, 0.0, 0.0, 0.0]\n  max: [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]\n";
        assert!(matches!(KinematicsConfig::from_yaml_str(yaml), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_invalid_numbers() {
        for yaml in [
            "solver: { max_iterations: 0 }",
            "solver: { tolerance: -1.0 }",
            "solver: { damping: -0.1 }",
            "planner: { sample_rate_hz: 0.0 }",
            "axis_mask: []",
        ] {
            assert!(
                matches!(KinematicsConfig::from_yaml_str(yaml), Err(ConfigError::InvalidValue(_))),
                "accepted {}", yaml
            );
        }
    }

    #[test]
    fn test_unknown_axis_is_parse_error() {
        assert!(matches!(
            KinematicsConfig::from_yaml_str("axis_mask: [x, w]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = KinematicsConfig::from_yaml_file("/nonexistent/kinematics.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
