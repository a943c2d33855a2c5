//! Error handling for the configuration loader

use std::io;

/// Failures while reading or validating a kinematics configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(String),
    InvalidLength { field: String, expected: usize, found: usize },
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ConfigError::Io(ref err) =>
                write!(f, "IO Error: {}", err),
            ConfigError::Parse(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            ConfigError::InvalidLength { ref field, expected, found } =>
                write!(f, "Invalid Length of {}: expected {}, found {}", field, expected, found),
            ConfigError::InvalidValue(ref msg) =>
                write!(f, "Invalid Value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}
