//! Selection of the pose components that take part in an IK solve.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// One flag per pose component. Components that are not set contribute nothing to the
    /// error, to the step, or to the convergence test.
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IkAxisMask: u8 {
        const X = 0b00000001;
        const Y = 0b00000010;
        const Z = 0b00000100;
        const RX = 0b00001000;
        const RY = 0b00010000;
        const RZ = 0b00100000;

        const POSITION = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
        const ORIENTATION = Self::RX.bits() | Self::RY.bits() | Self::RZ.bits();
        const ALL = Self::POSITION.bits() | Self::ORIENTATION.bits();
    }
}

/// Name of a single pose component, as used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseAxis {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

const AXES: [(IkAxisMask, &str); 6] = [
    (IkAxisMask::X, "x"),
    (IkAxisMask::Y, "y"),
    (IkAxisMask::Z, "z"),
    (IkAxisMask::RX, "rx"),
    (IkAxisMask::RY, "ry"),
    (IkAxisMask::RZ, "rz"),
];

impl IkAxisMask {
    /// Enabled state of every component, in pose component order.
    pub fn enabled(&self) -> [bool; 6] {
        std::array::from_fn(|i| self.contains(AXES[i].0))
    }

    pub fn from_axes(axes: &[PoseAxis]) -> IkAxisMask {
        axes.iter().fold(IkAxisMask::empty(), |mask, axis| mask | IkAxisMask::from(*axis))
    }
}

impl From<PoseAxis> for IkAxisMask {
    fn from(axis: PoseAxis) -> Self {
        match axis {
            PoseAxis::X => IkAxisMask::X,
            PoseAxis::Y => IkAxisMask::Y,
            PoseAxis::Z => IkAxisMask::Z,
            PoseAxis::Rx => IkAxisMask::RX,
            PoseAxis::Ry => IkAxisMask::RY,
            PoseAxis::Rz => IkAxisMask::RZ,
        }
    }
}

impl Default for IkAxisMask {
    fn default() -> Self {
        IkAxisMask::ALL
    }
}

/// Serialized as the raw bits, the order of the flags is part of the format.
impl Serialize for IkAxisMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for IkAxisMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        IkAxisMask::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid axis mask bits {:#b}", bits)))
    }
}

impl fmt::Debug for IkAxisMask {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = AXES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        write!(formatter, "IkAxisMask({})", names.join(" | "))
    }
}
