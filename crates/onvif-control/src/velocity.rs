use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MIN_VELOCITY: f32 = -1.0;
pub const MAX_VELOCITY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PtzAxis {
    Pan,
    Tilt,
    Zoom,
}

impl fmt::Display for PtzAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PtzAxis::Pan => write!(f, "pan"),
            PtzAxis::Tilt => write!(f, "tilt"),
            PtzAxis::Zoom => write!(f, "zoom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("velocity {value} is outside [-1.0, 1.0]")]
pub struct VelocityError {
    pub value: f32,
}

/// Normalised axis speed in `[-1.0, 1.0]`.
///
/// Out-of-range input is rejected, never clamped, so a bad request can't
/// reach the camera as a full-speed move.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Velocity(f32);

impl Velocity {
    pub const ZERO: Velocity = Velocity(0.0);

    pub fn new(value: f32) -> Result<Self, VelocityError> {
        // NaN fails both comparisons, so it is rejected here too
        if (MIN_VELOCITY..=MAX_VELOCITY).contains(&value) {
            Ok(Self(value))
        } else {
            Err(VelocityError { value })
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn negated(self) -> Self {
        Self(-self.0)
    }
}

impl TryFrom<f32> for Velocity {
    type Error = VelocityError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Velocity::new(value)
    }
}

impl From<Velocity> for f32 {
    fn from(v: Velocity) -> Self {
        v.0
    }
}

impl Default for Velocity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One velocity per axis, as sent in a continuous move.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PtzVector {
    pub pan: Velocity,
    pub tilt: Velocity,
    pub zoom: Velocity,
}

impl PtzVector {
    /// Motion on a single axis, the other two held at zero.
    pub fn single_axis(axis: PtzAxis, velocity: Velocity) -> Self {
        let mut vector = Self::default();
        match axis {
            PtzAxis::Pan => vector.pan = velocity,
            PtzAxis::Tilt => vector.tilt = velocity,
            PtzAxis::Zoom => vector.zoom = velocity,
        }
        vector
    }
}

/// Magnitudes used by the directional helpers when the caller gives none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultVelocities {
    pub pan: Velocity,
    pub tilt: Velocity,
    pub zoom: Velocity,
}

impl DefaultVelocities {
    pub fn for_axis(&self, axis: PtzAxis) -> Velocity {
        match axis {
            PtzAxis::Pan => self.pan,
            PtzAxis::Tilt => self.tilt,
            PtzAxis::Zoom => self.zoom,
        }
    }
}

impl Default for DefaultVelocities {
    fn default() -> Self {
        Self {
            pan: Velocity(0.5),
            tilt: Velocity(0.5),
            zoom: Velocity(0.5),
        }
    }
}

/// Named directions over the three axis primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    ZoomIn,
    ZoomOut,
}

impl Direction {
    pub fn axis(self) -> PtzAxis {
        match self {
            Direction::Left | Direction::Right => PtzAxis::Pan,
            Direction::Up | Direction::Down => PtzAxis::Tilt,
            Direction::ZoomIn | Direction::ZoomOut => PtzAxis::Zoom,
        }
    }

    /// Left, down and zoom-out run on the negative half of the axis.
    pub fn is_negative(self) -> bool {
        matches!(self, Direction::Left | Direction::Down | Direction::ZoomOut)
    }

    /// Signed velocity for this direction; only the magnitude of `speed` is used.
    pub fn apply(self, speed: Velocity) -> Velocity {
        let magnitude = speed.abs();
        if self.is_negative() {
            magnitude.negated()
        } else {
            magnitude
        }
    }
}
