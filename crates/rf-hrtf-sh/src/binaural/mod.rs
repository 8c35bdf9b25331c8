//! Binaural geometry: ears, head model and ear-alignment phase
//!
//! - Rigid-sphere (Woodworth) path-length model per ear
//! - Ear-alignment phase used by the TA and BiMagLS strategies
//! - Synthetic rigid-sphere HRTFs for testing without measured data

mod phase;
mod synthetic;

pub use phase::{align, ear_alignment_phase, path_length_difference, restore};
pub use synthetic::SyntheticHrtf;

use serde::{Deserialize, Serialize};

use crate::error::{ShError, ShResult};

/// Ear channel of a binaural transfer function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ear {
    /// Left ear, on the +y axis (azimuth +90°)
    Left = 0,
    /// Right ear, on the -y axis (azimuth -90°)
    Right = 1,
}

impl Ear {
    /// Both ears in channel order
    pub const ALL: [Ear; 2] = [Ear::Left, Ear::Right];

    /// Channel index in ear-indexed arrays
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Unit vector of the ear axis (x = front, y = left, z = up)
    pub fn axis(&self) -> [f64; 3] {
        match self {
            Ear::Left => [0.0, 1.0, 0.0],
            Ear::Right => [0.0, -1.0, 0.0],
        }
    }
}

/// Rigid-sphere head geometry shared by encoder and decoder
///
/// TA and BiMagLS coefficient sets only decode correctly with the geometry
/// they were encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadGeometry {
    /// Head radius in meters
    pub radius: f64,
    /// Speed of sound in m/s
    pub speed_of_sound: f64,
}

impl Default for HeadGeometry {
    fn default() -> Self {
        Self {
            radius: 0.0875,
            speed_of_sound: 343.0,
        }
    }
}

impl HeadGeometry {
    /// Create geometry, rejecting non-positive values
    pub fn new(radius: f64, speed_of_sound: f64) -> ShResult<Self> {
        let geometry = Self {
            radius,
            speed_of_sound,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check radius and speed of sound
    pub fn validate(&self) -> ShResult<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ShError::InvalidParameter(format!(
                "head radius must be positive, got {}",
                self.radius
            )));
        }
        if !(self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0) {
            return Err(ShError::InvalidParameter(format!(
                "speed of sound must be positive, got {}",
                self.speed_of_sound
            )));
        }
        Ok(())
    }
}
