//! Encoder configuration

use serde::{Deserialize, Serialize};

use crate::binaural::HeadGeometry;
use crate::error::{ShError, ShResult};

/// Lowest MagLS cutoff frequency in Hz
pub const DEFAULT_MIN_CUTOFF_HZ: f64 = 3000.0;

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Head model for ear alignment and the MagLS cutoff
    pub geometry: HeadGeometry,

    /// MagLS regularization towards the previous bin's coefficients
    /// 0.0 = plain magnitude fit, larger = smoother phase across frequency
    pub smoothing_k: f64,

    /// Floor for the MagLS cutoff frequency (Hz)
    pub min_cutoff_hz: f64,

    /// Phase re-linearisation passes per MagLS bin
    pub magls_iterations: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            geometry: HeadGeometry::default(),
            smoothing_k: 0.0,
            min_cutoff_hz: DEFAULT_MIN_CUTOFF_HZ,
            magls_iterations: 1,
        }
    }
}

impl EncoderConfig {
    /// Config for a specific head geometry
    pub fn with_geometry(geometry: HeadGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    /// Smoothed MagLS: trades magnitude accuracy near the cutoff for phase continuity
    pub fn smoothed(smoothing_k: f64) -> Self {
        Self {
            smoothing_k,
            ..Self::default()
        }
    }

    /// Refined MagLS: several phase linearisation passes per bin
    pub fn refined() -> Self {
        Self {
            magls_iterations: 4,
            ..Self::default()
        }
    }

    /// Check all parameters
    pub fn validate(&self) -> ShResult<()> {
        self.geometry.validate()?;
        if !(self.smoothing_k.is_finite() && self.smoothing_k >= 0.0) {
            return Err(ShError::InvalidParameter(format!(
                "smoothing k must be non-negative, got {}",
                self.smoothing_k
            )));
        }
        if !(self.min_cutoff_hz.is_finite() && self.min_cutoff_hz >= 0.0) {
            return Err(ShError::InvalidParameter(format!(
                "minimum cutoff must be non-negative, got {}",
                self.min_cutoff_hz
            )));
        }
        if self.magls_iterations == 0 {
            return Err(ShError::InvalidParameter(
                "MagLS needs at least one iteration".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate from JSON
    pub fn from_json(json: &str) -> ShResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> ShResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
