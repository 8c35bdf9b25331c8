//! Spherical-harmonic HRTF codec
//!
//! Encodes binaural transfer functions measured on a dense grid into
//! order-limited SH coefficients and evaluates them at arbitrary directions.
//!
//! ## Strategies
//! - **Truncated**: least-squares fit of the complex spectra
//! - **TimeAligned**: ear-aligned spectra, then Truncated
//! - **MagLs**: Truncated below the cutoff, magnitude-only fit above it
//! - **BiMagLs**: ear alignment followed by MagLS
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_hrtf_sh::{DirectionGrid, EncoderConfig, EncodingStrategy, ShEncoder, ShOrder};
//!
//! let encoder = ShEncoder::new(&grid, ShOrder::new(3)?, EncoderConfig::default())?;
//! let coeffs = encoder.encode(&tf, EncodingStrategy::BiMagLs)?;
//! let interpolated = coeffs.interpolate(&target_grid)?;
//! ```

mod decoder;
mod encoder;
mod magls;

pub use decoder::{decode, ShDecoder};
pub use encoder::{encode, ShEncoder};

use std::f64::consts::PI;

use ndarray::{Array3, ArrayView2, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::binaural::{Ear, HeadGeometry};
use crate::data::TransferFunctionSet;
use crate::error::{ShError, ShResult};
use crate::grid::DirectionGrid;
use crate::sh::ShOrder;

/// SH encoding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingStrategy {
    /// Plain least-squares fit of the complex spectra
    Truncated,
    /// Ear alignment before the fit
    TimeAligned,
    /// Magnitude least squares above the cutoff frequency
    MagLs,
    /// Ear alignment plus magnitude least squares
    BiMagLs,
}

impl EncodingStrategy {
    /// All strategies
    pub const ALL: [EncodingStrategy; 4] = [
        EncodingStrategy::Truncated,
        EncodingStrategy::TimeAligned,
        EncodingStrategy::MagLs,
        EncodingStrategy::BiMagLs,
    ];

    /// Spectra are ear-aligned before fitting and must be restored after decoding
    pub fn is_phase_aligned(&self) -> bool {
        matches!(self, EncodingStrategy::TimeAligned | EncodingStrategy::BiMagLs)
    }

    /// Bins above the cutoff use the magnitude fit
    pub fn uses_magls(&self) -> bool {
        matches!(self, EncodingStrategy::MagLs | EncodingStrategy::BiMagLs)
    }

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            EncodingStrategy::Truncated => "Truncated",
            EncodingStrategy::TimeAligned => "TA",
            EncodingStrategy::MagLs => "MagLS",
            EncodingStrategy::BiMagLs => "BiMagLS",
        }
    }
}

impl std::fmt::Display for EncodingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Frequency above which an order-N representation of a head of radius r breaks down
///
/// `max(N · c / (2π r), min_cutoff_hz)`
pub fn cutoff_frequency(order: ShOrder, geometry: &HeadGeometry, min_cutoff_hz: f64) -> f64 {
    let aliasing = order.as_usize() as f64 * geometry.speed_of_sound / (2.0 * PI * geometry.radius);
    aliasing.max(min_cutoff_hz)
}

/// SH coefficients of a binaural HRTF set, indexed by (coefficient, bin, ear)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShCoefficientSet {
    coefficients: Array3<Complex64>,
    order: ShOrder,
    strategy: EncodingStrategy,
    /// Frequency the magnitude fit started from, if any bin used it
    cutoff_hz: Option<f64>,
    sample_rate: u32,
    fft_len: usize,
    /// Head model used for ear alignment
    geometry: HeadGeometry,
}

impl ShCoefficientSet {
    pub(crate) fn new(
        coefficients: Array3<Complex64>,
        order: ShOrder,
        strategy: EncodingStrategy,
        cutoff_hz: Option<f64>,
        tf: &TransferFunctionSet,
        geometry: HeadGeometry,
    ) -> ShResult<Self> {
        let set = Self {
            coefficients,
            order,
            strategy,
            cutoff_hz,
            sample_rate: tf.sample_rate(),
            fft_len: tf.fft_len(),
            geometry,
        };
        set.validate()?;
        Ok(set)
    }

    /// Check array shape against the metadata
    pub fn validate(&self) -> ShResult<()> {
        let (coeffs, bins, ears) = self.coefficients.dim();
        if coeffs != self.order.num_coefficients() {
            return Err(ShError::mismatch("SH coefficients", self.order.num_coefficients(), coeffs));
        }
        if ears != Ear::ALL.len() {
            return Err(ShError::mismatch("ear channels", Ear::ALL.len(), ears));
        }
        if self.fft_len == 0 || bins != self.fft_len / 2 + 1 {
            return Err(ShError::mismatch("frequency bins", self.fft_len / 2 + 1, bins));
        }
        if self.sample_rate == 0 {
            return Err(ShError::InvalidParameter("sample rate must be non-zero".into()));
        }
        self.geometry.validate()
    }

    /// Raw coefficients
    pub fn coefficients(&self) -> &Array3<Complex64> {
        &self.coefficients
    }

    /// (coefficient, bin) view for one ear
    pub fn ear(&self, ear: Ear) -> ArrayView2<'_, Complex64> {
        self.coefficients.index_axis(Axis(2), ear.index())
    }

    /// Encoding order
    pub fn order(&self) -> ShOrder {
        self.order
    }

    /// Strategy used to encode
    pub fn strategy(&self) -> EncodingStrategy {
        self.strategy
    }

    /// MagLS cutoff in Hz, `None` when no bin used the magnitude fit
    pub fn cutoff_hz(&self) -> Option<f64> {
        self.cutoff_hz
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the time-domain transform
    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Number of frequency bins
    pub fn num_bins(&self) -> usize {
        self.coefficients.len_of(Axis(1))
    }

    /// Head geometry used at encode time
    pub fn geometry(&self) -> &HeadGeometry {
        &self.geometry
    }

    /// Bin frequencies in Hz
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.num_bins())
            .map(|k| k as f64 * self.sample_rate as f64 / self.fft_len as f64)
            .collect()
    }

    /// Decode at `target_grid` with the full stored order
    pub fn interpolate(&self, target_grid: &DirectionGrid) -> ShResult<TransferFunctionSet> {
        ShDecoder::new(target_grid, self.order)?.decode_set(self)
    }

    /// Parse and validate from JSON
    pub fn from_json(json: &str) -> ShResult<Self> {
        let set: Self = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> ShResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
