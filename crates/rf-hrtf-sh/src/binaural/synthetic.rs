//! Synthetic rigid-sphere HRTFs
//!
//! Analytic stand-in for measured data: Woodworth inter-aural delay,
//! Brown-Duda one-pole/one-zero head shadow and a single elevation-dependent
//! pinna reflection on top of a fixed onset delay.

use std::f64::consts::{FRAC_PI_2, PI};

use ndarray::Array3;
use num_complex::Complex64;

use super::{path_length_difference, Ear, HeadGeometry};
use crate::data::{ImpulseResponseSet, TransferFunctionSet};
use crate::error::{ShError, ShResult};
use crate::grid::{unit_vector, DirectionGrid};
use crate::spectral::SpectralTransform;

/// Minimum shadow gain factor of the head-shadow filter
const SHADOW_ALPHA_MIN: f64 = 0.1;
/// Incidence angle of maximum shadow (150°)
const SHADOW_THETA_MIN: f64 = 5.0 * PI / 6.0;

/// Synthetic HRTF generator
#[derive(Debug, Clone)]
pub struct SyntheticHrtf {
    sample_rate: u32,
    length: usize,
    geometry: HeadGeometry,
    /// Direction-independent onset delay in seconds
    onset_delay: f64,
    /// Pinna reflection gain (negative = inverted)
    pinna_gain: f64,
}

impl SyntheticHrtf {
    /// Generator for `length`-sample responses
    pub fn new(sample_rate: u32, length: usize) -> ShResult<Self> {
        if sample_rate == 0 || length < 2 {
            return Err(ShError::InvalidParameter(format!(
                "synthetic HRTF needs a sample rate and at least 2 samples, got {} Hz / {}",
                sample_rate, length
            )));
        }
        Ok(Self {
            sample_rate,
            length,
            geometry: HeadGeometry::default(),
            onset_delay: 0.001,
            pinna_gain: -0.35,
        })
    }

    /// Use a specific head geometry
    pub fn with_geometry(mut self, geometry: HeadGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set pinna reflection gain
    pub fn with_pinna_gain(mut self, gain: f64) -> Self {
        self.pinna_gain = gain;
        self
    }

    /// Head geometry used for delays and shadowing
    pub fn geometry(&self) -> &HeadGeometry {
        &self.geometry
    }

    /// Analytic transfer function of one ear
    pub fn transfer_function(&self, frequency: f64, azimuth: f64, elevation: f64, ear: Ear) -> Complex64 {
        let omega = 2.0 * PI * frequency;
        let c = self.geometry.speed_of_sound;

        // Head shadow
        let u = unit_vector(azimuth, elevation);
        let axis = ear.axis();
        let incidence = (u[0] * axis[0] + u[1] * axis[1] + u[2] * axis[2])
            .clamp(-1.0, 1.0)
            .acos();
        let alpha = (1.0 + SHADOW_ALPHA_MIN / 2.0)
            + (1.0 - SHADOW_ALPHA_MIN / 2.0) * (incidence / SHADOW_THETA_MIN * PI).cos();
        let omega0 = c / self.geometry.radius;
        let shadow = Complex64::new(1.0, alpha * omega / (2.0 * omega0))
            / Complex64::new(1.0, omega / (2.0 * omega0));

        // Pinna reflection, longer from below
        let pinna_delay = 80e-6 + 120e-6 * (FRAC_PI_2 - elevation) / PI;
        let pinna = Complex64::new(1.0, 0.0) + Complex64::from_polar(self.pinna_gain, -omega * pinna_delay);

        // Propagation
        let delay = self.onset_delay + path_length_difference(azimuth, elevation, ear, self.geometry.radius) / c;
        let propagation = Complex64::from_polar(1.0, -omega * delay);

        shadow * pinna * propagation
    }

    /// Impulse responses for every direction of `grid`
    pub fn impulse_responses(&self, grid: &DirectionGrid) -> ShResult<ImpulseResponseSet> {
        let transform = SpectralTransform::new(self.length)?;
        let bins = transform.num_bins();
        let mut data = Array3::<f64>::zeros((self.length, grid.len(), Ear::ALL.len()));

        for (dir, (az, el)) in grid.iter().enumerate() {
            for ear in Ear::ALL {
                let spectrum: Vec<Complex64> = (0..bins)
                    .map(|k| {
                        let f = k as f64 * self.sample_rate as f64 / self.length as f64;
                        self.transfer_function(f, az, el, ear)
                    })
                    .collect();
                let response = transform.inverse(&spectrum)?;
                for (n, s) in response.into_iter().enumerate() {
                    data[[n, dir, ear.index()]] = s;
                }
            }
        }

        ImpulseResponseSet::new(data, self.sample_rate)
    }

    /// Transfer functions for every direction of `grid`, through the time domain
    pub fn transfer_functions(&self, grid: &DirectionGrid) -> ShResult<TransferFunctionSet> {
        self.impulse_responses(grid)?.to_transfer_functions(None)
    }
}
