//! Spherical sampling grids
//!
//! Directions are (azimuth, elevation) in radians: azimuth 0 = front,
//! positive towards the left ear; elevation positive = up.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ShError, ShResult};

/// Ordered set of measurement directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionGrid {
    azimuths: Vec<f64>,
    elevations: Vec<f64>,
    /// Quadrature weights, only used when evaluating errors
    weights: Option<Vec<f64>>,
}

impl DirectionGrid {
    /// Grid from matching azimuth/elevation vectors (radians)
    pub fn new(azimuths: Vec<f64>, elevations: Vec<f64>) -> ShResult<Self> {
        if azimuths.len() != elevations.len() {
            return Err(ShError::mismatch("elevations", azimuths.len(), elevations.len()));
        }
        if azimuths.is_empty() {
            return Err(ShError::InvalidParameter("direction grid is empty".into()));
        }
        if azimuths.iter().chain(elevations.iter()).any(|a| !a.is_finite()) {
            return Err(ShError::InvalidParameter("direction angles must be finite".into()));
        }
        Ok(Self {
            azimuths,
            elevations,
            weights: None,
        })
    }

    /// Grid from degrees
    pub fn from_degrees(azimuths: &[f64], elevations: &[f64]) -> ShResult<Self> {
        Self::new(
            azimuths.iter().map(|a| a.to_radians()).collect(),
            elevations.iter().map(|e| e.to_radians()).collect(),
        )
    }

    /// Attach quadrature weights
    pub fn with_weights(mut self, weights: Vec<f64>) -> ShResult<Self> {
        if weights.len() != self.len() {
            return Err(ShError::mismatch("weights", self.len(), weights.len()));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ShError::InvalidParameter("weights must be finite and non-negative".into()));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    /// Near-uniform Fibonacci spiral of `n` points
    pub fn fibonacci(n: usize) -> ShResult<Self> {
        let golden_angle = PI * (3.0 - 5.0_f64.sqrt());
        let mut azimuths = Vec::with_capacity(n);
        let mut elevations = Vec::with_capacity(n);

        for i in 0..n {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            elevations.push(z.asin());
            azimuths.push(wrap_angle(golden_angle * i as f64));
        }

        let weights = vec![4.0 * PI / n as f64; n];
        Self::new(azimuths, elevations)?.with_weights(weights)
    }

    /// Regular azimuth/elevation grid excluding the poles, with sine-of-colatitude weights
    pub fn equiangular(num_azimuths: usize, num_elevations: usize) -> ShResult<Self> {
        if num_azimuths == 0 || num_elevations == 0 {
            return Err(ShError::InvalidParameter("equiangular grid needs points".into()));
        }

        let d_az = 2.0 * PI / num_azimuths as f64;
        let d_col = PI / num_elevations as f64;
        let mut azimuths = Vec::with_capacity(num_azimuths * num_elevations);
        let mut elevations = Vec::with_capacity(num_azimuths * num_elevations);
        let mut weights = Vec::with_capacity(num_azimuths * num_elevations);

        for e in 0..num_elevations {
            let colatitude = (e as f64 + 0.5) * d_col;
            let w = d_az * d_col * colatitude.sin();
            for a in 0..num_azimuths {
                azimuths.push(wrap_angle(a as f64 * d_az));
                elevations.push(FRAC_PI_2 - colatitude);
                weights.push(w);
            }
        }

        // Rescale so the weights integrate the unit sphere exactly
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w *= 4.0 * PI / total;
        }

        Self::new(azimuths, elevations)?.with_weights(weights)
    }

    /// Horizontal-plane ring of `n` equally spaced directions
    pub fn horizontal_ring(n: usize) -> ShResult<Self> {
        let azimuths = (0..n).map(|i| wrap_angle(2.0 * PI * i as f64 / n as f64)).collect();
        Self::new(azimuths, vec![0.0; n])
    }

    /// Grid restricted to `indices`
    pub fn subset(&self, indices: &[usize]) -> ShResult<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(ShError::InvalidParameter(format!(
                "direction index {} out of range for {} directions",
                bad,
                self.len()
            )));
        }
        let mut grid = Self::new(
            indices.iter().map(|&i| self.azimuths[i]).collect(),
            indices.iter().map(|&i| self.elevations[i]).collect(),
        )?;
        if let Some(w) = &self.weights {
            grid.weights = Some(indices.iter().map(|&i| w[i]).collect());
        }
        Ok(grid)
    }

    /// Number of directions
    pub fn len(&self) -> usize {
        self.azimuths.len()
    }

    /// Always false for a constructed grid
    pub fn is_empty(&self) -> bool {
        self.azimuths.is_empty()
    }

    /// Azimuths in radians
    pub fn azimuths(&self) -> &[f64] {
        &self.azimuths
    }

    /// Elevations in radians
    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    /// Quadrature weights, if any
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// (azimuth, elevation) of one direction
    pub fn direction(&self, index: usize) -> (f64, f64) {
        (self.azimuths[index], self.elevations[index])
    }

    /// Iterate (azimuth, elevation) pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.azimuths.iter().copied().zip(self.elevations.iter().copied())
    }

    /// Cartesian unit vector (x = front, y = left, z = up)
    pub fn unit_vector(&self, index: usize) -> [f64; 3] {
        let (az, el) = self.direction(index);
        unit_vector(az, el)
    }

    /// SHA-256 over the angle bit patterns
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.len() as u64).to_le_bytes());
        for (az, el) in self.iter() {
            hasher.update(az.to_bits().to_le_bytes());
            hasher.update(el.to_bits().to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Cartesian unit vector for (azimuth, elevation) in radians
pub fn unit_vector(azimuth: f64, elevation: f64) -> [f64; 3] {
    let cos_el = elevation.cos();
    [cos_el * azimuth.cos(), cos_el * azimuth.sin(), elevation.sin()]
}

/// Great-circle angle between two directions in radians
pub fn angular_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let u = unit_vector(a.0, a.1);
    let v = unit_vector(b.0, b.1);
    let dot = u[0] * v[0] + u[1] * v[1] + u[2] * v[2];
    dot.clamp(-1.0, 1.0).acos()
}

/// Wrap to (-π, π]
fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}
