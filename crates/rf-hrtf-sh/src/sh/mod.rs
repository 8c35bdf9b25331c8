//! Real spherical harmonics
//!
//! Orthonormal (N3D, unit energy over the sphere) real harmonics without the
//! Condon-Shortley phase, in ACN order: degree ascending, mode -n..=n.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_hrtf_sh::sh::{ShBasis, ShOrder};
//! use rf_hrtf_sh::DirectionGrid;
//!
//! let grid = DirectionGrid::fibonacci(400)?;
//! let basis = ShBasis::new(&grid, ShOrder::new(10)?)?;
//! assert_eq!(basis.num_coefficients(), 121);
//! ```

mod basis;

pub use basis::{pseudo_inverse, regularized_inverse, ShBasis};

use std::f64::consts::PI;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ShError, ShResult};
use crate::grid::DirectionGrid;

/// Highest supported spherical-harmonic order
pub const MAX_ORDER: usize = 64;

/// Spherical-harmonic truncation order N
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ShOrder(usize);

impl ShOrder {
    /// Create from order number
    pub fn new(order: usize) -> ShResult<Self> {
        if order > MAX_ORDER {
            return Err(ShError::InvalidOrder(format!(
                "{} (max supported: {})",
                order, MAX_ORDER
            )));
        }
        Ok(Self(order))
    }

    /// Get order number
    pub fn as_usize(&self) -> usize {
        self.0
    }

    /// Coefficient count (N + 1)²
    pub fn num_coefficients(&self) -> usize {
        num_coefficients(self.0)
    }
}

impl TryFrom<usize> for ShOrder {
    type Error = ShError;

    fn try_from(order: usize) -> ShResult<Self> {
        Self::new(order)
    }
}

impl From<ShOrder> for usize {
    fn from(order: ShOrder) -> usize {
        order.0
    }
}

impl TryFrom<i64> for ShOrder {
    type Error = ShError;

    fn try_from(order: i64) -> ShResult<Self> {
        if order < 0 {
            return Err(ShError::InvalidOrder(format!("{} is negative", order)));
        }
        Self::new(order as usize)
    }
}

impl TryFrom<f64> for ShOrder {
    type Error = ShError;

    fn try_from(order: f64) -> ShResult<Self> {
        if !order.is_finite() || order.fract() != 0.0 {
            return Err(ShError::InvalidOrder(format!("{} is not an integer", order)));
        }
        if order < 0.0 {
            return Err(ShError::InvalidOrder(format!("{} is negative", order)));
        }
        if order > MAX_ORDER as f64 {
            return Err(ShError::InvalidOrder(format!(
                "{} (max supported: {})",
                order, MAX_ORDER
            )));
        }
        Self::new(order as usize)
    }
}

impl std::fmt::Display for ShOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coefficient count for order N
pub fn num_coefficients(order: usize) -> usize {
    (order + 1) * (order + 1)
}

/// ACN channel index from (degree, mode)
pub fn acn_index(degree: i32, mode: i32) -> usize {
    (degree * degree + degree + mode) as usize
}

/// Get (degree, mode) from ACN index
pub fn acn_to_degree_mode(acn: usize) -> (i32, i32) {
    let degree = (acn as f64).sqrt().floor() as i32;
    let mode = acn as i32 - degree * degree - degree;
    (degree, mode)
}

/// Real harmonics up to `order` for one direction (radians), ACN ordered
pub fn real_sh(order: usize, azimuth: f64, elevation: f64) -> Vec<f64> {
    let mut out = vec![0.0; num_coefficients(order)];
    fill_real_sh(order, azimuth, elevation, &mut out);
    out
}

/// Evaluate into a slice of length (order + 1)²
fn fill_real_sh(order: usize, azimuth: f64, elevation: f64, out: &mut [f64]) {
    let legendre = normalized_legendre(order, elevation.sin(), elevation.cos());
    let sqrt2 = std::f64::consts::SQRT_2;

    for n in 0..=order {
        out[acn_index(n as i32, 0)] = legendre[legendre_index(n, 0)];
        for m in 1..=n {
            let p = sqrt2 * legendre[legendre_index(n, m)];
            let (sin_m, cos_m) = (m as f64 * azimuth).sin_cos();
            out[acn_index(n as i32, m as i32)] = p * cos_m;
            out[acn_index(n as i32, -(m as i32))] = p * sin_m;
        }
    }
}

/// Position of P̄(n, m) in the triangular Legendre table
fn legendre_index(n: usize, m: usize) -> usize {
    n * (n + 1) / 2 + m
}

/// Fully normalized associated Legendre values P̄(n, m)(x) for 0 <= m <= n <= order
///
/// Normalized so that P̄(n, m) cos(mφ)·√2 integrates to one over the sphere.
/// `s` is sqrt(1 - x²), passed in to keep the sign of cos(elevation).
fn normalized_legendre(order: usize, x: f64, s: f64) -> Vec<f64> {
    let mut p = vec![0.0; legendre_index(order, order) + 1];
    p[0] = (1.0 / (4.0 * PI)).sqrt();

    for m in 0..=order {
        if m > 0 {
            let mf = m as f64;
            p[legendre_index(m, m)] =
                ((2.0 * mf + 1.0) / (2.0 * mf)).sqrt() * s * p[legendre_index(m - 1, m - 1)];
        }
        if m + 1 <= order {
            p[legendre_index(m + 1, m)] =
                (2.0 * m as f64 + 3.0).sqrt() * x * p[legendre_index(m, m)];
        }
        for n in (m + 2)..=order {
            let nf = n as f64;
            let mf = m as f64;
            let a = ((4.0 * nf * nf - 1.0) / (nf * nf - mf * mf)).sqrt();
            let b = (((nf - 1.0) * (nf - 1.0) - mf * mf) / (4.0 * (nf - 1.0) * (nf - 1.0) - 1.0))
                .sqrt();
            p[legendre_index(n, m)] =
                a * (x * p[legendre_index(n - 1, m)] - b * p[legendre_index(n - 2, m)]);
        }
    }

    p
}

/// SH basis matrix (directions × (order + 1)²)
pub fn basis_matrix(grid: &DirectionGrid, order: ShOrder) -> Array2<f64> {
    let num_coeffs = order.num_coefficients();
    let rows: Vec<Vec<f64>> = grid
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(az, el)| real_sh(order.as_usize(), az, el))
        .collect();

    let mut matrix = Array2::<f64>::zeros((grid.len(), num_coeffs));
    for (i, row) in rows.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    matrix
}
