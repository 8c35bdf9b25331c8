//! Reconstruction error metrics
//!
//! Compare a decoded transfer-function set against the measured reference on
//! the same grid. Direction averages use the grid's quadrature weights when
//! present.

use std::f64::consts::PI;

use ndarray::{Array2, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::binaural::Ear;
use crate::data::TransferFunctionSet;
use crate::error::{ShError, ShResult};
use crate::grid::DirectionGrid;

/// Magnitudes below this are clamped before taking logarithms
const MAGNITUDE_FLOOR: f64 = 1e-12;

/// Lowest frequency of the phase-delay band (Hz)
pub const PHASE_BAND_LOW_HZ: f64 = 500.0;

fn check_pair(estimate: &TransferFunctionSet, reference: &TransferFunctionSet) -> ShResult<()> {
    if estimate.data().dim() != reference.data().dim() {
        let (eb, ed, _) = estimate.data().dim();
        let (rb, rd, _) = reference.data().dim();
        return Err(if eb != rb {
            ShError::mismatch("frequency bins", rb, eb)
        } else {
            ShError::mismatch("directions", rd, ed)
        });
    }
    if estimate.sample_rate() != reference.sample_rate() || estimate.fft_len() != reference.fft_len() {
        return Err(ShError::InvalidParameter(
            "estimate and reference use different sample rates or FFT lengths".into(),
        ));
    }
    Ok(())
}

/// Normalized direction weights
fn direction_weights(num_directions: usize, grid: Option<&DirectionGrid>) -> ShResult<Vec<f64>> {
    match grid.and_then(|g| g.weights().map(|w| (g.len(), w))) {
        Some((len, _)) if len != num_directions => Err(ShError::mismatch("weights", num_directions, len)),
        Some((_, w)) => {
            let total: f64 = w.iter().sum();
            if total <= 0.0 {
                return Err(ShError::InvalidParameter("direction weights sum to zero".into()));
            }
            Ok(w.iter().map(|v| v / total).collect())
        }
        None => Ok(vec![1.0 / num_directions as f64; num_directions]),
    }
}

/// Weighted mean over directions of `f(estimate, reference, bin)` per (bin, ear)
fn averaged<F>(
    estimate: &TransferFunctionSet,
    reference: &TransferFunctionSet,
    grid: Option<&DirectionGrid>,
    f: F,
) -> ShResult<Array2<f64>>
where
    F: Fn(Complex64, Complex64, usize) -> f64,
{
    check_pair(estimate, reference)?;
    let weights = direction_weights(reference.num_directions(), grid)?;

    Ok(Array2::from_shape_fn((reference.num_bins(), Ear::ALL.len()), |(bin, ear)| {
        weights
            .iter()
            .enumerate()
            .map(|(dir, w)| w * f(estimate.data()[[bin, dir, ear]], reference.data()[[bin, dir, ear]], bin))
            .sum::<f64>()
    }))
}

/// Absolute magnitude error in dB per (bin, ear), averaged over directions
pub fn magnitude_error_db(
    estimate: &TransferFunctionSet,
    reference: &TransferFunctionSet,
    grid: Option<&DirectionGrid>,
) -> ShResult<Array2<f64>> {
    averaged(estimate, reference, grid, |e, r, _| {
        20.0 * (e.norm().max(MAGNITUDE_FLOOR) / r.norm().max(MAGNITUDE_FLOOR))
            .log10()
            .abs()
    })
}

/// Absolute phase-delay error in seconds per (bin, ear), averaged over directions
///
/// The phase difference is wrapped to (-π, π] before dividing by ω; DC reports zero.
pub fn phase_delay_error(
    estimate: &TransferFunctionSet,
    reference: &TransferFunctionSet,
    grid: Option<&DirectionGrid>,
) -> ShResult<Array2<f64>> {
    let frequencies = reference.frequencies();
    averaged(estimate, reference, grid, |e, r, bin| {
        let omega = 2.0 * PI * frequencies[bin];
        if omega <= 0.0 {
            return 0.0;
        }
        (e * r.conj()).arg().abs() / omega
    })
}

/// Relative Frobenius error ‖estimate − reference‖ / ‖reference‖ over all bins, directions and ears
pub fn relative_error(estimate: &TransferFunctionSet, reference: &TransferFunctionSet) -> ShResult<f64> {
    check_pair(estimate, reference)?;
    let (diff, norm) = estimate
        .data()
        .iter()
        .zip(reference.data().iter())
        .fold((0.0, 0.0), |(d, n), (e, r)| (d + (e - r).norm_sqr(), n + r.norm_sqr()));
    if norm <= 0.0 {
        return Err(ShError::InvalidParameter("reference set has no energy".into()));
    }
    Ok((diff / norm).sqrt())
}

/// Mean of a (bin, ear) metric over bins with `low_hz <= f <= high_hz` and both ears
pub fn band_mean(values: &Array2<f64>, frequencies: &[f64], low_hz: f64, high_hz: f64) -> ShResult<f64> {
    band_mean_opt(values, frequencies, low_hz, high_hz)?.ok_or_else(|| {
        ShError::InvalidParameter(format!("no bins between {} Hz and {} Hz", low_hz, high_hz))
    })
}

/// Like [`band_mean`], but `None` when the band holds no bins
fn band_mean_opt(values: &Array2<f64>, frequencies: &[f64], low_hz: f64, high_hz: f64) -> ShResult<Option<f64>> {
    if values.len_of(Axis(0)) != frequencies.len() {
        return Err(ShError::mismatch("frequency bins", frequencies.len(), values.len_of(Axis(0))));
    }
    let bins: Vec<usize> = frequencies
        .iter()
        .enumerate()
        .filter(|(_, f)| **f >= low_hz && **f <= high_hz)
        .map(|(k, _)| k)
        .collect();
    if bins.is_empty() {
        return Ok(None);
    }

    let total: f64 = bins.iter().map(|&k| values.row(k).sum()).sum();
    Ok(Some(total / (bins.len() * values.ncols()) as f64))
}

/// Summary of one reconstruction against its reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Split between the phase-delay band and the magnitude band (Hz), `None` for no magnitude band
    pub split_hz: Option<f64>,
    /// Mean magnitude error over the whole spectrum (dB)
    pub magnitude_db: f64,
    /// Mean magnitude error at and above the split (dB), `None` when no bin lies there
    pub magnitude_db_high: Option<f64>,
    /// Mean phase-delay error from 500 Hz up to below the split (s), `None` when the band is empty
    pub phase_delay_low_s: Option<f64>,
    /// Relative complex error over the whole set
    pub relative_error: f64,
    /// Ear-averaged magnitude error per bin (dB)
    pub magnitude_db_per_bin: Vec<f64>,
    /// Ear-averaged phase-delay error per bin (s)
    pub phase_delay_per_bin_s: Vec<f64>,
}

impl ErrorReport {
    /// Evaluate `estimate` against `reference`, splitting at `split_hz`
    ///
    /// Pass the set's MagLS cutoff: with `None`, or a split past Nyquist, the
    /// whole spectrum from 500 Hz up is the phase-delay band. The bin at the
    /// split belongs to the magnitude band only.
    pub fn compute(
        estimate: &TransferFunctionSet,
        reference: &TransferFunctionSet,
        grid: Option<&DirectionGrid>,
        split_hz: Option<f64>,
    ) -> ShResult<Self> {
        let frequencies = reference.frequencies();
        let magnitude = magnitude_error_db(estimate, reference, grid)?;
        let phase = phase_delay_error(estimate, reference, grid)?;

        let nyquist = reference.nyquist();
        let split = split_hz.unwrap_or(f64::INFINITY);
        // Highest bin strictly below the split
        let phase_top = frequencies
            .iter()
            .rev()
            .find(|f| **f < split)
            .copied()
            .unwrap_or(f64::NEG_INFINITY);

        Ok(Self {
            split_hz,
            magnitude_db: band_mean(&magnitude, &frequencies, 0.0, nyquist)?,
            magnitude_db_high: band_mean_opt(&magnitude, &frequencies, split, nyquist)?,
            phase_delay_low_s: band_mean_opt(&phase, &frequencies, PHASE_BAND_LOW_HZ, phase_top)?,
            relative_error: relative_error(estimate, reference)?,
            magnitude_db_per_bin: magnitude.mean_axis(Axis(1)).map(|m| m.to_vec()).unwrap_or_default(),
            phase_delay_per_bin_s: phase.mean_axis(Axis(1)).map(|m| m.to_vec()).unwrap_or_default(),
        })
    }
}
