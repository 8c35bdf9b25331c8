//! SH encoder

use std::sync::Arc;

use ndarray::{Array2, Array3, Axis};
use num_complex::Complex64;
use rayon::prelude::*;

use super::magls::{start_bin, MagLsSolver};
use super::{cutoff_frequency, EncodingStrategy, ShCoefficientSet};
use crate::binaural::{align, Ear};
use crate::config::EncoderConfig;
use crate::data::TransferFunctionSet;
use crate::error::{ShError, ShResult};
use crate::grid::DirectionGrid;
use crate::sh::{regularized_inverse, ShBasis, ShOrder};

/// Encoder for one measurement grid and order
///
/// Holds the basis and its pseudo-inverse so repeated encodes of sets
/// measured on the same grid skip the SVD.
#[derive(Debug, Clone)]
pub struct ShEncoder {
    grid: DirectionGrid,
    basis: Arc<ShBasis>,
    /// (YᵀY + kI)⁻¹ for smoothed MagLS
    regularized: Option<Array2<Complex64>>,
    config: EncoderConfig,
}

impl ShEncoder {
    /// Build the basis for `grid` at `order`
    pub fn new(grid: &DirectionGrid, order: ShOrder, config: EncoderConfig) -> ShResult<Self> {
        config.validate()?;
        let basis = Arc::new(ShBasis::new(grid, order)?);
        Self::with_basis(grid, basis, config)
    }

    /// Reuse an existing basis built for `grid`
    pub fn with_basis(grid: &DirectionGrid, basis: Arc<ShBasis>, config: EncoderConfig) -> ShResult<Self> {
        config.validate()?;
        if basis.num_directions() != grid.len() {
            return Err(ShError::mismatch("basis directions", grid.len(), basis.num_directions()));
        }
        if !basis.is_for_grid(grid) {
            return Err(ShError::InvalidParameter(
                "basis was evaluated on a different grid".into(),
            ));
        }

        let regularized = if config.smoothing_k > 0.0 {
            Some(regularized_inverse(&basis, config.smoothing_k)?.mapv(|v| Complex64::new(v, 0.0)))
        } else {
            None
        };

        Ok(Self {
            grid: grid.clone(),
            basis,
            regularized,
            config,
        })
    }

    /// Measurement grid
    pub fn grid(&self) -> &DirectionGrid {
        &self.grid
    }

    /// Shared basis
    pub fn basis(&self) -> &Arc<ShBasis> {
        &self.basis
    }

    /// Encoding order
    pub fn order(&self) -> ShOrder {
        self.basis.order()
    }

    /// Encoder configuration
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// MagLS cutoff frequency for this order and head
    pub fn cutoff_frequency(&self) -> f64 {
        cutoff_frequency(self.order(), &self.config.geometry, self.config.min_cutoff_hz)
    }

    /// Encode a transfer-function set measured on this encoder's grid
    pub fn encode(&self, tf: &TransferFunctionSet, strategy: EncodingStrategy) -> ShResult<ShCoefficientSet> {
        if tf.num_directions() != self.grid.len() {
            return Err(ShError::mismatch("directions", self.grid.len(), tf.num_directions()));
        }

        let aligned;
        let spectra = if strategy.is_phase_aligned() {
            aligned = align(tf, &self.grid, &self.config.geometry)?;
            &aligned
        } else {
            tf
        };

        let cutoff = self.cutoff_frequency();
        let start = if strategy.uses_magls() {
            start_bin(cutoff, tf.num_bins(), tf.bin_frequency(1))
        } else {
            None
        };
        if strategy.uses_magls() && start.is_none() {
            log::debug!(
                "MagLS cutoff {:.0} Hz above Nyquist {:.0} Hz, encoding without magnitude fit",
                cutoff,
                tf.nyquist()
            );
        }

        let solver = MagLsSolver::new(
            &self.basis,
            self.regularized.as_ref(),
            self.config.smoothing_k,
            self.config.magls_iterations,
        );

        let per_ear: Vec<(Array2<Complex64>, usize)> = Ear::ALL
            .par_iter()
            .map(|&ear| {
                let h = spectra.ear(ear);
                let mut coeffs = self.basis.fit(&h.t());
                let fallbacks = match start {
                    Some(bin) => solver.solve(&h, &mut coeffs, bin),
                    None => 0,
                };
                (coeffs, fallbacks)
            })
            .collect();

        let mut coefficients =
            Array3::<Complex64>::zeros((self.basis.num_coefficients(), tf.num_bins(), Ear::ALL.len()));
        let mut fallbacks = 0;
        for (ear, (coeffs, count)) in Ear::ALL.iter().zip(per_ear) {
            coefficients.index_axis_mut(Axis(2), ear.index()).assign(&coeffs);
            fallbacks += count;
        }
        if fallbacks > 0 {
            log::debug!("MagLS fell back to least squares in {} bins", fallbacks);
        }

        log::debug!(
            "Encoded {} directions x {} bins at order {} ({})",
            tf.num_directions(),
            tf.num_bins(),
            self.order(),
            strategy
        );

        ShCoefficientSet::new(
            coefficients,
            self.order(),
            strategy,
            start.map(|_| cutoff),
            tf,
            self.config.geometry,
        )
    }
}

/// Encode `tf` measured on `grid` with a one-off encoder
pub fn encode(
    tf: &TransferFunctionSet,
    grid: &DirectionGrid,
    order: ShOrder,
    strategy: EncodingStrategy,
    config: &EncoderConfig,
) -> ShResult<ShCoefficientSet> {
    ShEncoder::new(grid, order, config.clone())?.encode(tf, strategy)
}
