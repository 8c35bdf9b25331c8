//! SH decoder - coefficients to transfer functions at arbitrary directions

use ndarray::{s, Array2, Array3, Axis};
use num_complex::Complex64;
use rayon::prelude::*;

use super::ShCoefficientSet;
use crate::binaural::{restore, Ear, HeadGeometry};
use crate::data::TransferFunctionSet;
use crate::error::{ShError, ShResult};
use crate::grid::DirectionGrid;
use crate::sh::{basis_matrix, ShOrder};

/// Decoder for one target grid and order
#[derive(Debug, Clone)]
pub struct ShDecoder {
    grid: DirectionGrid,
    order: ShOrder,
    /// Y_target (directions × coefficients)
    matrix: Array2<Complex64>,
}

impl ShDecoder {
    /// Evaluate the basis on `target_grid`
    pub fn new(target_grid: &DirectionGrid, order: ShOrder) -> ShResult<Self> {
        let matrix = basis_matrix(target_grid, order).mapv(|v| Complex64::new(v, 0.0));
        Ok(Self {
            grid: target_grid.clone(),
            order,
            matrix,
        })
    }

    /// Target grid
    pub fn grid(&self) -> &DirectionGrid {
        &self.grid
    }

    /// Decoding order
    pub fn order(&self) -> ShOrder {
        self.order
    }

    /// Decode, restoring the ear delays with `phase_alignment` when given
    ///
    /// The geometry must be the one used at encode time; a mismatch is not detectable.
    pub fn decode(
        &self,
        coefficients: &ShCoefficientSet,
        phase_alignment: Option<HeadGeometry>,
    ) -> ShResult<TransferFunctionSet> {
        if self.order > coefficients.order() {
            return Err(ShError::InvalidOrder(format!(
                "decode order {} exceeds encoded order {}",
                self.order,
                coefficients.order()
            )));
        }

        let num_coeffs = self.order.num_coefficients();
        let num_bins = coefficients.num_bins();

        // (directions × bins) per ear
        let per_ear: Vec<Array2<Complex64>> = Ear::ALL
            .par_iter()
            .map(|&ear| {
                let c = coefficients.ear(ear);
                self.matrix.dot(&c.slice(s![..num_coeffs, ..]))
            })
            .collect();

        let mut data = Array3::<Complex64>::zeros((num_bins, self.grid.len(), Ear::ALL.len()));
        for (ear, values) in Ear::ALL.iter().zip(per_ear) {
            data.index_axis_mut(Axis(2), ear.index()).assign(&values.t());
        }

        let tf = TransferFunctionSet::new(data, coefficients.sample_rate(), coefficients.fft_len())?;

        log::debug!(
            "Decoded {} bins at {} directions, order {}",
            num_bins,
            self.grid.len(),
            self.order
        );

        match phase_alignment {
            Some(geometry) => restore(&tf, &self.grid, &geometry),
            None => Ok(tf),
        }
    }

    /// Decode using the set's own strategy and head geometry
    pub fn decode_set(&self, coefficients: &ShCoefficientSet) -> ShResult<TransferFunctionSet> {
        let alignment = coefficients
            .strategy()
            .is_phase_aligned()
            .then_some(*coefficients.geometry());
        self.decode(coefficients, alignment)
    }
}

/// Evaluate `coefficients` at `target_grid` up to `order`
pub fn decode(
    coefficients: &ShCoefficientSet,
    target_grid: &DirectionGrid,
    order: ShOrder,
    phase_alignment: Option<HeadGeometry>,
) -> ShResult<TransferFunctionSet> {
    ShDecoder::new(target_grid, order)?.decode(coefficients, phase_alignment)
}
