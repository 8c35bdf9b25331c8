//! Magnitude least-squares recursion
//!
//! Above the cutoff only the magnitude of the measured spectra is matched.
//! The phase of each bin's target is taken from the previous bin's solution,
//! so the recursion is a fold over increasing frequency.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use num_complex::Complex64;

use crate::sh::ShBasis;

/// Predictions weaker than this keep the measured phase
const MIN_PREDICTED_MAGNITUDE: f64 = 1e-12;

/// First bin at or above `cutoff_hz`, never bin 0
pub(crate) fn start_bin(cutoff_hz: f64, num_bins: usize, bin_width: f64) -> Option<usize> {
    (1..num_bins).find(|&k| k as f64 * bin_width >= cutoff_hz)
}

/// Per-ear MagLS solver over a shared basis
pub(crate) struct MagLsSolver<'a> {
    basis: &'a ShBasis,
    /// (YᵀY + kI)⁻¹ when smoothing is on
    regularized: Option<&'a Array2<Complex64>>,
    smoothing_k: f64,
    iterations: usize,
}

impl<'a> MagLsSolver<'a> {
    pub(crate) fn new(
        basis: &'a ShBasis,
        regularized: Option<&'a Array2<Complex64>>,
        smoothing_k: f64,
        iterations: usize,
    ) -> Self {
        Self {
            basis,
            regularized,
            smoothing_k,
            iterations: iterations.max(1),
        }
    }

    /// Replace columns `start..` of `coeffs` (coefficient × bin) with magnitude fits
    ///
    /// `spectra` is (bin × direction) and `coeffs` must already hold the ordinary
    /// fit for every bin: column `start - 1` seeds the recursion and the ordinary
    /// fit is the fallback for bins whose solution is not finite.
    /// Returns the number of fallbacks.
    pub(crate) fn solve(
        &self,
        spectra: &ArrayView2<'_, Complex64>,
        coeffs: &mut Array2<Complex64>,
        start: usize,
    ) -> usize {
        let num_bins = coeffs.ncols();
        if start == 0 || start >= num_bins {
            return 0;
        }

        let seed = coeffs.column(start - 1).to_owned();
        let (_, fallbacks) = (start..num_bins).fold((seed, 0usize), |(previous, fallbacks), bin| {
            match self.solve_bin(&spectra.row(bin), &previous) {
                Some(solution) => {
                    coeffs.column_mut(bin).assign(&solution);
                    (solution, fallbacks)
                }
                None => {
                    log::debug!("MagLS bin {} did not converge, keeping least-squares fit", bin);
                    (coeffs.column(bin).to_owned(), fallbacks + 1)
                }
            }
        });

        fallbacks
    }

    /// min ‖Y c − |H|·e^{i·arg(Y c_prev)}‖² + k ‖c − c_prev‖²
    fn solve_bin(
        &self,
        measured: &ArrayView1<'_, Complex64>,
        previous: &Array1<Complex64>,
    ) -> Option<Array1<Complex64>> {
        let mut solution = previous.clone();

        for _ in 0..self.iterations {
            let predicted = self.basis.evaluate_vector(&solution.view());
            let target = Zip::from(measured).and(&predicted).map_collect(|&h, &p| {
                if p.norm() > MIN_PREDICTED_MAGNITUDE {
                    Complex64::from_polar(h.norm(), p.arg())
                } else {
                    h
                }
            });

            solution = match self.regularized {
                None => self.basis.fit_vector(&target.view()),
                Some(inverse) => {
                    let rhs = self.basis.project(&target.view()) + previous * self.smoothing_k;
                    inverse.dot(&rhs)
                }
            };
        }

        solution
            .iter()
            .all(|c| c.re.is_finite() && c.im.is_finite())
            .then_some(solution)
    }
}
