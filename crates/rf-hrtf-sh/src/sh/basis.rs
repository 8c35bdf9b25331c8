//! SH basis matrix and least-squares helpers

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_complex::Complex64;

use super::{basis_matrix, ShOrder};
use crate::error::{ShError, ShResult};
use crate::grid::DirectionGrid;

/// Basis matrix of one (grid, order) pair together with its pseudo-inverse
///
/// Read-only after construction; share it through `Arc` between encoders
/// and decoders working on the same grid.
#[derive(Debug, Clone)]
pub struct ShBasis {
    order: ShOrder,
    /// Fingerprint of the grid the basis was evaluated on
    grid_fingerprint: String,
    /// Y (directions × coefficients)
    matrix: Array2<f64>,
    /// Y⁺ (coefficients × directions)
    pinv: Array2<f64>,
    /// Complex copies for products with spectra
    matrix_c: Array2<Complex64>,
    pinv_c: Array2<Complex64>,
    rank: usize,
}

impl ShBasis {
    /// Evaluate the basis on `grid` and fit its pseudo-inverse
    pub fn new(grid: &DirectionGrid, order: ShOrder) -> ShResult<Self> {
        let matrix = basis_matrix(grid, order);
        let (pinv, rank) = pseudo_inverse_with_rank(&matrix)?;

        let num_coeffs = order.num_coefficients();
        if num_coeffs > grid.len() {
            log::warn!(
                "SH order {} needs {} coefficients but only {} directions; using minimum-norm fit",
                order,
                num_coeffs,
                grid.len()
            );
        }
        log::debug!(
            "SH basis: order {}, {} directions, {} coefficients, rank {}",
            order,
            grid.len(),
            num_coeffs,
            rank
        );

        Ok(Self {
            order,
            grid_fingerprint: grid.fingerprint(),
            matrix_c: to_complex(&matrix),
            pinv_c: to_complex(&pinv),
            matrix,
            pinv,
            rank,
        })
    }

    /// Order of the basis
    pub fn order(&self) -> ShOrder {
        self.order
    }

    /// True when the basis was evaluated on exactly these directions
    pub fn is_for_grid(&self, grid: &DirectionGrid) -> bool {
        self.num_directions() == grid.len() && self.grid_fingerprint == grid.fingerprint()
    }

    /// Number of directions (rows)
    pub fn num_directions(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns)
    pub fn num_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Numerical rank of the basis
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// True when there are fewer independent directions than coefficients
    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.num_coefficients()
    }

    /// Y
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Y⁺
    pub fn pinv(&self) -> &Array2<f64> {
        &self.pinv
    }

    /// Least-squares coefficients of a (directions × columns) block
    pub fn fit(&self, values: &ArrayView2<'_, Complex64>) -> Array2<Complex64> {
        self.pinv_c.dot(values)
    }

    /// Least-squares coefficients of one spatial sample vector
    pub fn fit_vector(&self, values: &ArrayView1<'_, Complex64>) -> Array1<Complex64> {
        self.pinv_c.dot(values)
    }

    /// Evaluate coefficient columns at the grid directions
    pub fn evaluate(&self, coeffs: &ArrayView2<'_, Complex64>) -> Array2<Complex64> {
        self.matrix_c.dot(coeffs)
    }

    /// Evaluate one coefficient vector at the grid directions
    pub fn evaluate_vector(&self, coeffs: &ArrayView1<'_, Complex64>) -> Array1<Complex64> {
        self.matrix_c.dot(coeffs)
    }

    /// Yᴴ v (Y is real, so Yᵀ v)
    pub(crate) fn project(&self, values: &ArrayView1<'_, Complex64>) -> Array1<Complex64> {
        self.matrix_c.t().dot(values)
    }
}

fn to_complex(matrix: &Array2<f64>) -> Array2<Complex64> {
    matrix.mapv(|v| Complex64::new(v, 0.0))
}

fn to_nalgebra(matrix: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
}

fn from_nalgebra(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}

/// Moore-Penrose pseudo-inverse
///
/// Singular values below `max(rows, cols) · ε · σmax` are discarded, which gives
/// the minimum-norm least-squares solution for rank-deficient matrices.
pub fn pseudo_inverse(matrix: &Array2<f64>) -> ShResult<Array2<f64>> {
    pseudo_inverse_with_rank(matrix).map(|(pinv, _)| pinv)
}

fn pseudo_inverse_with_rank(matrix: &Array2<f64>) -> ShResult<(Array2<f64>, usize)> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || cols == 0 {
        return Err(ShError::InvalidParameter("cannot invert an empty matrix".into()));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(ShError::InvalidParameter("matrix contains non-finite values".into()));
    }

    let svd = to_nalgebra(matrix).svd(true, true);
    let sigma_max = svd.singular_values.max();
    let tolerance = rows.max(cols) as f64 * f64::EPSILON * sigma_max;
    let rank = svd.singular_values.iter().filter(|&&s| s > tolerance).count();

    let pinv = svd
        .pseudo_inverse(tolerance)
        .map_err(|e| ShError::InvalidParameter(format!("pseudo-inverse failed: {}", e)))?;

    Ok((from_nalgebra(&pinv), rank))
}

/// (YᵀY + kI)⁻¹ for Tikhonov-regularized fits, k > 0
pub fn regularized_inverse(basis: &ShBasis, k: f64) -> ShResult<Array2<f64>> {
    if !(k.is_finite() && k > 0.0) {
        return Err(ShError::InvalidParameter(format!(
            "regularization must be positive, got {}",
            k
        )));
    }

    let y = to_nalgebra(basis.matrix());
    let n = basis.num_coefficients();
    let gram = y.transpose() * &y + DMatrix::<f64>::identity(n, n) * k;

    let inverse = gram
        .cholesky()
        .ok_or_else(|| ShError::InvalidParameter("regularized Gram matrix is not positive definite".into()))?
        .inverse();

    Ok(from_nalgebra(&inverse))
}
