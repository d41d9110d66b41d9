//! Gaussian noise injection.
//!
//! A [`Covariance`] is validated once, when it is built, and caches its
//! symmetric matrix square root. Sampling then only multiplies that root with
//! a standard normal vector.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{Result, SimError};

/// Relative tolerance for the symmetry and PSD checks.
const PSD_TOLERANCE: f64 = 1e-9;

/// A validated symmetric positive semi-definite covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance {
    matrix: DMatrix<f64>,
    sqrt: DMatrix<f64>,
}

impl Covariance {
    /// Validates `matrix` and precomputes its square root.
    ///
    /// Eigenvalues that are negative only within tolerance are clamped to zero.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidCovariance` if the matrix is empty, not square,
    /// holds non-finite values, is not symmetric, or has a clearly negative
    /// eigenvalue.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if matrix.is_empty() {
            return Err(SimError::InvalidCovariance("matrix is empty".into()));
        }
        if !matrix.is_square() {
            return Err(SimError::InvalidCovariance(format!(
                "matrix is {}x{}, expected square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(SimError::InvalidCovariance("matrix has non-finite entries".into()));
        }

        let tolerance = PSD_TOLERANCE * matrix.amax().max(1.0);
        if (&matrix - matrix.transpose()).amax() > tolerance {
            return Err(SimError::InvalidCovariance("matrix is not symmetric".into()));
        }

        let eigen = matrix.clone().symmetric_eigen();
        if let Some(min) = eigen.eigenvalues.iter().copied().reduce(f64::min) {
            if min < -tolerance {
                return Err(SimError::InvalidCovariance(format!(
                    "matrix is not positive semi-definite (eigenvalue {min:.3e})"
                )));
            }
        }

        let roots = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
        let sqrt = &eigen.eigenvectors * DMatrix::from_diagonal(&roots) * eigen.eigenvectors.transpose();

        Ok(Self { matrix, sqrt })
    }

    /// Builds a covariance from row-major nested rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return Err(SimError::InvalidCovariance("rows have differing lengths".into()));
        }
        Self::new(DMatrix::from_fn(nrows, ncols, |r, c| rows[r][c]))
    }

    /// Builds a diagonal covariance.
    pub fn from_diagonal(variances: &[f64]) -> Result<Self> {
        Self::new(DMatrix::from_diagonal(&DVector::from_column_slice(variances)))
    }

    /// An all-zero covariance of dimension `dim`.
    pub fn zeros(dim: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(dim, dim),
            sqrt: DMatrix::zeros(dim, dim),
        }
    }

    /// Dimension of the matrix.
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// The covariance matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// The symmetric square root `S` with `S * S = Σ`.
    pub fn sqrt(&self) -> &DMatrix<f64> {
        &self.sqrt
    }

    /// Per-component standard deviations taken from the diagonal.
    pub fn std_devs(&self) -> DVector<f64> {
        self.matrix.diagonal().map(|v| v.max(0.0).sqrt())
    }
}

/// Scales and draws zero-mean Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    scale: f64,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl NoiseModel {
    /// Creates a noise model multiplying every sample by `scale`.
    ///
    /// A scale of zero disables noise.
    pub fn new(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(SimError::InvalidConfiguration(format!(
                "noise scale must be finite and non-negative, got {scale}"
            )));
        }
        Ok(Self { scale })
    }

    /// The noise scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Draws a sample distributed as `scale * N(0, Σ)`.
    pub fn sample<R: Rng + ?Sized>(&self, covariance: &Covariance, rng: &mut R) -> DVector<f64> {
        let z = DVector::from_fn(covariance.dim(), |_, _| rng.sample::<f64, _>(StandardNormal));
        covariance.sqrt() * z * self.scale
    }

    /// Draws a scalar sample distributed as `scale * N(0, std_dev²)`.
    pub fn sample_scalar<R: Rng + ?Sized>(&self, std_dev: f64, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.scale * std_dev * z
    }
}
