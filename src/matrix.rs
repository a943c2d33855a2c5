//! Dense matrix utility used by the solver. Only the operations the damped least squares
//! step needs are provided, and inversion is deliberately limited to 3x3 and 6x6 systems.

use nalgebra::DMatrix;
use std::fmt;

/// Magnitude below which a determinant or pivot is treated as zero.
pub const SINGULARITY_THRESHOLD: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub enum MatrixError {
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    Singular,
    UnsupportedDimension(usize),
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixError::DimensionMismatch { left, right } => write!(
                f,
                "Dimension mismatch: {}x{} and {}x{}",
                left.0, left.1, right.0, right.1
            ),
            MatrixError::Singular => write!(f, "Matrix is singular"),
            MatrixError::UnsupportedDimension(n) => {
                write!(f, "Inversion of {}x{} matrices is not supported", n, n)
            }
        }
    }
}

impl std::error::Error for MatrixError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: DMatrix<f64>,
}

impl Matrix {
    /// Matrix of zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix { data: DMatrix::zeros(rows, cols) }
    }

    pub fn identity(n: usize) -> Self {
        Matrix { data: DMatrix::identity(n, n) }
    }

    /// Builds the matrix from values listed row after row.
    pub fn from_row_slice(rows: usize, cols: usize, values: &[f64]) -> Self {
        Matrix { data: DMatrix::from_row_slice(rows, cols, values) }
    }

    /// Column vector
    pub fn column(values: &[f64]) -> Self {
        Matrix { data: DMatrix::from_column_slice(values.len(), 1, values) }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[(row, col)] = value;
    }

    fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn transpose(&self) -> Matrix {
        Matrix { data: self.data.transpose() }
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        if self.cols() != other.rows() {
            return Err(MatrixError::DimensionMismatch { left: self.shape(), right: other.shape() });
        }
        Ok(Matrix { data: &self.data * &other.data })
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        if self.shape() != other.shape() {
            return Err(MatrixError::DimensionMismatch { left: self.shape(), right: other.shape() });
        }
        Ok(Matrix { data: &self.data + &other.data })
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        Matrix { data: self.data.map(|v| v * factor) }
    }

    /// Inverse of a square 3x3 or 6x6 matrix.
    pub fn inverse(&self) -> Result<Matrix, MatrixError> {
        if self.rows() != self.cols() {
            return Err(MatrixError::DimensionMismatch { left: self.shape(), right: self.shape() });
        }
        match self.rows() {
            3 => self.inverse_3x3(),
            6 => self.inverse_gauss_jordan(),
            n => Err(MatrixError::UnsupportedDimension(n)),
        }
    }

    /// `Jᵗ · (J·Jᵗ + λI)⁻¹`, the damped least squares pseudo-inverse.
    /// The number of rows of `self` must be 3 or 6.
    pub fn damped_pseudo_inverse(&self, lambda: f64) -> Result<Matrix, MatrixError> {
        let jt = self.transpose();
        let jjt = self.multiply(&jt)?;
        let damped = jjt.add(&Matrix::identity(self.rows()).scale(lambda))?;
        jt.multiply(&damped.inverse()?)
    }

    /// Closed form inverse through cofactors.
    fn inverse_3x3(&self) -> Result<Matrix, MatrixError> {
        let m = |r: usize, c: usize| self.data[(r, c)];

        let c00 = m(1, 1) * m(2, 2) - m(1, 2) * m(2, 1);
        let c01 = m(1, 2) * m(2, 0) - m(1, 0) * m(2, 2);
        let c02 = m(1, 0) * m(2, 1) - m(1, 1) * m(2, 0);

        let det = m(0, 0) * c00 + m(0, 1) * c01 + m(0, 2) * c02;
        if det.abs() < SINGULARITY_THRESHOLD {
            return Err(MatrixError::Singular);
        }

        let c10 = m(0, 2) * m(2, 1) - m(0, 1) * m(2, 2);
        let c11 = m(0, 0) * m(2, 2) - m(0, 2) * m(2, 0);
        let c12 = m(0, 1) * m(2, 0) - m(0, 0) * m(2, 1);
        let c20 = m(0, 1) * m(1, 2) - m(0, 2) * m(1, 1);
        let c21 = m(0, 2) * m(1, 0) - m(0, 0) * m(1, 2);
        let c22 = m(0, 0) * m(1, 1) - m(0, 1) * m(1, 0);

        // Adjugate is the transposed cofactor matrix
        let inv_det = 1.0 / det;
        Ok(Matrix::from_row_slice(
            3,
            3,
            &[
                c00 * inv_det, c10 * inv_det, c20 * inv_det,
                c01 * inv_det, c11 * inv_det, c21 * inv_det,
                c02 * inv_det, c12 * inv_det, c22 * inv_det,
            ],
        ))
    }

    /// Gauss-Jordan elimination with partial pivoting on the augmented matrix [M | I].
    fn inverse_gauss_jordan(&self) -> Result<Matrix, MatrixError> {
        let n = self.rows();
        let mut aug = DMatrix::<f64>::zeros(n, 2 * n);
        aug.view_mut((0, 0), (n, n)).copy_from(&self.data);
        aug.view_mut((0, n), (n, n)).fill_with_identity();

        for col in 0..n {
            let mut pivot_row = col;
            for row in col + 1..n {
                if aug[(row, col)].abs() > aug[(pivot_row, col)].abs() {
                    pivot_row = row;
                }
            }
            if aug[(pivot_row, col)].abs() < SINGULARITY_THRESHOLD {
                return Err(MatrixError::Singular);
            }
            if pivot_row != col {
                aug.swap_rows(pivot_row, col);
            }

            let pivot = aug[(col, col)];
            for c in 0..2 * n {
                aug[(col, c)] /= pivot;
            }

            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = aug[(row, col)];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..2 * n {
                    let v = aug[(col, c)];
                    aug[(row, c)] -= factor * v;
                }
            }
        }

        Ok(Matrix { data: aug.view((0, n), (n, n)).into_owned() })
    }
}
