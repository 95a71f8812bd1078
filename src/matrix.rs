//! Dense matrices of exact rationals and the Gaussian elimination used by
//! the loop linearisation pass.
//!
//! Exactness matters: degeneracy detection relies on coefficients comparing
//! equal to zero, which floating point cannot promise.

use std::fmt;
use std::ops::{Index, IndexMut};

use num::{BigRational, Zero};

/// A row-major dense matrix of [`BigRational`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    cells: Vec<BigRational>,
}

impl Matrix {
    /// An all-zero matrix of the given dimensions.
    pub fn zero(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            cells: vec![BigRational::zero(); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row_is_zero(&self, row: usize) -> bool {
        (0..self.cols).all(|col| self[(row, col)].is_zero())
    }

    /// Drops every row at index `rows` and beyond.
    fn truncate_rows(&mut self, rows: usize) {
        debug_assert!(rows <= self.rows);
        self.cells.truncate(rows * self.cols);
        self.rows = rows;
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = BigRational;

    fn index(&self, (row, col): (usize, usize)) -> &BigRational {
        &self.cells[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut BigRational {
        &mut self.cells[row * self.cols + col]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                write!(f, "{}\t", self[(row, col)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Outcome of eliminating a linear system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elimination {
    /// The system has exactly one solution, returned as an `N x M` matrix.
    Unique(Matrix),
    /// A pivot vanished: not enough independent equations. The caller is
    /// expected to bring fresh samples and try again.
    Underdetermined,
    /// The equations contradict each other.
    Inconsistent,
}

/// Solves `a * x = b` by Gauss-Jordan elimination over exact rationals.
///
/// `a` is `S x N` (one row per sample, one column per unknown coefficient)
/// and `b` is `S x M` (`M` independent right-hand sides solved in one go).
/// Rows beyond the first `N` act as consistency checks: after elimination
/// they must have reduced to zero, otherwise the system is inconsistent.
///
/// No row swapping happens on a vanished pivot; the system is reported
/// underdetermined instead, matching the resample-and-retry discipline of
/// the caller.
pub fn eliminate(mut a: Matrix, mut b: Matrix) -> Elimination {
    assert_eq!(a.rows(), b.rows());

    let samples = a.rows();
    let unknowns = a.cols();
    let systems = b.cols();

    for i in 0..samples.min(unknowns) {
        if a[(i, i)].is_zero() {
            return Elimination::Underdetermined;
        }

        let pivot = a[(i, i)].clone();
        for j in 0..unknowns {
            a[(i, j)] /= &pivot;
        }
        for j in 0..systems {
            b[(i, j)] /= &pivot;
        }

        for k in 0..samples {
            if k == i {
                continue;
            }
            let factor = a[(k, i)].clone();
            if factor.is_zero() {
                continue;
            }
            for j in 0..unknowns {
                let d = &factor * &a[(i, j)];
                a[(k, j)] -= d;
            }
            for j in 0..systems {
                let d = &factor * &b[(i, j)];
                b[(k, j)] -= d;
            }
        }
    }

    for i in unknowns..samples {
        if !b.row_is_zero(i) {
            return Elimination::Inconsistent;
        }
    }

    b.truncate_rows(unknowns);
    Elimination::Unique(b)
}
