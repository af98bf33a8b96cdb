//! Diagnostics reported by multistate analysis: MBAR overlap, replica mixing and
//! time-convergence of the free-energy estimate.

use crate::core::units::Energy;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Matrix must be square and non-empty, got {rows} rows with lengths {row_lengths:?}")]
    NotSquare {
        rows: usize,
        row_lengths: Vec<usize>,
    },
}

/// A square state-to-state matrix with its spectrum.
///
/// `scalar` is one minus the largest non-trivial eigenvalue (the spectral gap); a gap close to
/// zero means poorly mixing or poorly overlapping states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDiagnostics {
    pub matrix: Vec<Vec<f64>>,
    pub eigenvalues: Vec<f64>,
    pub scalar: f64,
}

impl MatrixDiagnostics {
    pub fn from_matrix(matrix: Vec<Vec<f64>>) -> Result<Self, AnalysisError> {
        let n = matrix.len();
        if n == 0 || matrix.iter().any(|row| row.len() != n) {
            return Err(AnalysisError::NotSquare {
                rows: n,
                row_lengths: matrix.iter().map(Vec::len).collect(),
            });
        }
        let dense = DMatrix::from_fn(n, n, |i, j| matrix[i][j]);
        let mut eigenvalues: Vec<f64> = dense.complex_eigenvalues().iter().map(|c| c.re).collect();
        eigenvalues.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
        let scalar = eigenvalues.get(1).map_or(0.0, |second| 1.0 - second);
        Ok(Self {
            matrix,
            eigenvalues,
            scalar,
        })
    }

    pub fn n_states(&self) -> usize {
        self.matrix.len()
    }
}

/// Free-energy estimates from growing fractions of the data, analysed forwards and backwards
/// in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardReverseAnalysis {
    pub fractions: Vec<f64>,
    pub forward_dgs: Vec<Energy>,
    pub forward_ddgs: Vec<Energy>,
    pub reverse_dgs: Vec<Energy>,
    pub reverse_ddgs: Vec<Energy>,
}
