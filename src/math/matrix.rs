//! Dual dense/sparse matrix storage for state-space models
//!
//! Aeroelastic state-space models mix small dense blocks (rigid-body dynamics,
//! coupling gains) with large, mostly-empty aerodynamic blocks. Every operator
//! in this crate is written once against [`SysMatrix`], which stores either a
//! dense `DMatrix` or a compressed-column `CscMatrix` and guarantees identical
//! numerics for both.
//!
//! Storage promotion rule: a binary operation produces sparse storage only
//! when every operand is sparse, and dense storage otherwise.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Matrix with uniform dense/sparse storage
#[derive(Debug, Clone)]
pub enum SysMatrix {
    Dense(DMatrix<f64>),
    Sparse(CscMatrix<f64>),
}

impl From<DMatrix<f64>> for SysMatrix {
    fn from(m: DMatrix<f64>) -> Self {
        Self::Dense(m)
    }
}

impl From<CscMatrix<f64>> for SysMatrix {
    fn from(m: CscMatrix<f64>) -> Self {
        Self::Sparse(m)
    }
}

/// Build a compressed-column matrix from a dense one, dropping exact zeros
pub fn csc_from_dense(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(m.nrows(), m.ncols());
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            let v = m[(i, j)];
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
    }
    CscMatrix::from(&coo)
}

/// Iterate the stored entries of one column of a CSC matrix
fn csc_col(m: &CscMatrix<f64>, j: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
    let lo = m.col_offsets()[j];
    let hi = m.col_offsets()[j + 1];
    m.row_indices()[lo..hi]
        .iter()
        .copied()
        .zip(m.values()[lo..hi].iter().copied())
}

impl SysMatrix {
    /// Zero matrix in the requested storage
    pub fn zeros(nrows: usize, ncols: usize, sparse: bool) -> Self {
        if sparse {
            Self::Sparse(CscMatrix::from(&CooMatrix::new(nrows, ncols)))
        } else {
            Self::Dense(DMatrix::zeros(nrows, ncols))
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows(),
            Self::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Self::Dense(m) => m.ncols(),
            Self::Sparse(m) => m.ncols(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse(_))
    }

    /// Densified copy of the matrix
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Self::Dense(m) => m.clone(),
            Self::Sparse(m) => {
                let mut out = DMatrix::zeros(m.nrows(), m.ncols());
                for (i, j, v) in m.triplet_iter() {
                    out[(i, j)] += v;
                }
                out
            }
        }
    }

    /// Matrix product `self * rhs`
    ///
    /// Panics on inner-dimension mismatch; callers validate port sizes before
    /// composing, so a mismatch here is a bookkeeping bug.
    pub fn dot(&self, rhs: &SysMatrix) -> SysMatrix {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "inner dimensions do not match: {:?} * {:?}",
            self.shape(),
            rhs.shape()
        );
        match (self, rhs) {
            (Self::Dense(a), Self::Dense(b)) => Self::Dense(a * b),
            (Self::Sparse(a), Self::Sparse(b)) => {
                let mut coo = CooMatrix::new(a.nrows(), b.ncols());
                for (j, k, bv) in b.triplet_iter() {
                    for (i, av) in csc_col(a, j) {
                        coo.push(i, k, av * bv);
                    }
                }
                Self::Sparse(CscMatrix::from(&coo))
            }
            (Self::Sparse(a), Self::Dense(b)) => {
                let mut out = DMatrix::zeros(a.nrows(), b.ncols());
                for (i, j, av) in a.triplet_iter() {
                    for k in 0..b.ncols() {
                        out[(i, k)] += av * b[(j, k)];
                    }
                }
                Self::Dense(out)
            }
            (Self::Dense(a), Self::Sparse(b)) => {
                let mut out = DMatrix::zeros(a.nrows(), b.ncols());
                for (j, k, bv) in b.triplet_iter() {
                    for i in 0..a.nrows() {
                        out[(i, k)] += a[(i, j)] * bv;
                    }
                }
                Self::Dense(out)
            }
        }
    }

    /// Matrix sum `self + rhs`
    pub fn add(&self, rhs: &SysMatrix) -> SysMatrix {
        assert_eq!(
            self.shape(),
            rhs.shape(),
            "cannot add matrices of different shapes"
        );
        match (self, rhs) {
            (Self::Dense(a), Self::Dense(b)) => Self::Dense(a + b),
            (Self::Sparse(a), Self::Sparse(b)) => {
                let mut coo = CooMatrix::new(a.nrows(), a.ncols());
                for (i, j, v) in a.triplet_iter() {
                    coo.push(i, j, *v);
                }
                for (i, j, v) in b.triplet_iter() {
                    coo.push(i, j, *v);
                }
                Self::Sparse(CscMatrix::from(&coo))
            }
            _ => Self::Dense(self.to_dense() + rhs.to_dense()),
        }
    }

    /// Copy scaled by a scalar
    pub fn scaled(&self, factor: f64) -> SysMatrix {
        match self {
            Self::Dense(m) => Self::Dense(m * factor),
            Self::Sparse(m) => {
                let mut out = m.clone();
                for v in out.values_mut() {
                    *v *= factor;
                }
                Self::Sparse(out)
            }
        }
    }

    /// Multiply row `i` by `scale[i]`, in place
    pub fn scale_rows(&mut self, scale: &[f64]) {
        debug_assert_eq!(scale.len(), self.nrows());
        match self {
            Self::Dense(m) => {
                for i in 0..m.nrows() {
                    for j in 0..m.ncols() {
                        m[(i, j)] *= scale[i];
                    }
                }
            }
            Self::Sparse(m) => {
                for (i, _j, v) in m.triplet_iter_mut() {
                    *v *= scale[i];
                }
            }
        }
    }

    /// Multiply column `j` by `scale[j]`, in place
    pub fn scale_cols(&mut self, scale: &[f64]) {
        debug_assert_eq!(scale.len(), self.ncols());
        match self {
            Self::Dense(m) => {
                for j in 0..m.ncols() {
                    for i in 0..m.nrows() {
                        m[(i, j)] *= scale[j];
                    }
                }
            }
            Self::Sparse(m) => {
                for (_i, j, v) in m.triplet_iter_mut() {
                    *v *= scale[j];
                }
            }
        }
    }

    /// New matrix keeping only the listed rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> SysMatrix {
        match self {
            Self::Dense(m) => {
                let out = DMatrix::from_fn(rows.len(), m.ncols(), |i, j| m[(rows[i], j)]);
                Self::Dense(out)
            }
            Self::Sparse(m) => {
                let mut remap = vec![None; m.nrows()];
                for (new, &old) in rows.iter().enumerate() {
                    remap[old] = Some(new);
                }
                let mut coo = CooMatrix::new(rows.len(), m.ncols());
                for (i, j, v) in m.triplet_iter() {
                    if let Some(new_i) = remap[i] {
                        coo.push(new_i, j, *v);
                    }
                }
                Self::Sparse(CscMatrix::from(&coo))
            }
        }
    }

    /// New matrix keeping only the listed columns, in the given order
    pub fn select_cols(&self, cols: &[usize]) -> SysMatrix {
        match self {
            Self::Dense(m) => {
                let out = DMatrix::from_fn(m.nrows(), cols.len(), |i, j| m[(i, cols[j])]);
                Self::Dense(out)
            }
            Self::Sparse(m) => {
                let mut remap = vec![None; m.ncols()];
                for (new, &old) in cols.iter().enumerate() {
                    remap[old] = Some(new);
                }
                let mut coo = CooMatrix::new(m.nrows(), cols.len());
                for (i, j, v) in m.triplet_iter() {
                    if let Some(new_j) = remap[j] {
                        coo.push(i, new_j, *v);
                    }
                }
                Self::Sparse(CscMatrix::from(&coo))
            }
        }
    }

    /// Horizontal concatenation `[b0 b1 ... bn]`
    pub fn hstack(blocks: &[&SysMatrix]) -> SysMatrix {
        assert!(!blocks.is_empty(), "hstack needs at least one block");
        let nrows = blocks[0].nrows();
        let ncols: usize = blocks.iter().map(|b| b.ncols()).sum();
        for b in blocks {
            assert_eq!(b.nrows(), nrows, "hstack blocks must share a row count");
        }
        if blocks.iter().all(|b| b.is_sparse()) {
            let mut coo = CooMatrix::new(nrows, ncols);
            let mut col0 = 0;
            for b in blocks {
                if let Self::Sparse(m) = b {
                    for (i, j, v) in m.triplet_iter() {
                        coo.push(i, col0 + j, *v);
                    }
                }
                col0 += b.ncols();
            }
            Self::Sparse(CscMatrix::from(&coo))
        } else {
            let mut out = DMatrix::zeros(nrows, ncols);
            let mut col0 = 0;
            for b in blocks {
                out.view_mut((0, col0), (nrows, b.ncols()))
                    .copy_from(&b.to_dense());
                col0 += b.ncols();
            }
            Self::Dense(out)
        }
    }

    /// Vertical concatenation
    pub fn vstack(blocks: &[&SysMatrix]) -> SysMatrix {
        assert!(!blocks.is_empty(), "vstack needs at least one block");
        let ncols = blocks[0].ncols();
        let nrows: usize = blocks.iter().map(|b| b.nrows()).sum();
        for b in blocks {
            assert_eq!(b.ncols(), ncols, "vstack blocks must share a column count");
        }
        if blocks.iter().all(|b| b.is_sparse()) {
            let mut coo = CooMatrix::new(nrows, ncols);
            let mut row0 = 0;
            for b in blocks {
                if let Self::Sparse(m) = b {
                    for (i, j, v) in m.triplet_iter() {
                        coo.push(row0 + i, j, *v);
                    }
                }
                row0 += b.nrows();
            }
            Self::Sparse(CscMatrix::from(&coo))
        } else {
            let mut out = DMatrix::zeros(nrows, ncols);
            let mut row0 = 0;
            for b in blocks {
                out.view_mut((row0, 0), (b.nrows(), ncols))
                    .copy_from(&b.to_dense());
                row0 += b.nrows();
            }
            Self::Dense(out)
        }
    }

    /// Block-diagonal concatenation
    pub fn block_diag(blocks: &[&SysMatrix]) -> SysMatrix {
        assert!(!blocks.is_empty(), "block_diag needs at least one block");
        let nrows: usize = blocks.iter().map(|b| b.nrows()).sum();
        let ncols: usize = blocks.iter().map(|b| b.ncols()).sum();
        if blocks.iter().all(|b| b.is_sparse()) {
            let mut coo = CooMatrix::new(nrows, ncols);
            let (mut row0, mut col0) = (0, 0);
            for b in blocks {
                if let Self::Sparse(m) = b {
                    for (i, j, v) in m.triplet_iter() {
                        coo.push(row0 + i, col0 + j, *v);
                    }
                }
                row0 += b.nrows();
                col0 += b.ncols();
            }
            Self::Sparse(CscMatrix::from(&coo))
        } else {
            let mut out = DMatrix::zeros(nrows, ncols);
            let (mut row0, mut col0) = (0, 0);
            for b in blocks {
                out.view_mut((row0, col0), (b.nrows(), b.ncols()))
                    .copy_from(&b.to_dense());
                row0 += b.nrows();
                col0 += b.ncols();
            }
            Self::Dense(out)
        }
    }

    /// Largest absolute entry-wise difference against another matrix
    pub fn max_abs_diff(&self, other: &SysMatrix) -> f64 {
        assert_eq!(self.shape(), other.shape(), "shape mismatch in comparison");
        let a = self.to_dense();
        let b = other.to_dense();
        let mut err = 0.0f64;
        for (x, y) in a.iter().zip(b.iter()) {
            err = err.max((x - y).abs());
        }
        err
    }
}
