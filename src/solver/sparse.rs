//! Sparse storage: triplet assembly and compressed-column form.
//!
//! Stamps are first collected as `(row, col, value)` triplets; duplicates are
//! allowed and summed when the triplets are compressed. The compressed-column
//! matrix is what the sparse factorizations and the Krylov solvers read.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SpicyError};

/// Growable triplet list.
#[derive(Debug, Clone)]
pub struct TripletMatrix {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    /// Create an empty triplet list with room for a single entry.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: Vec::with_capacity(1),
            cols: Vec::with_capacity(1),
            values: Vec::with_capacity(1),
        }
    }

    /// Grow the storage by exactly `additional` entries beyond the current length.
    ///
    /// Capacity never shrinks.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let requested = self.rows.len().saturating_add(additional);
        let oom = |_| SpicyError::OutOfMemory {
            what: "triplet matrix",
            requested,
        };
        self.rows.try_reserve_exact(additional).map_err(oom)?;
        self.cols.try_reserve_exact(additional).map_err(oom)?;
        self.values.try_reserve_exact(additional).map_err(oom)?;
        Ok(())
    }

    /// Append one entry.
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.nrows && col < self.ncols, "triplet ({row}, {col}) out of bounds");
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    /// Number of stored entries (duplicates counted).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Allocated entry slots.
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Iterate over the raw entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Convert to compressed-column form, summing duplicate entries.
    ///
    /// The triplet buffers are released.
    pub fn compress(self) -> CscMatrix {
        let nnz = self.len();

        let mut col_ptr = vec![0usize; self.ncols + 1];
        for &c in &self.cols {
            col_ptr[c + 1] += 1;
        }
        for j in 0..self.ncols {
            col_ptr[j + 1] += col_ptr[j];
        }

        let mut next = col_ptr.clone();
        let mut row_idx = vec![0usize; nnz];
        let mut values = vec![0.0; nnz];
        for ((r, c), v) in self.rows.into_iter().zip(self.cols).zip(self.values) {
            let p = next[c];
            next[c] += 1;
            row_idx[p] = r;
            values[p] = v;
        }

        // Sort each column by row and fold duplicates.
        let mut out_ptr = Vec::with_capacity(self.ncols + 1);
        let mut out_rows = Vec::with_capacity(nnz);
        let mut out_vals = Vec::with_capacity(nnz);
        let mut column: Vec<(usize, f64)> = Vec::new();
        out_ptr.push(0);
        for j in 0..self.ncols {
            column.clear();
            column.extend((col_ptr[j]..col_ptr[j + 1]).map(|p| (row_idx[p], values[p])));
            column.sort_unstable_by_key(|&(r, _)| r);
            for &(r, v) in &column {
                match out_rows.last() {
                    Some(&last) if last == r && out_rows.len() > out_ptr[j] => {
                        if let Some(acc) = out_vals.last_mut() {
                            *acc += v;
                        }
                    }
                    _ => {
                        out_rows.push(r);
                        out_vals.push(v);
                    }
                }
            }
            out_ptr.push(out_rows.len());
        }

        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            col_ptr: out_ptr,
            row_idx: out_rows,
            values: out_vals,
        }
    }
}

/// Compressed-column matrix with sorted, unique row indices per column.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CscMatrix {
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.row_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Entries of column `j` as `(row, value)`.
    pub fn column(&self, j: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.col_ptr[j]..self.col_ptr[j + 1];
        self.row_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Value at `(row, col)`, zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.col_ptr[col]..self.col_ptr[col + 1];
        match self.row_idx[range.clone()].binary_search(&row) {
            Ok(offset) => self.values[range.start + offset],
            Err(_) => 0.0,
        }
    }

    /// Main diagonal.
    pub fn diagonal(&self) -> DVector<f64> {
        DVector::from_fn(self.nrows.min(self.ncols), |i, _| self.get(i, i))
    }

    /// `y = A x`
    pub fn mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        y.fill(0.0);
        for j in 0..self.ncols {
            let xj = x[j];
            if xj == 0.0 {
                continue;
            }
            for (i, a) in self.column(j) {
                y[i] += a * xj;
            }
        }
    }

    /// `y = Aᵀ x`
    pub fn tr_mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        for j in 0..self.ncols {
            y[j] = self.column(j).map(|(i, a)| a * x[i]).sum();
        }
    }

    /// Dense copy, for inspection and tests.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for j in 0..self.ncols {
            for (i, a) in self.column(j) {
                dense[(i, j)] += a;
            }
        }
        dense
    }

    /// Hand the structure over to `nalgebra-sparse`.
    pub fn to_nalgebra(&self) -> Result<nalgebra_sparse::CscMatrix<f64>> {
        nalgebra_sparse::CscMatrix::try_from_csc_data(
            self.nrows,
            self.ncols,
            self.col_ptr.clone(),
            self.row_idx.clone(),
            self.values.clone(),
        )
        .map_err(|e| SpicyError::SparseFormat {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> CscMatrix {
        // [ 4 -1  0 ]
        // [-1  4 -1 ]
        // [ 0 -1  3 ]
        let mut t = TripletMatrix::new(3, 3);
        t.reserve(9).unwrap();
        for (r, c, v) in [
            (0, 0, 3.0),
            (1, 0, -1.0),
            (0, 1, -1.0),
            (1, 1, 4.0),
            (2, 1, -1.0),
            (1, 2, -1.0),
            (2, 2, 3.0),
            (0, 0, 1.0),
        ] {
            t.push(r, c, v);
        }
        t.compress()
    }

    #[test]
    fn test_reserve_grows_exactly() {
        let mut t = TripletMatrix::new(4, 4);
        assert_eq!(t.capacity(), 1);
        t.push(0, 0, 1.0);
        t.reserve(4).unwrap();
        assert!(t.capacity() >= 5);
        for k in 0..4 {
            t.push(k, k, 1.0);
        }
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn test_reserve_failure_is_out_of_memory() {
        let mut t = TripletMatrix::new(2, 2);
        t.push(0, 0, 1.0);
        let err = t.reserve(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            SpicyError::OutOfMemory {
                what: "triplet matrix",
                requested: usize::MAX,
            }
        ));
        // Nothing was lost
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_compress_sums_duplicates() {
        let a = sample();
        assert_eq!(a.nnz(), 7);
        assert_eq!(a.get(0, 0), 4.0);
        assert_eq!(a.get(0, 2), 0.0);
        assert_eq!(a.col_ptr(), &[0, 2, 5, 7]);
        for j in 0..3 {
            let rows: Vec<usize> = a.column(j).map(|(r, _)| r).collect();
            let mut sorted = rows.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(rows, sorted);
        }
    }

    #[test]
    fn test_empty_columns() {
        let mut t = TripletMatrix::new(3, 3);
        t.push(2, 2, 5.0);
        t.push(2, 2, -5.0);
        let a = t.compress();
        assert_eq!(a.col_ptr(), &[0, 0, 0, 1]);
        assert_eq!(a.get(2, 2), 0.0);
        assert_eq!(a.diagonal(), DVector::from_vec(vec![0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_products_match_dense() {
        let a = sample();
        let dense = a.to_dense();
        let x = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let mut y = DVector::zeros(3);

        a.mul_vec_into(&x, &mut y);
        assert_relative_eq!(y, &dense * &x, epsilon = 1e-12);

        a.tr_mul_vec_into(&x, &mut y);
        assert_relative_eq!(y, dense.transpose() * &x, epsilon = 1e-12);
    }

    #[test]
    fn test_to_nalgebra() {
        let a = sample();
        let na = a.to_nalgebra().unwrap();
        assert_eq!(na.nnz(), 7);
        assert_eq!(na.nrows(), 3);
    }
}
