//! Sparse matrix and conjugate gradient solver.
//!
//! A compressed-sparse-row matrix assembled from triplets and a
//! Jacobi-preconditioned conjugate gradient solver for symmetric positive
//! definite systems.

use nalgebra::DVector;

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes row `i` in `col_idx` / `values`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed in the order they were pushed after a
    /// stable sort, so assembly is deterministic.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            match values.last_mut() {
                Some(acc) if last == Some((row, col)) => *acc += val,
                _ => {
                    col_idx.push(col);
                    values.push(val);
                    row_ptr[row + 1] += 1;
                    last = Some((row, col));
                }
            }
        }
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// The diagonal.
    pub fn diagonal(&self) -> DVector<f64> {
        let mut d = DVector::zeros(self.rows.min(self.cols));
        for i in 0..d.len() {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                if self.col_idx[k] == i {
                    d[i] = self.values[k];
                }
            }
        }
        d
    }

    /// `y = A * x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(x.len(), self.cols, "vector dimension mismatch");

        let mut y = DVector::zeros(self.rows);
        for i in 0..self.rows {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            y[i] = sum;
        }
        y
    }
}

/// Result of a conjugate gradient solve.
#[derive(Debug, Clone)]
pub struct CgOutcome {
    /// The best iterate found.
    pub solution: DVector<f64>,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the relative residual dropped below the tolerance.
    pub converged: bool,
}

/// Solve `A x = b` by preconditioned conjugate gradient.
///
/// `A` must be symmetric positive definite. The solve never fails: when the
/// iteration cap is hit, the last iterate is returned with
/// `converged == false`.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> CgOutcome {
    let n = b.len();
    debug_assert_eq!(a.nrows(), n, "matrix-vector dimension mismatch");
    debug_assert_eq!(a.ncols(), n, "matrix must be square");

    let mut x = match x0 {
        Some(x0) => x0.clone(),
        None => DVector::zeros(n),
    };

    let b_norm = b.norm();
    if b_norm == 0.0 {
        return CgOutcome {
            solution: DVector::zeros(n),
            iterations: 0,
            converged: true,
        };
    }

    let inv_diag = a
        .diagonal()
        .map(|d| if d.abs() > f64::MIN_POSITIVE { 1.0 / d } else { 1.0 });

    let mut r = b - a.mul_vec(&x);
    if r.norm() / b_norm < tolerance {
        return CgOutcome {
            solution: x,
            iterations: 0,
            converged: true,
        };
    }

    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for iter in 1..=max_iter {
        let ap = a.mul_vec(&p);
        let p_ap = p.dot(&ap);
        if p_ap <= 0.0 || !p_ap.is_finite() {
            // Breakdown: the current iterate is the best available.
            return CgOutcome {
                solution: x,
                iterations: iter,
                converged: r.norm() / b_norm < tolerance,
            };
        }
        let alpha = rz / p_ap;

        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        if r.norm() / b_norm < tolerance {
            return CgOutcome {
                solution: x,
                iterations: iter,
                converged: true,
            };
        }

        z = r.component_mul(&inv_diag);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz;
        p = &z + beta * &p;
        rz = rz_new;
    }

    CgOutcome {
        solution: x,
        iterations: max_iter,
        converged: false,
    }
}
