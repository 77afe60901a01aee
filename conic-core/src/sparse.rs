//! Sparse matrix helpers in CSC (Compressed Sparse Column) format.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed. An empty triplet list yields an all-zero
/// matrix of the requested shape.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let mat = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 0, 2.0), (1, 1, 4.0)]);

        assert_eq!(mat.rows(), 2);
        assert_eq!(mat.cols(), 2);

        let mut y = vec![0.0; 2];
        spmv(&mat, &[1.0, 1.0], &mut y, 1.0, 0.0);
        assert!((y[0] - 3.0).abs() < 1e-12);
        assert!((y[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_spmv_accumulate() {
        // [[1, 2], [3, 4]]
        let mat = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)]);
        let mut y = vec![1.0, 1.0];

        spmv(&mat, &[1.0, 2.0], &mut y, 2.0, 1.0);

        // y = 2 * [5, 11] + [1, 1]
        assert!((y[0] - 11.0).abs() < 1e-12);
        assert!((y[1] - 23.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_triplets() {
        let mat = from_triplets(3, 2, Vec::new());
        assert_eq!(mat.rows(), 3);
        assert_eq!(mat.cols(), 2);
        assert_eq!(mat.nnz(), 0);
    }
}
