//! Parallel solver for affine recurrences `y_i = A_i·y_{i-1} + b_i`.
//!
//! Affine maps compose associatively, `(A2, b2) ∘ (A1, b1) = (A2·A1, A2·b1 + b2)`, so the
//! sequence is cut in chunks that are reduced in parallel, the chunk boundaries are
//! resolved in a short sequential sweep and every chunk is then expanded in parallel.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::{Result, error::check_size};

/// An affine map `y -> a·y + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    pub a: Array2<f64>,
    pub b: Array1<f64>,
}

impl Affine {
    pub fn identity(n: usize) -> Self {
        Self {
            a: Array2::eye(n),
            b: Array1::zeros(n),
        }
    }

    /// Returns the map that applies `self` first and `(a, b)` afterwards.
    pub fn then(&self, a: ArrayView2<f64>, b: ArrayView1<f64>) -> Self {
        Self {
            a: a.dot(&self.a),
            b: a.dot(&self.b) + b,
        }
    }

    pub fn apply(&self, y: ArrayView1<f64>) -> Array1<f64> {
        self.a.dot(&y) + &self.b
    }
}

/// Solves `y_i = mats[i]·y_{i-1} + rhs[i]` with `y_{-1} = y0`, splitting the work across
/// the threads of the current rayon pool.
///
/// # Arguments
/// * `mats` - The `(nseq, n, n)` transition matrices.
/// * `rhs` - The `(nseq, n)` offsets.
/// * `y0` - The state before the first position.
///
/// # Returns
/// The `(nseq, n)` solution, or an error if the shapes disagree.
pub fn solve_affine(
    mats: ArrayView3<f64>,
    rhs: ArrayView2<f64>,
    y0: ArrayView1<f64>,
) -> Result<Array2<f64>> {
    let threads = rayon::current_num_threads().max(1);
    let chunk_len = rhs.nrows().div_ceil(threads);
    solve_affine_chunked(mats, rhs, y0, chunk_len)
}

/// Same as `solve_affine` but with an explicit chunk length.
pub fn solve_affine_chunked(
    mats: ArrayView3<f64>,
    rhs: ArrayView2<f64>,
    y0: ArrayView1<f64>,
    chunk_len: usize,
) -> Result<Array2<f64>> {
    let (nseq, n) = rhs.dim();
    check_size("state width", y0.len(), n)?;
    check_size("scan matrices", mats.len_of(Axis(0)), nseq)?;
    check_size("scan matrix rows", mats.len_of(Axis(1)), n)?;
    check_size("scan matrix cols", mats.len_of(Axis(2)), n)?;

    let mut out = Array2::zeros((nseq, n));
    if nseq == 0 {
        return Ok(out);
    }

    let chunk_len = chunk_len.max(1);

    let summaries: Vec<Affine> = mats
        .axis_chunks_iter(Axis(0), chunk_len)
        .into_par_iter()
        .zip(rhs.axis_chunks_iter(Axis(0), chunk_len).into_par_iter())
        .map(|(a, b)| {
            a.outer_iter()
                .zip(b.outer_iter())
                .fold(Affine::identity(n), |acc, (a, b)| acc.then(a, b))
        })
        .collect();

    let mut starts = Vec::with_capacity(summaries.len());
    let mut carry = y0.to_owned();
    for summary in &summaries {
        let next = summary.apply(carry.view());
        starts.push(carry);
        carry = next;
    }

    out.axis_chunks_iter_mut(Axis(0), chunk_len)
        .into_par_iter()
        .zip(mats.axis_chunks_iter(Axis(0), chunk_len).into_par_iter())
        .zip(rhs.axis_chunks_iter(Axis(0), chunk_len).into_par_iter())
        .zip(starts.into_par_iter())
        .for_each(|(((mut out, a), b), mut y)| {
            for ((mut row, a), b) in out.outer_iter_mut().zip(a.outer_iter()).zip(b.outer_iter()) {
                y = a.dot(&y) + b;
                row.assign(&y);
            }
        });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn sequential(mats: &Array3<f64>, rhs: &Array2<f64>, y0: &Array1<f64>) -> Array2<f64> {
        let mut out = Array2::zeros(rhs.dim());
        let mut y = y0.clone();

        for i in 0..rhs.nrows() {
            y = mats.index_axis(Axis(0), i).dot(&y) + rhs.row(i);
            out.row_mut(i).assign(&y);
        }

        out
    }

    fn random_problem(nseq: usize, n: usize) -> (Array3<f64>, Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(3);
        let mats = Array3::from_shape_fn((nseq, n, n), |_| rng.random_range(-0.6..0.6));
        let rhs = Array2::from_shape_fn((nseq, n), |_| rng.random_range(-1.0..1.0));
        let y0 = Array1::from_shape_fn(n, |_| rng.random_range(-1.0..1.0));
        (mats, rhs, y0)
    }

    #[test]
    fn matches_sequential_for_every_chunking() {
        let (mats, rhs, y0) = random_problem(7, 3);
        let expected = sequential(&mats, &rhs, &y0);

        for chunk_len in [1, 2, 3, 7, 100] {
            let got = solve_affine_chunked(mats.view(), rhs.view(), y0.view(), chunk_len).unwrap();
            let err = (&got - &expected).mapv(f64::abs).fold(0., |m: f64, &x| m.max(x));
            assert!(err < 1e-12, "chunk_len {chunk_len}: {err}");
        }

        let got = solve_affine(mats.view(), rhs.view(), y0.view()).unwrap();
        let err = (&got - &expected).mapv(f64::abs).fold(0., |m: f64, &x| m.max(x));
        assert!(err < 1e-12);
    }

    #[test]
    fn scalar_leaky_integrator() {
        let mats = Array3::from_elem((4, 1, 1), 0.5);
        let rhs = Array2::from_elem((4, 1), 0.5);
        let y0 = array![0.];

        let got = solve_affine_chunked(mats.view(), rhs.view(), y0.view(), 3).unwrap();

        assert_eq!(got, array![[0.5], [0.75], [0.875], [0.9375]]);
    }

    #[test]
    fn composition_applies_first_map_first() {
        let first = Affine::identity(1).then(array![[2.]].view(), array![1.].view());
        let both = first.then(array![[3.]].view(), array![-1.].view());

        // 3 * (2y + 1) - 1
        assert_eq!(both.apply(array![1.].view()), array![8.]);
    }

    #[test]
    fn empty_sequence() {
        let mats = Array3::zeros((0, 2, 2));
        let rhs = Array2::zeros((0, 2));
        let y0 = array![1., 2.];

        let got = solve_affine(mats.view(), rhs.view(), y0.view()).unwrap();
        assert_eq!(got.dim(), (0, 2));
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let (mats, rhs, _) = random_problem(4, 2);
        let y0 = array![0., 0., 0.];

        assert!(solve_affine(mats.view(), rhs.view(), y0.view()).is_err());
    }
}
