use std::mem;

use ndarray::{
    Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg,
};

use crate::{MlErr, Result, error::check_size};

/// Cuts consecutive weight matrices and bias vectors out of a flat parameter slice.
pub(crate) struct ParamViews<'a> {
    rest: &'a [f64],
}

impl<'a> ParamViews<'a> {
    /// Creates a new `ParamViews`.
    ///
    /// # Arguments
    /// * `params` - The flat parameter slice.
    /// * `expected` - The amount of parameters the owner of the slice expects.
    ///
    /// # Returns
    /// An error if the slice doesn't have exactly `expected` parameters.
    pub fn new(params: &'a [f64], expected: usize) -> Result<Self> {
        check_size("params", params.len(), expected)?;
        Ok(Self { rest: params })
    }

    fn take(&mut self, n: usize) -> Result<&'a [f64]> {
        if n > self.rest.len() {
            return Err(MlErr::SizeMismatch {
                what: "param block",
                got: self.rest.len(),
                expected: n,
            });
        }

        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    pub fn matrix(&mut self, dim: (usize, usize)) -> Result<ArrayView2<'a, f64>> {
        let raw = self.take(dim.0 * dim.1)?;
        Ok(ArrayView2::from_shape(dim, raw)?)
    }

    pub fn vector(&mut self, len: usize) -> Result<ArrayView1<'a, f64>> {
        let raw = self.take(len)?;
        Ok(ArrayView1::from_shape(len, raw)?)
    }
}

/// The mutable counterpart of `ParamViews`, used to accumulate gradients.
pub(crate) struct GradViews<'a> {
    rest: &'a mut [f64],
}

impl<'a> GradViews<'a> {
    pub fn new(grad: &'a mut [f64], expected: usize) -> Result<Self> {
        check_size("grad", grad.len(), expected)?;
        Ok(Self { rest: grad })
    }

    fn take(&mut self, n: usize) -> Result<&'a mut [f64]> {
        let rest = mem::take(&mut self.rest);

        if n > rest.len() {
            return Err(MlErr::SizeMismatch {
                what: "grad block",
                got: rest.len(),
                expected: n,
            });
        }

        let (head, tail) = rest.split_at_mut(n);
        self.rest = tail;
        Ok(head)
    }

    pub fn matrix(&mut self, dim: (usize, usize)) -> Result<ArrayViewMut2<'a, f64>> {
        let raw = self.take(dim.0 * dim.1)?;
        Ok(ArrayViewMut2::from_shape(dim, raw)?)
    }

    pub fn vector(&mut self, len: usize) -> Result<ArrayViewMut1<'a, f64>> {
        let raw = self.take(len)?;
        Ok(ArrayViewMut1::from_shape(len, raw)?)
    }
}

/// Accumulates the outer product `a ⊗ b` into `acc`.
pub(crate) fn add_outer(acc: &mut ArrayViewMut2<f64>, a: ArrayView1<f64>, b: ArrayView1<f64>) {
    let a = a.insert_axis(Axis(1));
    let b = b.insert_axis(Axis(0));
    linalg::general_mat_mul(1.0, &a, &b, 1.0, acc);
}

/// Scales row `i` of `m` by `d[i]`, that is, computes `diag(d) · m`.
pub(crate) fn scale_rows(m: ArrayView2<f64>, d: &Array1<f64>) -> Array2<f64> {
    &m * &d.view().insert_axis(Axis(1))
}
