use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis, linalg};
use rand::{SeedableRng, rngs::StdRng};

use super::Readout;
use crate::{
    Result,
    arch::{
        activations::ActFn,
        params::{GradViews, ParamViews},
    },
    error::check_size,
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
};

/// A fully connected layer `act(x·W + b)`, used as the classifier head on top of the
/// recurrence.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation applied to the outputs.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self { dim, act_fn }
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f64],
    ) -> Result<(ArrayView2<'a, f64>, ArrayView1<'a, f64>)> {
        let mut views = ParamViews::new(params, self.size())?;
        Ok((views.matrix(self.dim)?, views.vector(self.dim.1)?))
    }

    fn pre_activation(
        &self,
        w: &ArrayView2<f64>,
        b: &ArrayView1<f64>,
        x: &ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        check_size("readout inputs", x.ncols(), self.dim.0)?;

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, x, w, 0.0, &mut z);
        z += b;
        Ok(z)
    }
}

impl Readout for Dense {
    fn nstates(&self) -> usize {
        self.dim.0
    }

    fn nout(&self) -> usize {
        self.dim.1
    }

    fn size(&self) -> usize {
        (self.dim.0 + 1) * self.dim.1
    }

    fn init(&self, seed: u64) -> Result<Vec<f64>> {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let (fan_in, fan_out) = self.dim;

        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(RandParamGen::xavier_uniform(rng, fan_in * fan_out, fan_in, fan_out)?),
            Box::new(ConstParamGen::new(0., fan_out)),
        ];

        ChainedParamGen::new(param_gens).sample_exact(self.size())
    }

    fn apply(&self, params: &[f64], states: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (w, b) = self.view_params(params)?;
        let z = self.pre_activation(&w, &b, &states)?;

        let Some(ref act_fn) = self.act_fn else {
            return Ok(z);
        };

        Ok(z.mapv_into(|z| act_fn.f(z)))
    }

    fn backward(
        &self,
        params: &[f64],
        states: ArrayView2<f64>,
        d_out: ArrayView2<f64>,
        grad: &mut [f64],
    ) -> Result<Array2<f64>> {
        check_size("readout cotangent rows", d_out.nrows(), states.nrows())?;
        check_size("readout cotangent cols", d_out.ncols(), self.dim.1)?;

        let (w, b) = self.view_params(params)?;
        let mut d = d_out.to_owned();

        if let Some(act_fn) = &self.act_fn {
            let z = self.pre_activation(&w, &b, &states)?;
            d.zip_mut_with(&z, |d, &z| *d *= act_fn.df(z));
        }

        let mut grads = GradViews::new(grad, self.size())?;
        let mut dw = grads.matrix(self.dim)?;
        linalg::general_mat_mul(1.0, &states.t(), &d, 1.0, &mut dw);
        let mut db = grads.vector(self.dim.1)?;
        db += &d.sum_axis(Axis(0));

        Ok(d.dot(&w.t()))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    const H: f64 = 1e-6;

    fn params() -> Vec<f64> {
        // w = [[1, -1, 0.5], [2, 0, -0.5]], b = [0.1, 0.2, 0.3]
        vec![1., -1., 0.5, 2., 0., -0.5, 0.1, 0.2, 0.3]
    }

    #[test]
    fn forward() {
        let dense = Dense::new((2, 3), None);
        let x = array![[1., 1.], [0., 2.]];

        let y = dense.apply(&params(), x.view()).unwrap();

        let expected = array![[3.1, -0.8, 0.3], [4.1, 0.2, -0.7]];
        assert!((y - expected).iter().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let dense = Dense::new((2, 3), None);
        let x = array![[1., 1., 1.]];

        assert!(dense.apply(&params(), x.view()).is_err());
    }

    #[test]
    fn backward_matches_finite_differences() {
        let dense = Dense::new((2, 3), Some(ActFn::tanh()));
        let params = params();
        let x = array![[0.3, -0.1], [0.2, 0.4]];
        let d_out = array![[1., 0.5, -1.], [0.2, -0.3, 0.7]];

        let mut grad = vec![0.; dense.size()];
        let dx = dense
            .backward(&params, x.view(), d_out.view(), &mut grad)
            .unwrap();

        let project = |p: &[f64], x: &Array2<f64>| -> f64 {
            (dense.apply(p, x.view()).unwrap() * &d_out).sum()
        };

        for k in 0..params.len() {
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[k] += H;
            minus[k] -= H;
            let expected = (project(&plus, &x) - project(&minus, &x)) / (2. * H);
            assert!((grad[k] - expected).abs() < 1e-6, "param {k}");
        }

        for ((i, j), &got) in dx.indexed_iter() {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[[i, j]] += H;
            minus[[i, j]] -= H;
            let expected = (project(&params, &plus) - project(&params, &minus)) / (2. * H);
            assert!((got - expected).abs() < 1e-6, "input ({i}, {j})");
        }
    }

    #[test]
    fn init_has_zero_biases() {
        let dense = Dense::new((4, 3), None);
        let params = dense.init(1).unwrap();

        assert_eq!(params.len(), dense.size());
        assert!(params[12..].iter().all(|&b| b == 0.));

        // glorot bound for a 4 -> 3 kernel
        let bound = (6f64 / 7.).sqrt();
        assert!(params[..12].iter().all(|w| w.abs() < bound));
    }
}
