use std::{cell::RefCell, rc::Rc};

use ndarray::{Array1, Array2, ArrayView1};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    arch::{
        StepFunction,
        params::{GradViews, ParamViews, add_outer},
    },
    error::check_size,
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
};

/// An affine recurrence `s' = s·A + x·B + c`.
///
/// Parameters are laid out as `A (nstates, nstates)`, `B (ninputs, nstates)` and
/// `c (nstates)`.
#[derive(Debug, Clone)]
pub struct Linear {
    nstates: usize,
    ninputs: usize,
}

impl Linear {
    pub fn new(nstates: usize, ninputs: usize) -> Self {
        Self { nstates, ninputs }
    }

    /// Builds the parameter slice of a leaky integrator `s' = decay * s + (1 - decay) * x`.
    /// Requires `ninputs == nstates`.
    pub fn leaky_params(&self, decay: f64) -> Result<Vec<f64>> {
        check_size("leaky integrator inputs", self.ninputs, self.nstates)?;

        let n = self.nstates;
        let a = Array2::<f64>::eye(n) * decay;
        let b = Array2::<f64>::eye(n) * (1. - decay);

        let mut params = Vec::with_capacity(self.size());
        params.extend(a.iter());
        params.extend(b.iter());
        params.extend(std::iter::repeat_n(0., n));
        Ok(params)
    }

    fn dims(&self) -> ((usize, usize), (usize, usize)) {
        (
            (self.nstates, self.nstates),
            (self.ninputs, self.nstates),
        )
    }
}

impl StepFunction for Linear {
    fn nstates(&self) -> usize {
        self.nstates
    }

    fn ninputs(&self) -> usize {
        self.ninputs
    }

    fn size(&self) -> usize {
        (self.nstates + self.ninputs + 1) * self.nstates
    }

    fn init(&self, seed: u64) -> Result<Vec<f64>> {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let (a_dim, b_dim) = self.dims();

        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(RandParamGen::lecun(rng.clone(), a_dim.0 * a_dim.1, a_dim.0)?),
            Box::new(RandParamGen::lecun(rng, b_dim.0 * b_dim.1, b_dim.0)?),
            Box::new(ConstParamGen::new(0., self.nstates)),
        ];

        ChainedParamGen::new(param_gens).sample_exact(self.size())
    }

    fn apply(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        let (a_dim, b_dim) = self.dims();
        let mut views = ParamViews::new(params, self.size())?;
        let a = views.matrix(a_dim)?;
        let b = views.matrix(b_dim)?;
        let c = views.vector(self.nstates)?;

        Ok(state.dot(&a) + input.dot(&b) + &c)
    }

    fn jacobian(
        &self,
        params: &[f64],
        _state: ArrayView1<f64>,
        _input: ArrayView1<f64>,
    ) -> Result<Array2<f64>> {
        let mut views = ParamViews::new(params, self.size())?;
        let a = views.matrix(self.dims().0)?;
        Ok(a.t().to_owned())
    }

    fn vjp(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
        cotangent: ArrayView1<f64>,
        grad: &mut [f64],
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let (a_dim, b_dim) = self.dims();
        let mut views = ParamViews::new(params, self.size())?;
        let a = views.matrix(a_dim)?;
        let b = views.matrix(b_dim)?;

        let mut grads = GradViews::new(grad, self.size())?;
        add_outer(&mut grads.matrix(a_dim)?, state, cotangent);
        add_outer(&mut grads.matrix(b_dim)?, input, cotangent);
        let mut dc = grads.vector(self.nstates)?;
        dc += &cotangent;

        Ok((a.dot(&cotangent), b.dot(&cotangent)))
    }
}
