use std::{cell::RefCell, rc::Rc};

use ndarray::{Array1, Array2, ArrayView1};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    arch::{
        StepFunction,
        activations::ActFn,
        params::{GradViews, ParamViews, add_outer, scale_rows},
    },
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
};

/// A dense recurrent cell `s' = act(s·W + x·U + b)`.
///
/// Parameters are laid out as `W (nstates, nstates)`, `U (ninputs, nstates)` and
/// `b (nstates)`.
#[derive(Debug, Clone)]
pub struct Elman {
    nstates: usize,
    ninputs: usize,
    act_fn: ActFn,
}

impl Elman {
    pub fn new(nstates: usize, ninputs: usize, act_fn: ActFn) -> Self {
        Self {
            nstates,
            ninputs,
            act_fn,
        }
    }

    fn dims(&self) -> ((usize, usize), (usize, usize)) {
        (
            (self.nstates, self.nstates),
            (self.ninputs, self.nstates),
        )
    }

    /// Computes the pre-activation `s·W + x·U + b`.
    fn pre_activation(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        let (w_dim, u_dim) = self.dims();
        let mut views = ParamViews::new(params, self.size())?;
        let w = views.matrix(w_dim)?;
        let u = views.matrix(u_dim)?;
        let b = views.vector(self.nstates)?;

        Ok(state.dot(&w) + input.dot(&u) + &b)
    }
}

impl StepFunction for Elman {
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
        let (w_dim, u_dim) = self.dims();

        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(RandParamGen::lecun(rng.clone(), w_dim.0 * w_dim.1, w_dim.0)?),
            Box::new(RandParamGen::lecun(rng, u_dim.0 * u_dim.1, u_dim.0)?),
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
        let z = self.pre_activation(params, state, input)?;
        Ok(z.mapv_into(|z| self.act_fn.f(z)))
    }

    fn jacobian(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array2<f64>> {
        self.linearize(params, state, input).map(|(_, jac)| jac)
    }

    fn linearize(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let z = self.pre_activation(params, state, input)?;
        let dz = z.mapv(|z| self.act_fn.df(z));
        let next = z.mapv_into(|z| self.act_fn.f(z));

        let w = ParamViews::new(params, self.size())?.matrix(self.dims().0)?;
        Ok((next, scale_rows(w.t(), &dz)))
    }

    fn vjp(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
        cotangent: ArrayView1<f64>,
        grad: &mut [f64],
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let (w_dim, u_dim) = self.dims();
        let z = self.pre_activation(params, state, input)?;
        let dz = &cotangent * &z.mapv(|z| self.act_fn.df(z));

        let mut views = ParamViews::new(params, self.size())?;
        let w = views.matrix(w_dim)?;
        let u = views.matrix(u_dim)?;

        let mut grads = GradViews::new(grad, self.size())?;
        add_outer(&mut grads.matrix(w_dim)?, state, dz.view());
        add_outer(&mut grads.matrix(u_dim)?, input, dz.view());
        let mut db = grads.vector(self.nstates)?;
        db += &dz;

        Ok((w.dot(&dz), u.dot(&dz)))
    }
}
