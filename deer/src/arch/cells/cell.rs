use ndarray::{Array1, Array2, ArrayView1};

use super::{Elman, Gru, Linear};
use crate::{Result, arch::StepFunction};

/// The recurrent cells available to the solver.
#[derive(Debug, Clone)]
pub enum Cell {
    Linear(Linear),
    Elman(Elman),
    Gru(Gru),
}

impl StepFunction for Cell {
    fn nstates(&self) -> usize {
        match self {
            Self::Linear(c) => c.nstates(),
            Self::Elman(c) => c.nstates(),
            Self::Gru(c) => c.nstates(),
        }
    }

    fn ninputs(&self) -> usize {
        match self {
            Self::Linear(c) => c.ninputs(),
            Self::Elman(c) => c.ninputs(),
            Self::Gru(c) => c.ninputs(),
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Linear(c) => c.size(),
            Self::Elman(c) => c.size(),
            Self::Gru(c) => c.size(),
        }
    }

    fn init(&self, seed: u64) -> Result<Vec<f64>> {
        match self {
            Self::Linear(c) => c.init(seed),
            Self::Elman(c) => c.init(seed),
            Self::Gru(c) => c.init(seed),
        }
    }

    fn apply(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        match self {
            Self::Linear(c) => c.apply(params, state, input),
            Self::Elman(c) => c.apply(params, state, input),
            Self::Gru(c) => c.apply(params, state, input),
        }
    }

    fn jacobian(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array2<f64>> {
        match self {
            Self::Linear(c) => c.jacobian(params, state, input),
            Self::Elman(c) => c.jacobian(params, state, input),
            Self::Gru(c) => c.jacobian(params, state, input),
        }
    }

    fn linearize(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        match self {
            Self::Linear(c) => c.linearize(params, state, input),
            Self::Elman(c) => c.linearize(params, state, input),
            Self::Gru(c) => c.linearize(params, state, input),
        }
    }

    fn vjp(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
        cotangent: ArrayView1<f64>,
        grad: &mut [f64],
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        match self {
            Self::Linear(c) => c.vjp(params, state, input, cotangent, grad),
            Self::Elman(c) => c.vjp(params, state, input, cotangent, grad),
            Self::Gru(c) => c.vjp(params, state, input, cotangent, grad),
        }
    }
}
