use std::{cell::RefCell, rc::Rc};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result,
    arch::{
        StepFunction,
        params::{GradViews, ParamViews, add_outer, scale_rows},
    },
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
};

/// A gated recurrent unit.
///
/// ```text
/// r  = σ(x·W_ir + h·W_hr + b_r)
/// z  = σ(x·W_iz + h·W_hz + b_z)
/// n  = tanh(x·W_in + b_in + r ⊙ (h·W_hn + b_hn))
/// h' = (1 - z) ⊙ n + z ⊙ h
/// ```
///
/// Parameters are laid out as the three input kernels `W_ir, W_iz, W_in (ninputs, nstates)`,
/// the three recurrent kernels `W_hr, W_hz, W_hn (nstates, nstates)` and the biases
/// `b_r, b_z, b_in, b_hn (nstates)`.
#[derive(Debug, Clone)]
pub struct Gru {
    nstates: usize,
    ninputs: usize,
}

struct Weights<'a> {
    w_ir: ArrayView2<'a, f64>,
    w_iz: ArrayView2<'a, f64>,
    w_in: ArrayView2<'a, f64>,
    w_hr: ArrayView2<'a, f64>,
    w_hz: ArrayView2<'a, f64>,
    w_hn: ArrayView2<'a, f64>,
    b_r: ArrayView1<'a, f64>,
    b_z: ArrayView1<'a, f64>,
    b_in: ArrayView1<'a, f64>,
    b_hn: ArrayView1<'a, f64>,
}

/// Forward intermediates shared by the output, the Jacobian and the vjp.
struct Gates {
    r: Array1<f64>,
    z: Array1<f64>,
    n: Array1<f64>,
    /// `h·W_hn + b_hn`, before being gated by `r`.
    g: Array1<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1. / (1. + (-x).exp())
}

impl Gru {
    pub fn new(nstates: usize, ninputs: usize) -> Self {
        Self { nstates, ninputs }
    }

    fn dims(&self) -> ((usize, usize), (usize, usize)) {
        (
            (self.ninputs, self.nstates),
            (self.nstates, self.nstates),
        )
    }

    fn weights<'a>(&self, params: &'a [f64]) -> Result<Weights<'a>> {
        let (i_dim, h_dim) = self.dims();
        let mut views = ParamViews::new(params, self.size())?;

        Ok(Weights {
            w_ir: views.matrix(i_dim)?,
            w_iz: views.matrix(i_dim)?,
            w_in: views.matrix(i_dim)?,
            w_hr: views.matrix(h_dim)?,
            w_hz: views.matrix(h_dim)?,
            w_hn: views.matrix(h_dim)?,
            b_r: views.vector(self.nstates)?,
            b_z: views.vector(self.nstates)?,
            b_in: views.vector(self.nstates)?,
            b_hn: views.vector(self.nstates)?,
        })
    }

    fn gates(&self, w: &Weights, h: ArrayView1<f64>, x: ArrayView1<f64>) -> Gates {
        let r = (x.dot(&w.w_ir) + h.dot(&w.w_hr) + &w.b_r).mapv_into(sigmoid);
        let z = (x.dot(&w.w_iz) + h.dot(&w.w_hz) + &w.b_z).mapv_into(sigmoid);
        let g = h.dot(&w.w_hn) + &w.b_hn;
        let n = (x.dot(&w.w_in) + &w.b_in + &r * &g).mapv_into(f64::tanh);

        Gates { r, z, n, g }
    }

    fn output(gates: &Gates, h: ArrayView1<f64>) -> Array1<f64> {
        let Gates { z, n, .. } = gates;
        (1. - z) * n + z * &h
    }
}

impl StepFunction for Gru {
    fn nstates(&self) -> usize {
        self.nstates
    }

    fn ninputs(&self) -> usize {
        self.ninputs
    }

    fn size(&self) -> usize {
        3 * self.ninputs * self.nstates + 3 * self.nstates * self.nstates + 4 * self.nstates
    }

    fn init(&self, seed: u64) -> Result<Vec<f64>> {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let (n, m) = (self.nstates, self.ninputs);

        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(RandParamGen::lecun(rng.clone(), 3 * m * n, m)?),
            Box::new(RandParamGen::lecun(rng, 3 * n * n, n)?),
            Box::new(ConstParamGen::new(0., 4 * n)),
        ];

        ChainedParamGen::new(param_gens).sample_exact(self.size())
    }

    fn apply(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        let w = self.weights(params)?;
        let gates = self.gates(&w, state, input);
        Ok(Self::output(&gates, state))
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
        let w = self.weights(params)?;
        let gates = self.gates(&w, state, input);
        let Gates { r, z, n, g } = &gates;

        // ∂h'/∂h = diag(z) + diag(c_r) W_hrᵀ + diag(c_n) W_hnᵀ + diag(c_z) W_hzᵀ
        let dn = (1. - z) * &n.mapv(|n| 1. - n * n);
        let c_r = &dn * &(r * &(1. - r)) * g;
        let c_n = &dn * r;
        let c_z = (&state - n) * &(z * &(1. - z));

        let mut jac = Array2::from_diag(z);
        jac += &scale_rows(w.w_hr.t(), &c_r);
        jac += &scale_rows(w.w_hn.t(), &c_n);
        jac += &scale_rows(w.w_hz.t(), &c_z);

        Ok((Self::output(&gates, state), jac))
    }

    fn vjp(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
        cotangent: ArrayView1<f64>,
        grad: &mut [f64],
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let w = self.weights(params)?;
        let Gates { r, z, n, g } = self.gates(&w, state, input);

        let d_an = &cotangent * &(1. - &z) * &n.mapv(|n| 1. - n * n);
        let d_ar = &d_an * &g * &(&r * &(1. - &r));
        let d_az = &cotangent * &(&state - &n) * &(&z * &(1. - &z));
        let d_g = &d_an * &r;

        let (i_dim, h_dim) = self.dims();
        let mut grads = GradViews::new(grad, self.size())?;
        add_outer(&mut grads.matrix(i_dim)?, input, d_ar.view());
        add_outer(&mut grads.matrix(i_dim)?, input, d_az.view());
        add_outer(&mut grads.matrix(i_dim)?, input, d_an.view());
        add_outer(&mut grads.matrix(h_dim)?, state, d_ar.view());
        add_outer(&mut grads.matrix(h_dim)?, state, d_az.view());
        add_outer(&mut grads.matrix(h_dim)?, state, d_g.view());
        for d in [&d_ar, &d_az, &d_an, &d_g] {
            let mut db = grads.vector(self.nstates)?;
            db += d;
        }

        let d_state = &cotangent * &z + w.w_hr.dot(&d_ar) + w.w_hz.dot(&d_az) + w.w_hn.dot(&d_g);
        let d_input = w.w_ir.dot(&d_ar) + w.w_iz.dot(&d_az) + w.w_in.dot(&d_an);

        Ok((d_state, d_input))
    }
}
