use super::{Sigmoid, Tanh};

/// An elementwise activation function and its derivative.
#[derive(Debug, Clone)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Tanh(Tanh),
}
impl ActFn {
    pub fn sigmoid(amp: f64) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh)
    }

    pub fn f(&self, x: f64) -> f64 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f64) -> f64 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central_diff(act_fn: &ActFn, x: f64) -> f64 {
        let h = 1e-6;
        (act_fn.f(x + h) - act_fn.f(x - h)) / (2. * h)
    }

    #[test]
    fn derivatives_match_finite_differences() {
        for act_fn in [ActFn::sigmoid(1.), ActFn::sigmoid(2.5), ActFn::tanh()] {
            for x in [-3., -0.7, 0., 0.4, 2.] {
                let expected = central_diff(&act_fn, x);
                assert!((act_fn.df(x) - expected).abs() < 1e-8, "{act_fn:?} at {x}");
            }
        }
    }

    #[test]
    fn tanh_dispatches_to_tanh() {
        let act_fn = ActFn::tanh();

        assert!(matches!(act_fn, ActFn::Tanh(_)));
        assert_eq!(act_fn.f(0.5), 0.5f64.tanh());
        assert_eq!(act_fn.df(0.), 1.);
    }

    #[test]
    fn sigmoid_is_scaled_by_amp() {
        let act_fn = ActFn::sigmoid(2.);
        assert_eq!(act_fn.f(0.), 1.);
    }
}
