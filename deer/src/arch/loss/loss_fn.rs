use ndarray::{Array2, ArrayView2};

use super::{CrossEntropy, Mse};

/// A loss over a batch of predictions `(batch, nout)` against one-hot targets.
pub trait LossFn {
    fn loss(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> f64;
    fn loss_prime(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> Array2<f64>;
}

/// The losses a training run can be configured with.
#[derive(Debug, Clone, Copy, Default)]
pub enum Loss {
    #[default]
    CrossEntropy,
    Mse,
}

impl LossFn for Loss {
    fn loss(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> f64 {
        match self {
            Loss::CrossEntropy => CrossEntropy.loss(y_pred, y),
            Loss::Mse => Mse.loss(y_pred, y),
        }
    }

    fn loss_prime(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Loss::CrossEntropy => CrossEntropy.loss_prime(y_pred, y),
            Loss::Mse => Mse.loss_prime(y_pred, y),
        }
    }
}
