use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

/// Softmax cross entropy over logits, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    /// Computes the row-wise log-softmax of `logits`, shifted by each row's maximum.
    fn log_softmax(logits: ArrayView2<f64>) -> Array2<f64> {
        let mut out = logits.to_owned();

        for mut row in out.axis_iter_mut(Axis(0)) {
            let max = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
            let lse = max + row.mapv(|x| (x - max).exp()).sum().ln();
            row.mapv_inplace(|x| x - lse);
        }

        out
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> f64 {
        let batch = y_pred.nrows().max(1) as f64;
        -(Self::log_softmax(y_pred) * &y).sum() / batch
    }

    fn loss_prime(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> Array2<f64> {
        let batch = y_pred.nrows().max(1) as f64;
        (Self::log_softmax(y_pred).mapv_into(f64::exp) - &y) / batch
    }
}
