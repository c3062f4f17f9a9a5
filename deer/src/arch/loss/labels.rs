use ndarray::{Array2, ArrayView2, Axis};

use crate::{MlErr, Result};

/// Encodes integer class labels as a `(labels.len(), nclass)` one-hot matrix.
///
/// # Returns
/// An error if a label is not smaller than `nclass`.
pub fn one_hot(labels: &[usize], nclass: usize) -> Result<Array2<f64>> {
    let mut y = Array2::zeros((labels.len(), nclass));

    for (i, &label) in labels.iter().enumerate() {
        if label >= nclass {
            return Err(MlErr::InvalidLabel { label, nclass });
        }

        y[[i, label]] = 1.;
    }

    Ok(y)
}

/// Returns the fraction of rows of `y_pred` whose argmax equals the label.
pub fn accuracy(y_pred: ArrayView2<f64>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.;
    }

    let hits = y_pred
        .axis_iter(Axis(0))
        .zip(labels)
        .filter(|(row, label)| {
            let argmax = row
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (j, &x)| {
                    if x > best.1 { (j, x) } else { best }
                })
                .0;
            argmax == **label
        })
        .count();

    hits as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn one_hot_rows() {
        let y = one_hot(&[2, 0], 3).unwrap();
        assert_eq!(y, array![[0., 0., 1.], [1., 0., 0.]]);
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        assert!(matches!(
            one_hot(&[0, 3], 3),
            Err(MlErr::InvalidLabel { label: 3, nclass: 3 })
        ));
    }

    #[test]
    fn accuracy_counts_argmax_hits() {
        let y_pred = array![[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]];
        assert_eq!(accuracy(y_pred.view(), &[1, 1, 1]), 2. / 3.);
    }
}
