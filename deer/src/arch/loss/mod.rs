mod cross_entropy;
mod labels;
mod loss_fn;
mod mse;

pub use cross_entropy::CrossEntropy;
pub use labels::{accuracy, one_hot};
pub use loss_fn::{Loss, LossFn};
pub use mse::Mse;
