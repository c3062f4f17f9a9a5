//! Parallel evaluation and training of recurrences.
//!
//! A recurrence `y_i = f(y_{i-1}, x_i)` is solved for the whole sequence at once with
//! Newton iterations whose linear sub-problems are affine recurrences, solved with a
//! parallel scan. Gradients are taken at the fixed point, independently of how many
//! iterations it took to reach it.

pub mod arch;
pub mod cache;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod rollout;
pub mod solver;
pub mod training;

pub use error::{MlErr, Result};
