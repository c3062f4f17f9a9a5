pub mod activations;
pub mod cells;
pub mod layers;
pub mod loss;
pub(crate) mod params;
mod step;

pub use layers::Readout;
pub use step::StepFunction;
