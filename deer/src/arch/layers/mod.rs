mod dense;
mod readout;

pub use dense::Dense;
pub use readout::Readout;
