mod cell;
mod elman;
mod gru;
mod linear;

pub use cell::Cell;
pub use elman::Elman;
pub use gru::Gru;
pub use linear::Linear;
