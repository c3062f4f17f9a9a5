//! Command line training of recurrent classifiers solved with `deer`.
//!
//! A json `TrainerConfig` picks the cell, optimizer, dataset and solver, the
//! `TrainerBuilder` turns it into a `Session` and every metric ends up in a
//! `JsonlSink`.

pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod session;

pub use builder::TrainerBuilder;
pub use config::TrainerConfig;
pub use error::{Result, TrainerErr};
pub use metrics::JsonlSink;
pub use session::Session;
