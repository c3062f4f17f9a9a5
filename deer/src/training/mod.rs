mod data;
mod metrics;
mod orchestrator;
mod state;

pub use data::{Batch, DataSource};
pub use metrics::{LogSink, MemorySink, MetricsSink};
pub use orchestrator::{EpochReport, Orchestrator, StepReport};
pub use state::{InitialStatePolicy, TrainState};
