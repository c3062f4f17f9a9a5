use deer::{
    arch::{StepFunction, layers::Readout, loss::LossFn},
    optimization::Optimizer,
    training::{EpochReport, MetricsSink, Orchestrator, TrainState},
};
use log::info;

use crate::{Result, data::DataLoader};

/// A fully built training run, erased over its optimizer.
pub trait Session {
    /// Trains until the configured amount of epochs is reached.
    fn run(&mut self, sink: &mut dyn MetricsSink) -> Result<Vec<EpochReport>>;

    /// Returns the length of the flat parameter buffer being trained.
    fn num_params(&self) -> usize;

    /// Returns the current flat parameters.
    fn params(&self) -> &[f64];
}

pub struct TrainingSession<S, R, L, O> {
    orchestrator: Orchestrator<S, R, L>,
    state: TrainState<O>,
    loader: DataLoader,
    epochs: usize,
}

impl<S, R, L, O> TrainingSession<S, R, L, O>
where
    S: StepFunction,
    R: Readout,
    L: LossFn,
    O: Optimizer,
{
    pub fn new(
        orchestrator: Orchestrator<S, R, L>,
        state: TrainState<O>,
        loader: DataLoader,
        epochs: usize,
    ) -> Self {
        Self {
            orchestrator,
            state,
            loader,
            epochs,
        }
    }
}

impl<S, R, L, O> Session for TrainingSession<S, R, L, O>
where
    S: StepFunction,
    R: Readout,
    L: LossFn,
    O: Optimizer,
{
    fn run(&mut self, sink: &mut dyn MetricsSink) -> Result<Vec<EpochReport>> {
        info!(
            params = self.num_params(),
            batches = self.loader.len(),
            epochs = self.epochs;
            "starting training"
        );

        let reports =
            self.orchestrator
                .train(&mut self.state, &mut self.loader, sink, self.epochs)?;

        info!(steps = self.state.step; "training finished");
        Ok(reports)
    }

    fn num_params(&self) -> usize {
        self.orchestrator.num_params()
    }

    fn params(&self) -> &[f64] {
        &self.state.params
    }
}
