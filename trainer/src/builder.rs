use std::num::NonZeroUsize;

use deer::{
    arch::{layers::Dense, loss::Loss},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
    training::{InitialStatePolicy, Orchestrator},
};
use log::{info, warn};

use crate::{
    Result, TrainerErr,
    config::{DatasetConfig, OptimizerConfig, TrainerConfig},
    data::{DataLoader, SequenceDataset, load_local, synthetic},
    session::{Session, TrainingSession},
};

/// Above this many bytes of Jacobians per example the build warns about memory.
const LARGE_JACOBIANS: usize = 256 << 20;

/// Builds training `Session`s given a configuration.
#[derive(Debug, Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a training `Session` following a config.
    ///
    /// # Args
    /// * `config` - The configuration of the run.
    ///
    /// # Returns
    /// A new session or an error if the config or its dataset is invalid.
    pub fn build(&self, config: TrainerConfig) -> Result<Box<dyn Session>> {
        config.validate()?;

        let bytes = config.jacobian_bytes();
        if bytes > LARGE_JACOBIANS {
            warn!(
                "every example in flight holds {} MiB of jacobians, lower nstates or nsequence \
                 if memory runs out",
                bytes >> 20
            );
        }

        self.resolve_dataset(config)
    }

    /// Resolves and checks the dataset of this session.
    fn resolve_dataset(&self, config: TrainerConfig) -> Result<Box<dyn Session>> {
        let dataset = match &config.dataset {
            DatasetConfig::Synthetic { size } => synthetic(
                *size,
                config.nsequence,
                config.ninputs,
                config.nclass,
                config.seed,
            )?,
            DatasetConfig::Local { path } => load_local(path)?,
        };

        self.check_dataset(&config, &dataset)?;
        self.resolve_optimizer(config, dataset)
    }

    fn check_dataset(&self, config: &TrainerConfig, dataset: &SequenceDataset) -> Result<()> {
        let dims = [
            ("nsequence", dataset.nsequence(), config.nsequence),
            ("ninputs", dataset.ninputs(), config.ninputs),
        ];

        for (name, got, expected) in dims {
            if got != expected {
                return Err(TrainerErr::Dataset(format!(
                    "the dataset has {name} {got} but the config asks for {expected}"
                )));
            }
        }

        if let Some(&label) = dataset.labels().iter().find(|&&l| l >= config.nclass) {
            return Err(TrainerErr::Dataset(format!(
                "label {label} is out of range for {} classes",
                config.nclass
            )));
        }

        if dataset.len() < config.batch_size {
            return Err(TrainerErr::Dataset(format!(
                "{} examples can't fill a batch of {}",
                dataset.len(),
                config.batch_size
            )));
        }

        if config.initial_state == InitialStatePolicy::Provided
            && dataset.nstates() != Some(config.nstates)
        {
            return Err(TrainerErr::Dataset(format!(
                "provided initial states need a dataset with {} wide initial states",
                config.nstates
            )));
        }

        Ok(())
    }

    /// Resolves the `Optimizer` for this session.
    fn resolve_optimizer(
        &self,
        config: TrainerConfig,
        dataset: SequenceDataset,
    ) -> Result<Box<dyn Session>> {
        match config.optimizer {
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                let factory = |len| Adam::new(len, learning_rate, beta1, beta2, epsilon);
                self.terminate_build(config, dataset, factory)
            }
            OptimizerConfig::GradientDescent { learning_rate } => {
                let factory = |_| GradientDescent::new(learning_rate);
                self.terminate_build(config, dataset, factory)
            }
            OptimizerConfig::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => {
                let factory = |len| GradientDescentWithMomentum::new(len, learning_rate, momentum);
                self.terminate_build(config, dataset, factory)
            }
        }
    }

    /// Terminates the build and instantiates every entity of the session.
    ///
    /// # Args
    /// * `config` - The configuration of the run.
    /// * `dataset` - The checked dataset.
    /// * `optimizer_factory` - Builds the optimizer given the amount of parameters.
    fn terminate_build<O, OF>(
        &self,
        config: TrainerConfig,
        dataset: SequenceDataset,
        optimizer_factory: OF,
    ) -> Result<Box<dyn Session>>
    where
        O: Optimizer + 'static,
        OF: FnOnce(usize) -> O,
    {
        let cell = config.cell.build(config.nstates, config.ninputs);
        let readout = Dense::new((config.nstates, config.nclass), None);

        let orchestrator = Orchestrator::new(cell, readout, Loss::from(config.loss))?
            .with_solver(config.solver)
            .with_initial_state(config.initial_state)
            .with_keying(config.warm_start);

        let capacity = config.warm_start.capacity(dataset.len(), config.batch_size);
        let state =
            orchestrator.init_state(config.seed, capacity, config.nsequence, optimizer_factory)?;

        let batch_size = NonZeroUsize::new(config.batch_size)
            .ok_or_else(|| TrainerErr::InvalidConfig("batch_size must be positive".into()))?;
        let mut loader = DataLoader::new(dataset, batch_size);
        if config.shuffle {
            loader = loader.shuffled(config.seed);
        }

        info!(
            cell:? = config.cell,
            method:% = config.solver.method,
            params = orchestrator.num_params(),
            cache_entries = capacity;
            "built training session"
        );

        let session = TrainingSession::new(orchestrator, state, loader, config.epochs);
        Ok(Box::new(session))
    }
}
