use log::{info, warn};
use ndarray::{Array2, Axis};

use super::{Batch, DataSource, InitialStatePolicy, MetricsSink, TrainState};
use crate::{
    MlErr, Result,
    arch::{
        Readout, StepFunction,
        loss::{LossFn, accuracy, one_hot},
    },
    cache::{WarmStartCache, WarmStartKeying},
    error::check_size,
    optimization::Optimizer,
    rollout::rollout_batch,
    solver::SolverConfig,
};

/// What a single training step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// The index of the step, starting at 0.
    pub step: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub mean_iterations: f64,
    pub max_iterations: usize,
    /// The amount of examples whose solve didn't converge.
    pub not_converged: usize,
}

/// The averages of an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub steps: usize,
    pub mean_loss: f64,
    pub mean_accuracy: f64,
}

/// Trains a recurrence followed by a readout.
///
/// The orchestrator only holds the architecture and how to solve it, everything that
/// changes between steps lives in a `TrainState`.
#[derive(Debug, Clone)]
pub struct Orchestrator<S, R, L> {
    step: S,
    readout: R,
    loss: L,
    solver: SolverConfig,
    initial_state: InitialStatePolicy,
    keying: WarmStartKeying,
}

impl<S, R, L> Orchestrator<S, R, L>
where
    S: StepFunction,
    R: Readout,
    L: LossFn,
{
    /// Creates a new `Orchestrator` with the default solver, zero initial states and
    /// one cache entry per example.
    ///
    /// # Returns
    /// An error if the readout doesn't read states of the step's width.
    pub fn new(step: S, readout: R, loss: L) -> Result<Self> {
        check_size("readout width", readout.nstates(), step.nstates())?;

        Ok(Self {
            step,
            readout,
            loss,
            solver: SolverConfig::default(),
            initial_state: InitialStatePolicy::default(),
            keying: WarmStartKeying::default(),
        })
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_initial_state(mut self, initial_state: InitialStatePolicy) -> Self {
        self.initial_state = initial_state;
        self
    }

    pub fn with_keying(mut self, keying: WarmStartKeying) -> Self {
        self.keying = keying;
        self
    }

    pub fn step_fn(&self) -> &S {
        &self.step
    }

    pub fn readout(&self) -> &R {
        &self.readout
    }

    pub fn keying(&self) -> WarmStartKeying {
        self.keying
    }

    /// Returns the length of the flat parameter buffer.
    pub fn num_params(&self) -> usize {
        let learned = match self.initial_state {
            InitialStatePolicy::Learned => self.step.nstates(),
            _ => 0,
        };

        self.step.size() + self.readout.size() + learned
    }

    /// Builds the state of a fresh training run.
    ///
    /// # Arguments
    /// * `seed` - The seed of the parameter initialization.
    /// * `cache_capacity` - The amount of warm start entries.
    /// * `nseq` - The length of the sequences.
    /// * `optimizer` - Builds the optimizer given the amount of parameters.
    pub fn init_state<O, F>(
        &self,
        seed: u64,
        cache_capacity: usize,
        nseq: usize,
        optimizer: F,
    ) -> Result<TrainState<O>>
    where
        O: Optimizer,
        F: FnOnce(usize) -> O,
    {
        let mut params = self.step.init(seed)?;
        params.extend(self.readout.init(seed.wrapping_add(1))?);
        params.resize(self.num_params(), 0.);

        Ok(TrainState {
            optimizer: optimizer(params.len()),
            params,
            cache: WarmStartCache::new(cache_capacity, nseq, self.step.nstates()),
            step: 0,
        })
    }

    /// Splits the flat buffer into the step, readout and learned initial state params.
    fn split_params<'p>(
        &self,
        params: &'p [f64],
    ) -> Result<(&'p [f64], &'p [f64], &'p [f64])> {
        check_size("params", params.len(), self.num_params())?;

        let (step, rest) = params.split_at(self.step.size());
        let (readout, learned) = rest.split_at(self.readout.size());
        Ok((step, readout, learned))
    }

    fn initial_states(&self, batch: &Batch, learned: &[f64]) -> Result<Array2<f64>> {
        let nstates = self.step.nstates();

        match self.initial_state {
            InitialStatePolicy::Zeros => Ok(Array2::zeros((batch.len(), nstates))),
            InitialStatePolicy::Provided => {
                let initial_states = batch
                    .initial_states
                    .as_ref()
                    .ok_or(MlErr::MissingInitialStates)?;

                check_size("initial state width", initial_states.ncols(), nstates)?;
                Ok(initial_states.clone())
            }
            InitialStatePolicy::Learned => {
                check_size("learned initial state", learned.len(), nstates)?;
                Ok(Array2::from_shape_fn((batch.len(), nstates), |(_, j)| {
                    learned[j]
                }))
            }
        }
    }

    /// Runs a full training step on `batch`: fetches the warm starts, solves and
    /// differentiates the batch, updates the parameters and refreshes the warm starts.
    ///
    /// Every fallible operation runs before the first mutation, so a failing step leaves
    /// `state` untouched.
    pub fn step<O: Optimizer>(
        &self,
        state: &mut TrainState<O>,
        batch: &Batch,
    ) -> Result<StepReport> {
        batch.validate()?;

        let (step_params, readout_params, learned) = self.split_params(&state.params)?;
        let keys = self.keying.keys(&batch.ids);
        let guesses = state.cache.get_batch(&keys)?;
        let initial_states = self.initial_states(batch, learned)?;
        let targets = one_hot(&batch.labels, self.readout.nout())?;

        let rollout = rollout_batch(
            &self.step,
            step_params,
            &self.readout,
            readout_params,
            initial_states.view(),
            batch.inputs.view(),
            guesses.view(),
            &self.solver,
        )?;

        let outputs = rollout.outputs();
        let loss = self.loss.loss(outputs, targets.view());
        let accuracy = accuracy(outputs, &batch.labels);
        let d_outputs = self.loss.loss_prime(outputs, targets.view());
        let grads = rollout.backward(d_outputs.view())?;

        let stats = rollout.stats();
        let trajectories = rollout.trajectories();
        drop(rollout);

        let mut grad = grads.step;
        grad.extend(grads.readout);
        if self.initial_state == InitialStatePolicy::Learned {
            grad.extend(grads.initial_states.sum_axis(Axis(0)));
        }

        state.cache.validate_batch(&keys, trajectories.view())?;
        state.optimizer.update_params(&grad, &mut state.params)?;
        state.cache.put_batch(&keys, trajectories.view())?;

        let report = StepReport {
            step: state.step,
            loss,
            accuracy,
            mean_iterations: stats.iter().map(|s| s.iterations as f64).sum::<f64>()
                / stats.len().max(1) as f64,
            max_iterations: stats.iter().map(|s| s.iterations).max().unwrap_or_default(),
            not_converged: stats.iter().filter(|s| !s.converged).count(),
        };
        state.step += 1;

        if !loss.is_finite() {
            warn!("non finite loss {loss} at step {}", report.step);
        }

        info!(
            step = report.step,
            loss = report.loss,
            accuracy = report.accuracy,
            max_iterations = report.max_iterations;
            "train step"
        );

        Ok(report)
    }

    /// Trains for `epochs` passes over `source`, recording every step in `sink`.
    ///
    /// Stops early if an epoch yields no batches.
    pub fn train<O, D, M>(
        &self,
        state: &mut TrainState<O>,
        source: &mut D,
        sink: &mut M,
        epochs: usize,
    ) -> Result<Vec<EpochReport>>
    where
        O: Optimizer,
        D: DataSource + ?Sized,
        M: MetricsSink + ?Sized,
    {
        let mut reports = Vec::new();

        for epoch in 0..epochs {
            source.reset();

            let (mut loss, mut accuracy, mut steps) = (0., 0., 0);
            while let Some(batch) = source.next_batch() {
                let report = self.step(state, &batch?)?;

                sink.record("train_loss", report.loss, report.step);
                sink.record("train_accuracy", report.accuracy, report.step);
                sink.record("solver_iterations", report.mean_iterations, report.step);

                loss += report.loss;
                accuracy += report.accuracy;
                steps += 1;
            }

            if steps == 0 {
                warn!("epoch {epoch} yielded no batches, stopping");
                break;
            }

            let report = EpochReport {
                epoch,
                steps,
                mean_loss: loss / steps as f64,
                mean_accuracy: accuracy / steps as f64,
            };

            info!(
                epoch = epoch,
                loss = report.mean_loss,
                accuracy = report.mean_accuracy;
                "finished epoch"
            );

            reports.push(report);
        }

        Ok(reports)
    }
}
