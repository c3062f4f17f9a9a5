use std::{fs, path::{Path, PathBuf}};

use deer::{
    arch::{
        activations::ActFn,
        cells::{Cell, Elman, Gru, Linear},
        loss::Loss,
    },
    cache::WarmStartKeying,
    optimization::Adam,
    solver::SolverConfig,
    training::InitialStatePolicy,
};
use serde::{Deserialize, Serialize};

use crate::{Result, TrainerErr};

/// The configuration of the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnConfig {
    Sigmoid { amp: f64 },
    Tanh,
}

impl From<ActFnConfig> for ActFn {
    fn from(value: ActFnConfig) -> Self {
        match value {
            ActFnConfig::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnConfig::Tanh => ActFn::tanh(),
        }
    }
}

/// The configuration of the recurrent cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellConfig {
    #[default]
    Gru,
    Elman {
        act_fn: ActFnConfig,
    },
    Linear,
}

impl CellConfig {
    pub fn build(&self, nstates: usize, ninputs: usize) -> Cell {
        match *self {
            CellConfig::Gru => Cell::Gru(Gru::new(nstates, ninputs)),
            CellConfig::Elman { act_fn } => Cell::Elman(Elman::new(nstates, ninputs, act_fn.into())),
            CellConfig::Linear => Cell::Linear(Linear::new(nstates, ninputs)),
        }
    }
}

/// The configuration of the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam {
        learning_rate: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
    GradientDescent {
        learning_rate: f64,
    },
    GradientDescentWithMomentum {
        learning_rate: f64,
        momentum: f64,
    },
}

fn default_beta1() -> f64 {
    Adam::BETA1
}

fn default_beta2() -> f64 {
    Adam::BETA2
}

fn default_epsilon() -> f64 {
    Adam::EPSILON
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            learning_rate: 1e-3,
            beta1: Adam::BETA1,
            beta2: Adam::BETA2,
            epsilon: Adam::EPSILON,
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f64 {
        match *self {
            Self::Adam { learning_rate, .. }
            | Self::GradientDescent { learning_rate }
            | Self::GradientDescentWithMomentum { learning_rate, .. } => learning_rate,
        }
    }
}

/// The configuration of the `LossFn` trait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossConfig {
    #[default]
    CrossEntropy,
    Mse,
}

impl From<LossConfig> for Loss {
    fn from(value: LossConfig) -> Self {
        match value {
            LossConfig::CrossEntropy => Loss::CrossEntropy,
            LossConfig::Mse => Loss::Mse,
        }
    }
}

/// Where the training sequences come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Noisy sinusoids whose frequency depends on the class.
    Synthetic { size: usize },
    /// A json file with `inputs`, `labels` and optionally `initial_states`.
    Local { path: PathBuf },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::Synthetic { size: 512 }
    }
}

/// The configuration of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    pub seed: u64,
    pub batch_size: usize,
    pub nsequence: usize,
    pub ninputs: usize,
    pub nstates: usize,
    pub nclass: usize,
    pub epochs: usize,
    /// Metrics are written to `<log_dir>/version_<version>`.
    pub version: usize,
    pub log_dir: PathBuf,
    pub shuffle: bool,
    pub solver: SolverConfig,
    pub cell: CellConfig,
    pub optimizer: OptimizerConfig,
    pub loss: LossConfig,
    pub initial_state: InitialStatePolicy,
    pub warm_start: WarmStartKeying,
    pub dataset: DatasetConfig,
}

/// The reference run: a 256 wide GRU over sequences of 1024 steps.
///
/// The solver holds a dense `(nsequence, nstates, nstates)` Jacobian per example in
/// flight, 512 MiB with these values, so small machines should lower `nstates`,
/// `nsequence` or the rayon thread count.
impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            batch_size: 16,
            nsequence: 1024,
            ninputs: 1,
            nstates: 256,
            nclass: 10,
            epochs: 999_999_999,
            version: 0,
            log_dir: PathBuf::from("logs"),
            shuffle: true,
            solver: SolverConfig::default(),
            cell: CellConfig::default(),
            optimizer: OptimizerConfig::default(),
            loss: LossConfig::default(),
            initial_state: InitialStatePolicy::default(),
            warm_start: WarmStartKeying::default(),
            dataset: DatasetConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Reads and validates a configuration from a json file. Missing fields take their
    /// default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the directory of this run's artifacts.
    pub fn run_dir(&self) -> PathBuf {
        self.log_dir.join(format!("version_{}", self.version))
    }

    /// Returns the bytes of the Jacobians the solver stores for a single example.
    pub fn jacobian_bytes(&self) -> usize {
        self.nsequence
            .saturating_mul(self.nstates)
            .saturating_mul(self.nstates)
            .saturating_mul(size_of::<f64>())
    }

    /// Checks the values serde can't.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("nsequence", self.nsequence),
            ("ninputs", self.ninputs),
            ("nstates", self.nstates),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(invalid(format!("{name} must be positive")));
            }
        }

        if self.nclass < 2 {
            return Err(invalid(format!("nclass must be at least 2, got {}", self.nclass)));
        }

        if !(self.solver.tol.is_finite() && self.solver.tol > 0.) {
            return Err(invalid(format!("solver tol must be positive, got {}", self.solver.tol)));
        }

        let lr = self.optimizer.learning_rate();
        if !(lr.is_finite() && lr > 0.) {
            return Err(invalid(format!("learning_rate must be positive, got {lr}")));
        }

        if let DatasetConfig::Synthetic { size } = self.dataset
            && size < self.batch_size
        {
            return Err(invalid(format!(
                "the dataset size {size} can't fill a batch of {}",
                self.batch_size
            )));
        }

        Ok(())
    }
}

fn invalid(msg: String) -> TrainerErr {
    TrainerErr::InvalidConfig(msg)
}
