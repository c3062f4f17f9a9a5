use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::{NormalError, uniform::Error as UniformError};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    KeyOutOfBounds {
        key: usize,
        capacity: usize,
    },
    DuplicatedKey(usize),
    InvalidLabel {
        label: usize,
        nclass: usize,
    },
    UnsupportedMethod(String),
    MissingInitialStates,
    ParamGen(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::Shape(e) => write!(f, "invalid array shape: {e}"),
            MlErr::KeyOutOfBounds { key, capacity } => write!(
                f,
                "warm start key {key} is out of bounds for a cache of {capacity} entries"
            ),
            MlErr::DuplicatedKey(key) => {
                write!(f, "warm start key {key} appears more than once in the batch")
            }
            MlErr::InvalidLabel { label, nclass } => {
                write!(f, "label {label} is invalid for {nclass} classes")
            }
            MlErr::UnsupportedMethod(name) => write!(f, "unsupported solver method: {name}"),
            MlErr::MissingInitialStates => {
                write!(f, "the batch doesn't carry the initial states it should provide")
            }
            MlErr::ParamGen(msg) => write!(f, "failed to build a parameter generator: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::ParamGen(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::ParamGen(value.to_string())
    }
}

/// Fails with a `SizeMismatch` when `got` differs from `expected`.
pub(crate) fn check_size(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
