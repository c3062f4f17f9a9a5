use std::{error::Error, fmt, io};

use deer::MlErr;

/// The trainer's result type.
pub type Result<T> = std::result::Result<T, TrainerErr>;

/// Failures while setting up or running a training session.
#[derive(Debug)]
pub enum TrainerErr {
    Io(io::Error),
    Json(serde_json::Error),
    InvalidConfig(String),
    Dataset(String),
    Ml(MlErr),
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerErr::Io(e) => write!(f, "io error: {e}"),
            TrainerErr::Json(e) => write!(f, "invalid json: {e}"),
            TrainerErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            TrainerErr::Dataset(msg) => write!(f, "invalid dataset: {msg}"),
            TrainerErr::Ml(e) => write!(f, "training failed: {e}"),
        }
    }
}

impl Error for TrainerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainerErr::Io(e) => Some(e),
            TrainerErr::Json(e) => Some(e),
            TrainerErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TrainerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for TrainerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainerErr> for io::Error {
    fn from(value: TrainerErr) -> Self {
        match value {
            TrainerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
