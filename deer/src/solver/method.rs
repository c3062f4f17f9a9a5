use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::MlErr;

/// The strategies available to evaluate a recurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SolverMethod {
    /// Newton iterations over the whole trajectory, each one solved with a parallel scan.
    #[default]
    Deer,
    /// The position by position loop.
    Sequential,
}

impl FromStr for SolverMethod {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deer" | "deer_rnn" => Ok(Self::Deer),
            "sequential" => Ok(Self::Sequential),
            other => Err(MlErr::UnsupportedMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for SolverMethod {
    type Error = MlErr;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SolverMethod> for String {
    fn from(value: SolverMethod) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deer => "deer",
            Self::Sequential => "sequential",
        };

        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_methods() {
        assert_eq!("deer".parse::<SolverMethod>().unwrap(), SolverMethod::Deer);
        assert_eq!("deer_rnn".parse::<SolverMethod>().unwrap(), SolverMethod::Deer);
        assert_eq!(
            "sequential".parse::<SolverMethod>().unwrap(),
            SolverMethod::Sequential
        );
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let err = "picard".parse::<SolverMethod>().unwrap_err();
        assert!(matches!(err, MlErr::UnsupportedMethod(name) if name == "picard"));
    }
}
