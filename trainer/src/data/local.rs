use std::{fs, path::Path};

use deer::MlErr;
use ndarray::{Array2, Array3};
use serde::Deserialize;

use super::SequenceDataset;
use crate::{Result, TrainerErr};

/// The json layout of a local dataset.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocalDataset {
    /// `[example][position][channel]`
    inputs: Vec<Vec<Vec<f64>>>,
    labels: Vec<usize>,
    /// `[example][state]`
    #[serde(default)]
    initial_states: Option<Vec<Vec<f64>>>,
}

/// Loads a dataset from a json file with `inputs`, `labels` and optionally
/// `initial_states`.
pub fn load_local<P: AsRef<Path>>(path: P) -> Result<SequenceDataset> {
    let content = fs::read_to_string(path)?;
    parse_local(&content)
}

fn parse_local(json: &str) -> Result<SequenceDataset> {
    let LocalDataset {
        inputs,
        labels,
        initial_states,
    } = serde_json::from_str(json)?;

    let size = inputs.len();
    let nsequence = inputs.first().map(Vec::len).unwrap_or_default();
    let ninputs = inputs
        .first()
        .and_then(|seq| seq.first())
        .map(Vec::len)
        .unwrap_or_default();

    if let Some(i) = inputs.iter().position(|seq| seq.len() != nsequence) {
        return Err(TrainerErr::Dataset(format!(
            "sequence {i} has {} positions, expected {nsequence}",
            inputs[i].len()
        )));
    }

    let flat = flatten(inputs.into_iter().flatten(), ninputs, "inputs")?;
    let inputs = Array3::from_shape_vec((size, nsequence, ninputs), flat).map_err(MlErr::from)?;

    let initial_states = match initial_states {
        Some(states) => {
            let nstates = states.first().map(Vec::len).unwrap_or_default();
            let rows = states.len();
            let flat = flatten(states.into_iter(), nstates, "initial_states")?;
            Some(Array2::from_shape_vec((rows, nstates), flat).map_err(MlErr::from)?)
        }
        None => None,
    };

    SequenceDataset::new(inputs, labels, initial_states)
}

/// Concatenates `rows`, failing on the first one whose width isn't `width`.
fn flatten<I>(rows: I, width: usize, what: &str) -> Result<Vec<f64>>
where
    I: Iterator<Item = Vec<f64>>,
{
    let mut flat = Vec::new();

    for (i, row) in rows.enumerate() {
        if row.len() != width {
            return Err(TrainerErr::Dataset(format!(
                "row {i} of {what} has {} values, expected {width}",
                row.len()
            )));
        }

        flat.extend(row);
    }

    Ok(flat)
}
