use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use deer::training::MetricsSink;
use log::warn;
use serde::Serialize;

use crate::Result;

#[derive(Serialize)]
struct Record<'a> {
    name: &'a str,
    value: f64,
    step: usize,
}

/// Appends every metric as a json object on its own line of
/// `<log_dir>/version_<version>/metrics.jsonl`.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Creates the run directory and truncates any previous metrics file.
    pub fn create<P: AsRef<Path>>(log_dir: P, version: usize) -> Result<Self> {
        let dir = log_dir.as_ref().join(format!("version_{version}"));
        fs::create_dir_all(&dir)?;

        let path = dir.join("metrics.jsonl");
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl MetricsSink for JsonlSink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        if let Err(e) = self.write(&Record { name, value, step }) {
            warn!("failed to record {name} at step {step}: {e}");
        }
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("failed to flush {}: {e}", self.path.display());
        }
    }
}
