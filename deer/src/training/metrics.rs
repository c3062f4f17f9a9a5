use std::collections::BTreeMap;

use log::info;

/// Receives the scalars produced while training.
pub trait MetricsSink {
    fn record(&mut self, name: &str, value: f64, step: usize);
}

/// Writes every metric to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        info!(metric = name, value = value, step = step; "metric");
    }
}

/// Keeps every metric in memory, by name.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    series: BTreeMap<String, Vec<(usize, f64)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `(step, value)` pairs recorded for `name`, in recording order.
    pub fn series(&self, name: &str) -> &[(usize, f64)] {
        self.series.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        self.series
            .entry(name.to_string())
            .or_default()
            .push((step, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_groups_by_name() {
        let mut sink = MemorySink::new();
        sink.record("loss", 2., 0);
        sink.record("accuracy", 0.5, 0);
        sink.record("loss", 1., 1);

        assert_eq!(sink.series("loss"), &[(0, 2.), (1, 1.)]);
        assert_eq!(sink.series("accuracy"), &[(0, 0.5)]);
        assert!(sink.series("missing").is_empty());
    }
}
