//! Metrics collectors that receive per-query timing samples.
//!
//! The interceptor forwards one sample per observation, keyed by
//! `<client_label>:<table>:<operation>`. Collectors must be safe to call from many
//! in-flight queries at once; a collector error is logged by the interceptor and
//! otherwise ignored.

use crate::error::CollectorError;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

/// Sink for aggregate query timings.
pub trait MetricsCollector: Send + Sync {
    /// Record one timing sample, in milliseconds, under `key`.
    fn record(&self, key: &str, value_millis: f64) -> Result<(), CollectorError>;
}

impl<T: MetricsCollector + ?Sized> MetricsCollector for Arc<T> {
    fn record(&self, key: &str, value_millis: f64) -> Result<(), CollectorError> {
        (**self).record(key, value_millis)
    }
}

/// A collector that drops every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCollector;

impl MetricsCollector for NoopCollector {
    fn record(&self, _key: &str, _value_millis: f64) -> Result<(), CollectorError> {
        Ok(())
    }
}

/// Aggregate of every sample recorded under one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSummary {
    /// Number of samples.
    pub count: u64,
    /// Sum of all samples, in milliseconds.
    pub total_millis: f64,
    /// Smallest sample.
    pub min_millis: f64,
    /// Largest sample.
    pub max_millis: f64,
}

impl MetricSummary {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            total_millis: value,
            min_millis: value,
            max_millis: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total_millis += value;
        self.min_millis = self.min_millis.min(value);
        self.max_millis = self.max_millis.max(value);
    }

    /// Mean sample, in milliseconds.
    pub fn mean_millis(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_millis / self.count as f64
        }
    }
}

/// In-process collector keeping a [`MetricSummary`] per key.
#[derive(Debug, Default)]
pub struct InMemoryCollector {
    summaries: DashMap<String, MetricSummary>,
}

impl InMemoryCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary for one key, if any sample was recorded.
    pub fn get(&self, key: &str) -> Option<MetricSummary> {
        self.summaries.get(key).map(|s| *s)
    }

    /// All summaries, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, MetricSummary)> {
        let mut out: Vec<_> = self
            .summaries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Drop all summaries.
    pub fn reset(&self) {
        self.summaries.clear();
    }
}

impl MetricsCollector for InMemoryCollector {
    fn record(&self, key: &str, value_millis: f64) -> Result<(), CollectorError> {
        if !value_millis.is_finite() || value_millis < 0.0 {
            return Err(CollectorError::rejected(
                key,
                format!("invalid sample {value_millis}"),
            ));
        }
        self.summaries
            .entry(key.to_string())
            .and_modify(|s| s.add(value_millis))
            .or_insert_with(|| MetricSummary::first(value_millis));
        Ok(())
    }
}

/// Collector forwarding samples to the `metrics` facade as a histogram.
///
/// Samples land in `querywatch_query_duration_ms` labelled with `key`; install a
/// recorder (e.g. a Prometheus exporter) to export them.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsFacadeCollector {
    name: &'static str,
}

#[cfg(feature = "metrics")]
impl Default for MetricsFacadeCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
impl MetricsFacadeCollector {
    /// Default histogram name.
    pub const DEFAULT_NAME: &'static str = "querywatch_query_duration_ms";

    /// Create a collector using the default histogram name.
    pub fn new() -> Self {
        Self::with_name(Self::DEFAULT_NAME)
    }

    /// Use a custom histogram name.
    ///
    /// The histogram is described on the currently installed recorder.
    pub fn with_name(name: &'static str) -> Self {
        metrics::describe_histogram!(
            name,
            metrics::Unit::Milliseconds,
            "Table query duration by client, table and operation"
        );
        Self { name }
    }
}

#[cfg(feature = "metrics")]
impl MetricsCollector for MetricsFacadeCollector {
    fn record(&self, key: &str, value_millis: f64) -> Result<(), CollectorError> {
        metrics::histogram!(self.name, "key" => key.to_string()).record(value_millis);
        Ok(())
    }
}

static GLOBAL_COLLECTOR: OnceLock<Arc<dyn MetricsCollector>> = OnceLock::new();

/// Install the process-wide collector used by [`crate::wrap`].
///
/// Can only be done once, and only before the first call to [`global_collector`].
pub fn set_global_collector(collector: Arc<dyn MetricsCollector>) -> Result<(), CollectorError> {
    GLOBAL_COLLECTOR
        .set(collector)
        .map_err(|_| CollectorError::AlreadyInstalled)
}

/// The process-wide collector.
///
/// Falls back to a fresh [`InMemoryCollector`] when none was installed.
pub fn global_collector() -> Arc<dyn MetricsCollector> {
    GLOBAL_COLLECTOR
        .get_or_init(|| Arc::new(InMemoryCollector::new()))
        .clone()
}
