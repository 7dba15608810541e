use super::config::MonitorConfig;
use super::monitors::NoopMonitor;
use super::types::{QueryMonitor, QueryObservation, QueryOperation, metric_key};
use crate::collector::{MetricsCollector, global_collector};
use crate::executor::QueryExecutor;
use crate::query::Query;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

tokio::task_local! {
    // Address of the executor an instrumented resolution is currently delegating to.
    static OBSERVING: usize;
}

fn address_of<T>(value: &T) -> usize {
    value as *const T as *const () as usize
}

/// Whether `executor` is the one an enclosing instrumented resolution delegates to.
///
/// Only wrappers stacked directly on each other match. A different handle reached from
/// inside a resolution is observed on its own.
fn already_observed<T>(executor: &T) -> bool {
    OBSERVING
        .try_with(|delegate| *delegate == address_of(executor))
        .unwrap_or(false)
}

/// Wrap `executor` so every query it resolves is timed and reported under `client_label`.
///
/// Uses the process-wide collector and the default [`MonitorConfig`].
pub fn wrap<E: QueryExecutor>(executor: E, client_label: impl Into<String>) -> InstrumentedClient<E> {
    InstrumentedClient::new(executor, client_label)
}

/// A query executor decorator that observes every terminal resolution.
///
/// Results and errors of the inner executor are returned unchanged. Each resolution
/// produces exactly one [`QueryObservation`], which is forwarded to the metrics
/// collector, logged at `warn` when slow or `error` when failed, and handed to the
/// configured monitor. Failures inside that reporting are logged and swallowed.
///
/// Everything else the inner executor offers stays reachable through `Deref`.
pub struct InstrumentedClient<E> {
    pub(super) inner: E,
    pub(super) label: String,
    pub(super) collector: Arc<dyn MetricsCollector>,
    pub(super) monitor: Arc<dyn QueryMonitor>,
    pub(super) config: MonitorConfig,
}

impl<E: QueryExecutor> InstrumentedClient<E> {
    /// Create an instrumented client reporting to the process-wide collector.
    pub fn new(inner: E, client_label: impl Into<String>) -> Self {
        Self {
            inner,
            label: client_label.into(),
            collector: global_collector(),
            monitor: Arc::new(NoopMonitor),
            config: MonitorConfig::default(),
        }
    }

    /// Set the monitor configuration.
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the metrics collector.
    pub fn with_collector<M: MetricsCollector + 'static>(mut self, collector: M) -> Self {
        self.collector = Arc::new(collector);
        self
    }

    /// Set the metrics collector from an Arc.
    pub fn with_collector_arc(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collector = collector;
        self
    }

    /// Set the query monitor.
    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Set the query monitor from an Arc.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Enable monitoring.
    pub fn enable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = true;
        self
    }

    /// Disable monitoring.
    pub fn disable_monitoring(mut self) -> Self {
        self.config.monitoring_enabled = false;
        self
    }

    /// Check if monitoring is enabled.
    pub fn is_monitoring_enabled(&self) -> bool {
        self.config.monitoring_enabled
    }

    /// Label reported with every observation.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the current configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get a reference to the inner executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Get the inner executor, consuming this wrapper.
    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Forward one query timing to the metrics collector and log it if slow or failed.
    ///
    /// The sample goes to `<label>:<table>:<operation>`. A failing or panicking collector
    /// is logged at `error` and otherwise ignored.
    pub fn track_query(
        &self,
        table: &str,
        operation: QueryOperation,
        duration: Duration,
        success: bool,
        error: Option<&str>,
    ) {
        let key = metric_key(&self.label, table, operation);
        let millis = duration.as_secs_f64() * 1000.0;

        match catch_unwind(AssertUnwindSafe(|| self.collector.record(&key, millis))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    target: "querywatch.instrumentation",
                    client = %self.label,
                    metric = %key,
                    error = %e,
                    "failed to record query metric"
                );
            }
            Err(panic) => {
                tracing::error!(
                    target: "querywatch.instrumentation",
                    client = %self.label,
                    metric = %key,
                    error = panic_message(panic.as_ref()),
                    "metrics collector panicked"
                );
            }
        }

        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if !success {
            tracing::error!(
                target: "querywatch.query",
                client = %self.label,
                table,
                operation = %operation,
                duration_ms,
                error = error.unwrap_or("unknown error"),
                "query failed"
            );
        } else if self.config.is_slow(duration) {
            tracing::warn!(
                target: "querywatch.query",
                client = %self.label,
                table,
                operation = %operation,
                duration_ms,
                threshold_ms = u64::try_from(self.config.slow_query_threshold.as_millis())
                    .unwrap_or(u64::MAX),
                "slow query"
            );
        }
    }

    pub(super) fn report(&self, observation: &QueryObservation) {
        self.track_query(
            &observation.table,
            observation.operation,
            observation.duration,
            observation.success,
            observation.error_message.as_deref(),
        );

        let slow = self.config.is_slow(observation.duration);
        let notified = catch_unwind(AssertUnwindSafe(|| {
            self.monitor.on_query_complete(observation);
            if slow {
                self.monitor.on_slow_query(observation);
            }
        }));
        if let Err(panic) = notified {
            tracing::error!(
                target: "querywatch.instrumentation",
                client = %self.label,
                error = panic_message(panic.as_ref()),
                "query monitor panicked"
            );
        }
    }

    fn notify_start(&self, table: &str, operation: QueryOperation) {
        let started = catch_unwind(AssertUnwindSafe(|| {
            self.monitor.on_query_start(&self.label, table, operation)
        }));
        if let Err(panic) = started {
            tracing::error!(
                target: "querywatch.instrumentation",
                client = %self.label,
                error = panic_message(panic.as_ref()),
                "query monitor panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<E: QueryExecutor> QueryExecutor for InstrumentedClient<E> {
    type Output = E::Output;
    type Error = E::Error;

    fn build_query(&self, table: &str, operation: QueryOperation) -> Query {
        self.inner.build_query(table, operation)
    }

    async fn resolve(&self, query: Query) -> Result<E::Output, E::Error> {
        let delegate = address_of(&self.inner);

        // Stacked under another wrapper: that one counts this query.
        if already_observed(self) {
            return OBSERVING.scope(delegate, self.inner.resolve(query)).await;
        }
        if !self.config.monitoring_enabled {
            return self.inner.resolve(query).await;
        }

        let table = query.table().to_string();
        let operation = query.operation();
        self.notify_start(&table, operation);

        let start = Instant::now();
        let result = OBSERVING.scope(delegate, self.inner.resolve(query)).await;
        let duration = start.elapsed();

        let observation = match &result {
            Ok(_) => QueryObservation::succeeded(&self.label, table, operation, duration),
            Err(e) => {
                QueryObservation::failed(&self.label, table, operation, duration, e.to_string())
            }
        };
        self.report(&observation);

        result
    }
}

impl<E> std::ops::Deref for InstrumentedClient<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<E> std::fmt::Debug for InstrumentedClient<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedClient")
            .field("label", &self.label)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
