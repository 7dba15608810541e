use super::types::{QueryMonitor, QueryObservation, QueryOperation};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::Level;

/// A no-op monitor that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _observation: &QueryObservation) {}
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            _ => tracing::trace!($($field)*),
        }
    };
}

/// A monitor that logs every completed query through `tracing`.
///
/// This is independent of the slow/failed logging the instrumented client always does;
/// use it when every query should show up in the logs (e.g. at `debug` in development).
#[derive(Debug, Clone)]
pub struct LoggingMonitor {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Minimum duration to log (filters out fast queries).
    pub min_duration: Option<Duration>,
}

impl Default for LoggingMonitor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            min_duration: None,
        }
    }
}

impl LoggingMonitor {
    /// Create a new logging monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Only log queries slower than this duration.
    pub fn min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = Some(duration);
        self
    }

    pub(crate) fn should_log(&self, duration: Duration) -> bool {
        self.min_duration.is_none_or(|min| duration >= min)
    }
}

impl QueryMonitor for LoggingMonitor {
    fn on_query_complete(&self, obs: &QueryObservation) {
        if !self.should_log(obs.duration) {
            return;
        }

        let error = obs.error_message.as_deref().unwrap_or("-");
        emit_at_level!(
            self.level,
            target: "querywatch.monitor",
            client = %obs.client_label,
            table = %obs.table,
            operation = %obs.operation,
            duration_ms = obs.duration_millis(),
            success = obs.success,
            error,
            "query completed"
        );
    }
}

/// A monitor that tracks query statistics.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    slow_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    upsert_count: AtomicU64,
    slowest: Mutex<Slowest>,
}

/// Longest observed duration and the metric key it belongs to, updated together.
#[derive(Debug, Default)]
struct Slowest {
    duration: Duration,
    key: Option<String>,
}

/// Collected query statistics.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    /// Total number of queries observed.
    pub total_queries: u64,
    /// Total number of failed queries.
    pub failed_queries: u64,
    /// Number of queries above the slow query threshold.
    pub slow_queries: u64,
    /// Total execution time.
    pub total_duration: Duration,
    /// Number of select queries.
    pub select_count: u64,
    /// Number of insert queries.
    pub insert_count: u64,
    /// Number of update queries.
    pub update_count: u64,
    /// Number of delete queries.
    pub delete_count: u64,
    /// Number of upsert queries.
    pub upsert_count: u64,
    /// Slowest query duration.
    pub max_duration: Duration,
    /// Metric key (`client:table:operation`) of the slowest query.
    pub slowest_query: Option<String>,
}

impl QueryStats {
    /// Count for one operation kind.
    pub fn count_for(&self, operation: QueryOperation) -> u64 {
        match operation {
            QueryOperation::Select => self.select_count,
            QueryOperation::Insert => self.insert_count,
            QueryOperation::Update => self.update_count,
            QueryOperation::Delete => self.delete_count,
            QueryOperation::Upsert => self.upsert_count,
        }
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl StatsMonitor {
    /// Create a new stats monitor.
    pub fn new() -> Self {
        Self::default()
    }

    fn slowest_slot(&self) -> std::sync::MutexGuard<'_, Slowest> {
        self.slowest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> QueryStats {
        let (max_duration, slowest_query) = {
            let slowest = self.slowest_slot();
            (slowest.duration, slowest.key.clone())
        };
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            slow_queries: self.slow_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            upsert_count: self.upsert_count.load(Ordering::Relaxed),
            max_duration,
            slowest_query,
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.total_queries.store(0, Ordering::Relaxed);
        self.failed_queries.store(0, Ordering::Relaxed);
        self.slow_queries.store(0, Ordering::Relaxed);
        self.total_duration_nanos.store(0, Ordering::Relaxed);
        self.select_count.store(0, Ordering::Relaxed);
        self.insert_count.store(0, Ordering::Relaxed);
        self.update_count.store(0, Ordering::Relaxed);
        self.delete_count.store(0, Ordering::Relaxed);
        self.upsert_count.store(0, Ordering::Relaxed);
        *self.slowest_slot() = Slowest::default();
    }

    fn counter_for(&self, operation: QueryOperation) -> &AtomicU64 {
        match operation {
            QueryOperation::Select => &self.select_count,
            QueryOperation::Insert => &self.insert_count,
            QueryOperation::Update => &self.update_count,
            QueryOperation::Delete => &self.delete_count,
            QueryOperation::Upsert => &self.upsert_count,
        }
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, obs: &QueryObservation) {
        let duration_nanos = saturating_nanos(obs.duration);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        let prev_total = self
            .total_duration_nanos
            .fetch_add(duration_nanos, Ordering::Relaxed);
        if prev_total.checked_add(duration_nanos).is_none() {
            // Saturate instead of wrapping on overflow.
            self.total_duration_nanos.store(u64::MAX, Ordering::Relaxed);
        }

        self.counter_for(obs.operation)
            .fetch_add(1, Ordering::Relaxed);

        if !obs.success {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }

        let mut slowest = self.slowest_slot();
        if obs.duration > slowest.duration {
            slowest.duration = obs.duration;
            slowest.key = Some(obs.metric_key());
        }
    }

    fn on_slow_query(&self, _obs: &QueryObservation) {
        self.slow_queries.fetch_add(1, Ordering::Relaxed);
    }
}

/// A composite monitor that delegates to multiple monitors.
pub struct CompositeMonitor {
    monitors: Vec<Arc<dyn QueryMonitor>>,
}

impl CompositeMonitor {
    /// Create an empty composite monitor.
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
        }
    }

    /// Add a monitor.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitors.push(Arc::new(monitor));
        self
    }

    /// Add an Arc-wrapped monitor.
    pub fn add_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    /// Number of monitors.
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Whether no monitor was added.
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl Default for CompositeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryMonitor for CompositeMonitor {
    fn on_query_start(&self, client_label: &str, table: &str, operation: QueryOperation) {
        for monitor in &self.monitors {
            monitor.on_query_start(client_label, table, operation);
        }
    }

    fn on_query_complete(&self, observation: &QueryObservation) {
        for monitor in &self.monitors {
            monitor.on_query_complete(observation);
        }
    }

    fn on_slow_query(&self, observation: &QueryObservation) {
        for monitor in &self.monitors {
            monitor.on_slow_query(observation);
        }
    }
}
