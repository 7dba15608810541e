use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The kind of table operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperation {
    /// Read rows
    Select,
    /// Insert rows
    Insert,
    /// Update matching rows
    Update,
    /// Delete matching rows
    Delete,
    /// Insert or update on conflict
    Upsert,
}

impl QueryOperation {
    /// All operations, in declaration order.
    pub const ALL: [QueryOperation; 5] = [
        QueryOperation::Select,
        QueryOperation::Insert,
        QueryOperation::Update,
        QueryOperation::Delete,
        QueryOperation::Upsert,
    ];

    /// Lowercase name used in metric keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::Select => "select",
            QueryOperation::Insert => "insert",
            QueryOperation::Update => "update",
            QueryOperation::Delete => "delete",
            QueryOperation::Upsert => "upsert",
        }
    }

    /// Whether the operation writes data.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, QueryOperation::Select)
    }
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum length for error messages carried by a [`QueryObservation`].
const MAX_ERROR_LEN: usize = 512;

/// Truncate an error message to avoid monitoring data explosion.
pub(crate) fn truncate_error(msg: String) -> String {
    if msg.len() <= MAX_ERROR_LEN {
        return msg;
    }
    let mut end = MAX_ERROR_LEN;
    while end > 0 && !msg.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &msg[..end])
}

/// One recorded measurement of a single table operation.
///
/// Created when the operation's result becomes available and handed off to the metrics
/// collector, the logger and any monitors. Never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct QueryObservation {
    /// Label of the wrapped client that issued the query (e.g. `anon`, `admin`).
    pub client_label: String,
    /// Target table.
    pub table: String,
    /// Operation kind.
    pub operation: QueryOperation,
    /// Time spent in the terminal resolution step.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Whether the terminal step succeeded.
    pub success: bool,
    /// Error message for failed queries (truncated to 512 bytes).
    pub error_message: Option<String>,
    /// When the result became available.
    pub timestamp: DateTime<Utc>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl QueryObservation {
    /// A successful observation.
    pub fn succeeded(
        client_label: impl Into<String>,
        table: impl Into<String>,
        operation: QueryOperation,
        duration: Duration,
    ) -> Self {
        Self {
            client_label: client_label.into(),
            table: table.into(),
            operation,
            duration,
            success: true,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed observation carrying the error's message.
    pub fn failed(
        client_label: impl Into<String>,
        table: impl Into<String>,
        operation: QueryOperation,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(truncate_error(error.into())),
            ..Self::succeeded(client_label, table, operation, duration)
        }
    }

    /// Elapsed time in whole milliseconds.
    pub fn duration_millis(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Aggregation key: `<client_label>:<table>:<operation>`.
    pub fn metric_key(&self) -> String {
        metric_key(&self.client_label, &self.table, self.operation)
    }
}

/// Build the aggregation key for a client, table and operation.
pub fn metric_key(client_label: &str, table: &str, operation: QueryOperation) -> String {
    format!("{client_label}:{table}:{operation}")
}

impl fmt::Display for QueryObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {:?}",
            self.client_label, self.operation, self.table, self.duration
        )?;
        match &self.error_message {
            Some(e) => write!(f, " error: {e}"),
            None => Ok(()),
        }
    }
}

/// Trait for observing table query execution.
///
/// Implement this trait to collect statistics, log queries, or integrate
/// with observability systems. Monitors run after the metrics collector has been fed.
pub trait QueryMonitor: Send + Sync {
    /// Called right before the terminal step of a query runs.
    ///
    /// Default implementation does nothing.
    fn on_query_start(&self, _client_label: &str, _table: &str, _operation: QueryOperation) {}

    /// Called once per query after it resolves (success or failure).
    fn on_query_complete(&self, observation: &QueryObservation);

    /// Called when a query exceeded the slow query threshold.
    ///
    /// Default implementation does nothing. Override to add alerting.
    fn on_slow_query(&self, _observation: &QueryObservation) {}
}
