use crate::error::ConfigError;
use std::time::Duration;

/// Default threshold above which a query is logged as slow.
pub const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(500);

/// Environment variable overriding the slow query threshold, in milliseconds.
pub const SLOW_QUERY_MS_ENV: &str = "QUERYWATCH_SLOW_QUERY_MS";

/// Environment variable toggling monitoring (`true`/`false`, `1`/`0`, `on`/`off`).
pub const MONITORING_ENV: &str = "QUERYWATCH_MONITORING";

/// Configuration for query monitoring.
///
/// Monitoring is enabled by default with a 500ms slow query threshold.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Queries strictly slower than this are logged at `warn` and reported as slow.
    pub slow_query_threshold: Duration,
    /// Whether monitoring is enabled.
    pub monitoring_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
            monitoring_enabled: true,
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `QUERYWATCH_SLOW_QUERY_MS` and `QUERYWATCH_MONITORING`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(SLOW_QUERY_MS_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: SLOW_QUERY_MS_ENV,
                value: raw.clone(),
            })?;
            config.slow_query_threshold = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(MONITORING_ENV) {
            config.monitoring_enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: MONITORING_ENV,
                        value: raw,
                    });
                }
            };
        }

        Ok(config)
    }

    /// Set the slow query threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Enable monitoring.
    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    /// Disable monitoring.
    ///
    /// Queries still run through the wrapped client but produce no observations.
    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }

    /// Whether a query that took `duration` counts as slow.
    pub fn is_slow(&self, duration: Duration) -> bool {
        duration > self.slow_query_threshold
    }
}
