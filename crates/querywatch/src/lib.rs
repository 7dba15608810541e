//! # querywatch
//!
//! Transparent latency and outcome tracking for table query builders.
//!
//! Wrap any [`QueryExecutor`] and every query built with it (`from(..).select(..)`,
//! `insert`, `update`, `delete`, `upsert`) is timed from the moment its terminal step
//! starts until it resolves. Each resolution produces one [`QueryObservation`]:
//!
//! - its duration goes to the [`MetricsCollector`] under `<label>:<table>:<operation>`
//! - slow queries (over 500ms by default) are logged at `warn`
//! - failed queries are logged at `error` and the error is handed back untouched
//!
//! Call sites keep using the same fluent surface and get the same results.
//!
//! # Example
//!
//! ```ignore
//! use querywatch::{PgExecutor, QueryExecutorExt, create_pool, wrap};
//!
//! let pool = create_pool(&std::env::var("DATABASE_URL")?)?;
//! let anon = wrap(PgExecutor::new(pool.clone()), "anon");
//! let admin = wrap(PgExecutor::new(pool), "admin");
//!
//! let profile = anon.from("profiles").select("*").eq("id", 7).maybe_single().await?;
//! admin.from("sessions").delete().lt("expires_at", "2024-01-01").await?;
//! ```
//!
//! # Features
//!
//! - `postgres` (default): the [`PgExecutor`] adapter over tokio-postgres
//! - `pool` (default): deadpool-postgres support for the adapter
//! - `metrics`: [`MetricsFacadeCollector`] forwarding samples to the `metrics` facade

pub mod builder;
pub mod collector;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod query;

#[cfg(feature = "postgres")]
pub mod pg;

pub use builder::{QueryBuilder, QueryExecutorExt, TableQuery};
pub use collector::{
    InMemoryCollector, MetricSummary, MetricsCollector, NoopCollector, global_collector,
    set_global_collector,
};
pub use error::{CollectorError, ConfigError, QueryError, QueryResult};
pub use executor::QueryExecutor;
pub use monitor::{
    CompositeMonitor, InstrumentedClient, LoggingMonitor, MonitorConfig, NoopMonitor,
    QueryMonitor, QueryObservation, QueryOperation, QueryStats, StatsMonitor, metric_key, wrap,
};
pub use query::{Filter, FilterOp, Order, Query, Resolution};

#[cfg(feature = "metrics")]
pub use collector::MetricsFacadeCollector;

#[cfg(feature = "postgres")]
pub use pg::{GenericClient, PgExecutor};

#[cfg(feature = "pool")]
pub use pg::{create_pool, create_pool_with_config, create_pool_with_manager_config};

// Re-export the client crates so users can name their types without adding them.
#[cfg(feature = "pool")]
pub use deadpool_postgres;
#[cfg(feature = "postgres")]
pub use tokio_postgres;
