//! Query monitoring for table query executors.
//!
//! This module provides:
//! - [`InstrumentedClient`], a decorator timing every terminal resolution
//! - [`QueryObservation`], the per-query measurement it emits
//! - [`QueryMonitor`] and a few ready-made monitors (logging, statistics, composite)
//! - [`MonitorConfig`] for the slow query threshold and on/off switch
//!
//! # Example
//!
//! ```rust,ignore
//! use querywatch::monitor::{InstrumentedClient, MonitorConfig, StatsMonitor};
//! use querywatch::{InMemoryCollector, QueryExecutorExt};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let admin = InstrumentedClient::new(pg_executor, "admin")
//!     .with_config(MonitorConfig::new().with_slow_query_threshold(Duration::from_millis(250)))
//!     .with_collector(InMemoryCollector::new())
//!     .with_monitor_arc(stats.clone());
//!
//! let chats = admin.from("chats").select("*").limit(50).await?;
//! println!("{:?}", stats.stats());
//! ```

mod config;
mod instrumented;
mod monitors;
mod types;


pub use config::{DEFAULT_SLOW_QUERY_THRESHOLD, MONITORING_ENV, MonitorConfig, SLOW_QUERY_MS_ENV};
pub use instrumented::{InstrumentedClient, wrap};
pub use monitors::{CompositeMonitor, LoggingMonitor, NoopMonitor, QueryStats, StatsMonitor};
pub use types::{QueryMonitor, QueryObservation, QueryOperation, metric_key};
