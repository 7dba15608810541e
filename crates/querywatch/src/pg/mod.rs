//! Postgres adapter for the table query surface.
//!
//! [`PgExecutor`] compiles each [`Query`](crate::Query) into a single parameterized
//! statement and runs it through any [`GenericClient`]: a `tokio_postgres::Client`, a
//! transaction, or (with the `pool` feature) a `deadpool_postgres` pool or pooled client.
//!
//! ```ignore
//! use querywatch::{PgExecutor, QueryExecutorExt, create_pool, wrap};
//!
//! let pool = create_pool(&std::env::var("DATABASE_URL")?)?;
//! let admin = wrap(PgExecutor::new(pool), "admin");
//!
//! let active = admin
//!     .from("subscriptions")
//!     .select("id, user_id, status")
//!     .eq("status", "active")
//!     .await?;
//! ```

mod client;
mod compile;
mod executor;
mod sql;

#[cfg(feature = "pool")]
mod pool;

#[cfg(test)]
mod tests;

pub use client::GenericClient;
pub use compile::compile;
pub use executor::PgExecutor;
pub use sql::{Ident, IdentPart, Sql};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
