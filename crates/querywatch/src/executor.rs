//! The query executor capability.

use crate::monitor::QueryOperation;
use crate::query::Query;
use std::sync::Arc;

/// Something that can build and resolve table queries.
///
/// Adapters implement this over a real database client; decorators such as
/// [`InstrumentedClient`](crate::InstrumentedClient) implement it by delegating to
/// another executor. Call sites use the chainable surface from
/// [`QueryExecutorExt`](crate::QueryExecutorExt) and never see which one they hold.
pub trait QueryExecutor: Send + Sync {
    /// Value produced by a successful terminal step.
    type Output: Send;
    /// Error produced by a failed terminal step.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start a query for `table`.
    ///
    /// The default implementation returns an empty [`Query`].
    fn build_query(&self, table: &str, operation: QueryOperation) -> Query {
        Query::new(table, operation)
    }

    /// Run the terminal step of a built query.
    fn resolve(
        &self,
        query: Query,
    ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send;
}

impl<E: QueryExecutor> QueryExecutor for &E {
    type Output = E::Output;
    type Error = E::Error;

    fn build_query(&self, table: &str, operation: QueryOperation) -> Query {
        (**self).build_query(table, operation)
    }

    fn resolve(
        &self,
        query: Query,
    ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
        (**self).resolve(query)
    }
}

impl<E: QueryExecutor> QueryExecutor for Arc<E> {
    type Output = E::Output;
    type Error = E::Error;

    fn build_query(&self, table: &str, operation: QueryOperation) -> Query {
        (**self).build_query(table, operation)
    }

    fn resolve(
        &self,
        query: Query,
    ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
        (**self).resolve(query)
    }
}
