//! Chainable table query surface.
//!
//! ```ignore
//! use querywatch::QueryExecutorExt;
//! use serde_json::json;
//!
//! let user = client
//!     .from("users")
//!     .select("id, email")
//!     .eq("id", 42)
//!     .single()
//!     .await?;
//!
//! client
//!     .from("messages")
//!     .insert(json!({ "chat_id": 7, "body": "hello" }))
//!     .execute()
//!     .await?;
//! ```
//!
//! Every builder resolves exactly once: both `.execute()` and `.await` consume it.

use crate::executor::QueryExecutor;
use crate::monitor::QueryOperation;
use crate::query::{Filter, FilterOp, Order, Query, Resolution};
use serde_json::Value;
use std::future::{Future, IntoFuture};
use std::pin::Pin;

/// Entry point of the chainable surface, available on every [`QueryExecutor`].
pub trait QueryExecutorExt: QueryExecutor + Sized {
    /// Start a query against `table`.
    fn from(&self, table: impl Into<String>) -> TableQuery<'_, Self> {
        TableQuery {
            executor: self,
            table: table.into(),
        }
    }
}

impl<E: QueryExecutor> QueryExecutorExt for E {}

/// A table picked on an executor; choose the operation next.
#[must_use]
pub struct TableQuery<'a, E> {
    executor: &'a E,
    table: String,
}

impl<'a, E: QueryExecutor> TableQuery<'a, E> {
    fn start(self, operation: QueryOperation) -> QueryBuilder<'a, E> {
        let query = self.executor.build_query(&self.table, operation);
        QueryBuilder {
            executor: self.executor,
            query,
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Read rows, returning `columns` (`"*"` for all).
    pub fn select(self, columns: impl Into<String>) -> QueryBuilder<'a, E> {
        let columns = columns.into();
        let mut builder = self.start(QueryOperation::Select);
        builder.query.columns = Some(columns);
        builder
    }

    /// Insert one row (JSON object) or several (JSON array of objects).
    pub fn insert(self, values: impl Into<Value>) -> QueryBuilder<'a, E> {
        let mut builder = self.start(QueryOperation::Insert);
        builder.query.payload = Some(values.into());
        builder
    }

    /// Update matching rows with the columns of a JSON object.
    pub fn update(self, values: impl Into<Value>) -> QueryBuilder<'a, E> {
        let mut builder = self.start(QueryOperation::Update);
        builder.query.payload = Some(values.into());
        builder
    }

    /// Delete matching rows.
    pub fn delete(self) -> QueryBuilder<'a, E> {
        self.start(QueryOperation::Delete)
    }

    /// Insert rows, updating existing ones on conflict.
    pub fn upsert(self, values: impl Into<Value>) -> QueryBuilder<'a, E> {
        let mut builder = self.start(QueryOperation::Upsert);
        builder.query.payload = Some(values.into());
        builder
    }
}

/// A query being built against an executor.
#[must_use = "queries do nothing unless executed or awaited"]
pub struct QueryBuilder<'a, E> {
    executor: &'a E,
    query: Query,
}

impl<'a, E: QueryExecutor> QueryBuilder<'a, E> {
    fn filter(mut self, column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.query.filters.push(Filter {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// `column = value`
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Eq, value.into())
    }

    /// `column <> value`
    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Neq, value.into())
    }

    /// `column > value`
    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gt, value.into())
    }

    /// `column >= value`
    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gte, value.into())
    }

    /// `column < value`
    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Lt, value.into())
    }

    /// `column <= value`
    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Lte, value.into())
    }

    /// `column LIKE pattern`
    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(column, FilterOp::Like, Value::String(pattern.into()))
    }

    /// `column ILIKE pattern`
    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(column, FilterOp::Ilike, Value::String(pattern.into()))
    }

    /// `column IS NULL`
    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(column, FilterOp::IsNull, Value::Null)
    }

    /// `column IN (values...)`
    pub fn in_list<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(column, FilterOp::In, Value::Array(values))
    }

    /// Sort by `column`.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.query.orders.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Return at most `n` rows.
    pub fn limit(mut self, n: u64) -> Self {
        self.query.limit = Some(n);
        self
    }

    /// Skip the first `n` rows.
    pub fn offset(mut self, n: u64) -> Self {
        self.query.offset = Some(n);
        self
    }

    /// Columns returned by a mutation (all columns by default).
    pub fn returning(mut self, columns: impl Into<String>) -> Self {
        self.query.columns = Some(columns.into());
        self
    }

    /// Conflict target columns for an upsert (comma separated).
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.query.on_conflict = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Skip conflicting rows instead of updating them (upsert only).
    pub fn ignore_duplicates(mut self) -> Self {
        self.query.ignore_duplicates = true;
        self
    }

    /// Resolve to exactly one row.
    pub fn single(mut self) -> Self {
        self.query.resolution = Resolution::Single;
        self
    }

    /// Resolve to zero or one row.
    pub fn maybe_single(mut self) -> Self {
        self.query.resolution = Resolution::MaybeSingle;
        self
    }

    /// The query built so far.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Take the built query without running it.
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Run the terminal step.
    pub async fn execute(self) -> Result<E::Output, E::Error> {
        self.executor.resolve(self.query).await
    }
}

impl<'a, E> IntoFuture for QueryBuilder<'a, E>
where
    E: QueryExecutor + 'a,
{
    type Output = Result<E::Output, E::Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}
