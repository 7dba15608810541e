//! Built table queries.
//!
//! A [`Query`] is the inert description an executor resolves: which table, which
//! operation, the filters and modifiers picked up along the builder chain, and how the
//! result should be shaped.

use crate::monitor::QueryOperation;
use serde_json::Value;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// column = value
    Eq,
    /// column <> value
    Neq,
    /// column > value
    Gt,
    /// column >= value
    Gte,
    /// column < value
    Lt,
    /// column <= value
    Lte,
    /// column LIKE pattern
    Like,
    /// column ILIKE pattern
    Ilike,
    /// column IS NULL
    IsNull,
    /// column IN (values)
    In,
}

/// A single WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column to compare.
    pub column: String,
    /// Comparison.
    pub op: FilterOp,
    /// Operand (`null` for `IsNull`, an array for `In`, a string for patterns).
    pub value: Value,
}

/// Sort order for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to sort by.
    pub column: String,
    /// Ascending when true.
    pub ascending: bool,
}

/// How the terminal step shapes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// All matching rows.
    #[default]
    Many,
    /// Exactly one row; zero or several rows is an error.
    Single,
    /// At most one row; zero rows resolves to nothing.
    MaybeSingle,
}

/// A fully built table query, ready to be resolved by an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) table: String,
    pub(crate) operation: QueryOperation,
    pub(crate) columns: Option<String>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) orders: Vec<Order>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) payload: Option<Value>,
    pub(crate) on_conflict: Vec<String>,
    pub(crate) ignore_duplicates: bool,
    pub(crate) resolution: Resolution,
}

impl Query {
    /// Create an empty query for `table` and `operation`.
    pub fn new(table: impl Into<String>, operation: QueryOperation) -> Self {
        Self {
            table: table.into(),
            operation,
            columns: None,
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            payload: None,
            on_conflict: Vec::new(),
            ignore_duplicates: false,
            resolution: Resolution::Many,
        }
    }

    /// Target table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Operation kind.
    pub fn operation(&self) -> QueryOperation {
        self.operation
    }

    /// Selected (or returned) column list; `None` means all columns.
    pub fn columns(&self) -> Option<&str> {
        self.columns.as_deref()
    }

    /// WHERE predicates, combined with AND.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// ORDER BY terms.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Row limit.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Row offset.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Rows to insert/upsert or the column values to update.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Upsert conflict target columns.
    pub fn on_conflict(&self) -> &[String] {
        &self.on_conflict
    }

    /// Whether an upsert skips conflicting rows instead of updating them.
    pub fn ignores_duplicates(&self) -> bool {
        self.ignore_duplicates
    }

    /// Result shaping of the terminal step.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Replace the column list.
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Add a predicate.
    pub fn with_filter(mut self, column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// Set the result shaping.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}
