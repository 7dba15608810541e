use super::client::GenericClient;
use super::compile::compile;
use crate::error::{QueryError, QueryResult};
use crate::executor::QueryExecutor;
use crate::query::{Query, Resolution};
use serde_json::Value;

/// Table query executor backed by a Postgres client.
///
/// Rows come back as JSON objects keyed by column name. A [`Resolution::Many`] query
/// resolves to an array, [`Resolution::Single`] to one object, and
/// [`Resolution::MaybeSingle`] to one object or `null`.
pub struct PgExecutor<C> {
    client: C,
}

impl<C: GenericClient> PgExecutor<C> {
    /// Create an executor over `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// The underlying client, for anything outside the table query surface.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get the client, consuming this executor.
    pub fn into_client(self) -> C {
        self.client
    }
}

/// Shape an aggregated row array according to the query's resolution.
pub(crate) fn shape(rows: Value, resolution: Resolution) -> QueryResult<Value> {
    let mut rows = match rows {
        Value::Array(rows) => rows,
        other => {
            return Err(QueryError::Decode(format!(
                "expected a JSON array of rows, got {other}"
            )));
        }
    };

    match resolution {
        Resolution::Many => Ok(Value::Array(rows)),
        Resolution::Single => match rows.len() {
            0 => Err(QueryError::not_found("Expected 1 row, got 0")),
            1 => Ok(rows.swap_remove(0)),
            got => Err(QueryError::too_many_rows(1, got)),
        },
        Resolution::MaybeSingle => match rows.len() {
            0 => Ok(Value::Null),
            1 => Ok(rows.swap_remove(0)),
            got => Err(QueryError::too_many_rows(1, got)),
        },
    }
}

impl<C: GenericClient> QueryExecutor for PgExecutor<C> {
    type Output = Value;
    type Error = QueryError;

    async fn resolve(&self, query: Query) -> QueryResult<Value> {
        let sql = compile(&query)?;
        let statement = sql.to_sql();
        let params = sql.params_ref();

        let row = self.client.query_one(&statement, &params).await?;
        let rows = row
            .try_get::<_, Value>(0)
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        shape(rows, query.resolution())
    }
}
