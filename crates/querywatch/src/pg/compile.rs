//! Compile a [`Query`] into one Postgres statement returning a JSONB array of rows.
//!
//! Every statement yields exactly one row with one `jsonb` column. Reads aggregate a
//! sub-select; writes aggregate a data-modifying CTE with `RETURNING`. Filter operands are
//! bound as JSON and converted to the column's type through
//! `jsonb_populate_record(NULL::<table>, ...)`, so comparisons keep the column's own
//! type and can use its indexes.

use super::sql::{Ident, Sql, write_quoted};
use crate::error::{QueryError, QueryResult};
use crate::monitor::QueryOperation;
use crate::query::{Filter, FilterOp, Query};
use serde_json::{Map, Value};

const ROWS_ALIAS: &str = "_qw_rows";
const PAYLOAD_ALIAS: &str = "_qw_payload";
const IN_ALIAS: &str = "_qw_in";

/// Build the statement for `query`.
pub fn compile(query: &Query) -> QueryResult<Sql> {
    let table = Ident::parse(query.table())?;

    if query.operation().is_mutation()
        && (!query.orders().is_empty() || query.limit().is_some() || query.offset().is_some())
    {
        return Err(QueryError::validation(format!(
            "order/limit/offset only apply to select queries, not {}",
            query.operation()
        )));
    }

    match query.operation() {
        QueryOperation::Select => compile_select(&table, query),
        QueryOperation::Insert | QueryOperation::Upsert => compile_insert(&table, query),
        QueryOperation::Update => compile_update(&table, query),
        QueryOperation::Delete => compile_delete(&table, query),
    }
}

/// Parsed column list: `None` means every column.
fn parse_columns(columns: Option<&str>) -> QueryResult<Option<Vec<Ident>>> {
    let Some(raw) = columns.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || raw == "*" {
        return Ok(None);
    }
    raw.split(',').map(Ident::column).collect::<QueryResult<Vec<_>>>().map(Some)
}

fn push_qualified(sql: &mut Sql, table: &Ident, column: &Ident) {
    sql.push_ident(table).push(".").push_ident(column);
}

fn push_column_list(sql: &mut Sql, table: Option<&Ident>, columns: &[Ident]) {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        match table {
            Some(table) => push_qualified(sql, table, column),
            None => {
                sql.push_ident(column);
            }
        }
    }
}

fn push_projection(sql: &mut Sql, table: &Ident, columns: Option<&[Ident]>) {
    match columns {
        Some(columns) => push_column_list(sql, Some(table), columns),
        None => {
            sql.push_ident(table).push(".*");
        }
    }
}

fn push_record_of(sql: &mut Sql, table: &Ident) {
    sql.push("NULL::").push_ident(table);
}

fn push_aggregate_head(sql: &mut Sql) {
    sql.push("SELECT coalesce(jsonb_agg(to_jsonb(");
    sql.push(ROWS_ALIAS);
    sql.push(")), '[]'::jsonb) FROM ");
}

fn push_filters(sql: &mut Sql, table: &Ident, filters: &[Filter]) -> QueryResult<()> {
    for (i, filter) in filters.iter().enumerate() {
        sql.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(sql, table, filter)?;
    }
    Ok(())
}

fn push_filter(sql: &mut Sql, table: &Ident, filter: &Filter) -> QueryResult<()> {
    let column = Ident::column(&filter.column)?;

    let comparison = match filter.op {
        FilterOp::Eq => "=",
        FilterOp::Neq => "<>",
        FilterOp::Gt => ">",
        FilterOp::Gte => ">=",
        FilterOp::Lt => "<",
        FilterOp::Lte => "<=",
        FilterOp::Like | FilterOp::Ilike => {
            let pattern = match &filter.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            push_qualified(sql, table, &column);
            sql.push(if filter.op == FilterOp::Like {
                "::text LIKE "
            } else {
                "::text ILIKE "
            });
            sql.push_bind(pattern);
            return Ok(());
        }
        FilterOp::IsNull => {
            push_qualified(sql, table, &column);
            sql.push(" IS NULL");
            return Ok(());
        }
        FilterOp::In => {
            let Value::Array(values) = &filter.value else {
                return Err(QueryError::validation(format!(
                    "IN filter on '{}' needs an array of values",
                    filter.column
                )));
            };
            if values.is_empty() {
                sql.push("FALSE");
                return Ok(());
            }
            let records: Vec<Value> = values
                .iter()
                .map(|v| single_field(&column, v.clone()))
                .collect();
            push_qualified(sql, table, &column);
            sql.push(" IN (SELECT ").push(IN_ALIAS).push(".").push_ident(&column);
            sql.push(" FROM jsonb_populate_recordset(");
            push_record_of(sql, table);
            sql.push(", ");
            sql.push_bind(Value::Array(records));
            sql.push("::jsonb) AS ").push(IN_ALIAS).push(")");
            return Ok(());
        }
    };

    push_qualified(sql, table, &column);
    sql.push(" ").push(comparison).push(" (jsonb_populate_record(");
    push_record_of(sql, table);
    sql.push(", ");
    sql.push_bind(single_field(&column, filter.value.clone()));
    sql.push("::jsonb)).").push_ident(&column);
    Ok(())
}

fn single_field(column: &Ident, value: Value) -> Value {
    let mut object = Map::new();
    object.insert(column.name(), value);
    Value::Object(object)
}

fn to_i64(n: u64, what: &str) -> QueryResult<i64> {
    i64::try_from(n).map_err(|_| QueryError::validation(format!("{what} {n} is out of range")))
}

fn compile_select(table: &Ident, query: &Query) -> QueryResult<Sql> {
    let columns = parse_columns(query.columns())?;

    let mut sql = Sql::new("");
    push_aggregate_head(&mut sql);
    sql.push("(SELECT ");
    push_projection(&mut sql, table, columns.as_deref());
    sql.push(" FROM ").push_ident(table);
    push_filters(&mut sql, table, query.filters())?;

    for (i, order) in query.orders().iter().enumerate() {
        sql.push(if i == 0 { " ORDER BY " } else { ", " });
        push_qualified(&mut sql, table, &Ident::column(&order.column)?);
        sql.push(if order.ascending { " ASC" } else { " DESC" });
    }
    if let Some(limit) = query.limit() {
        sql.push(" LIMIT ").push_bind(to_i64(limit, "limit")?);
    }
    if let Some(offset) = query.offset() {
        sql.push(" OFFSET ").push_bind(to_i64(offset, "offset")?);
    }

    sql.push(") ").push(ROWS_ALIAS);
    Ok(sql)
}

/// Normalize an insert payload into rows plus the ordered union of their keys.
fn insert_rows(payload: Option<&Value>) -> QueryResult<(Vec<Value>, Vec<Ident>)> {
    let rows = match payload {
        Some(row @ Value::Object(_)) => vec![row.clone()],
        Some(Value::Array(rows)) => rows.clone(),
        _ => {
            return Err(QueryError::validation(
                "insert payload must be an object or an array of objects",
            ));
        }
    };

    let mut keys: Vec<String> = Vec::new();
    for row in &rows {
        let Value::Object(object) = row else {
            return Err(QueryError::validation(
                "insert payload must be an object or an array of objects",
            ));
        };
        for key in object.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }

    // Payload keys are exact column names, never case folded.
    let columns = keys
        .iter()
        .map(|key| Ident::parse(&quoted(key)))
        .collect::<QueryResult<Vec<_>>>()?;
    Ok((rows, columns))
}

fn quoted(name: &str) -> String {
    let mut out = String::new();
    write_quoted(&mut out, name);
    out
}

fn compile_insert(table: &Ident, query: &Query) -> QueryResult<Sql> {
    let (rows, columns) = insert_rows(query.payload())?;
    let returning = parse_columns(query.columns())?;

    if rows.is_empty() {
        return Ok(Sql::new("SELECT '[]'::jsonb"));
    }

    let mut sql = Sql::new("WITH ");
    sql.push(ROWS_ALIAS).push(" AS (INSERT INTO ").push_ident(table);

    if columns.is_empty() {
        if rows.len() > 1 || query.operation() == QueryOperation::Upsert {
            return Err(QueryError::validation(
                "insert payload rows have no columns",
            ));
        }
        sql.push(" DEFAULT VALUES");
    } else {
        sql.push(" (");
        push_column_list(&mut sql, None, &columns);
        sql.push(") SELECT ");
        push_column_list(&mut sql, None, &columns);
        sql.push(" FROM jsonb_populate_recordset(");
        push_record_of(&mut sql, table);
        sql.push(", ");
        sql.push_bind(Value::Array(rows));
        sql.push("::jsonb)");
    }

    if query.operation() == QueryOperation::Upsert {
        push_on_conflict(&mut sql, table, query, &columns)?;
    }

    sql.push(" RETURNING ");
    push_projection(&mut sql, table, returning.as_deref());
    sql.push(") ");
    push_aggregate_head(&mut sql);
    sql.push(ROWS_ALIAS);
    Ok(sql)
}

fn push_on_conflict(
    sql: &mut Sql,
    table: &Ident,
    query: &Query,
    columns: &[Ident],
) -> QueryResult<()> {
    let targets = query
        .on_conflict()
        .iter()
        .map(|c| Ident::column(c))
        .collect::<QueryResult<Vec<_>>>()?;

    let updates: Vec<&Ident> = columns
        .iter()
        .filter(|c| !targets.iter().any(|t| t.name() == c.name()))
        .collect();

    sql.push(" ON CONFLICT");
    let do_nothing = query.ignores_duplicates() || updates.is_empty();
    if !targets.is_empty() {
        sql.push(" (");
        push_column_list(sql, None, &targets);
        sql.push(")");
    } else if !do_nothing {
        // Without an explicit target, fall back to the conventional primary key name.
        let mut name = String::new();
        write_quoted(&mut name, &format!("{}_pkey", table.name()));
        sql.push(" ON CONSTRAINT ").push(&name);
    }

    if do_nothing {
        sql.push(" DO NOTHING");
        return Ok(());
    }

    sql.push(" DO UPDATE SET ");
    for (i, column) in updates.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(column).push(" = EXCLUDED.").push_ident(column);
    }
    Ok(())
}

fn require_filters(query: &Query) -> QueryResult<()> {
    if query.filters().is_empty() {
        return Err(QueryError::validation(format!(
            "{} on '{}' requires at least one filter",
            query.operation(),
            query.table()
        )));
    }
    Ok(())
}

fn compile_update(table: &Ident, query: &Query) -> QueryResult<Sql> {
    require_filters(query)?;
    let payload = match query.payload() {
        Some(Value::Object(object)) if !object.is_empty() => Value::Object(object.clone()),
        _ => {
            return Err(QueryError::validation(
                "update payload must be a non-empty object",
            ));
        }
    };
    let (_, columns) = insert_rows(Some(&payload))?;
    let returning = parse_columns(query.columns())?;

    let mut sql = Sql::new("WITH ");
    sql.push(ROWS_ALIAS).push(" AS (UPDATE ").push_ident(table).push(" SET ");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(column)
            .push(" = ")
            .push(PAYLOAD_ALIAS)
            .push(".")
            .push_ident(column);
    }
    sql.push(" FROM jsonb_populate_record(");
    push_record_of(&mut sql, table);
    sql.push(", ");
    sql.push_bind(payload);
    sql.push("::jsonb) AS ").push(PAYLOAD_ALIAS);
    push_filters(&mut sql, table, query.filters())?;
    sql.push(" RETURNING ");
    push_projection(&mut sql, table, returning.as_deref());
    sql.push(") ");
    push_aggregate_head(&mut sql);
    sql.push(ROWS_ALIAS);
    Ok(sql)
}

fn compile_delete(table: &Ident, query: &Query) -> QueryResult<Sql> {
    require_filters(query)?;
    let returning = parse_columns(query.columns())?;

    let mut sql = Sql::new("WITH ");
    sql.push(ROWS_ALIAS).push(" AS (DELETE FROM ").push_ident(table);
    push_filters(&mut sql, table, query.filters())?;
    sql.push(" RETURNING ");
    push_projection(&mut sql, table, returning.as_deref());
    sql.push(") ");
    push_aggregate_head(&mut sql);
    sql.push(ROWS_ALIAS);
    Ok(sql)
}
