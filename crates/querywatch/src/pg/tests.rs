use super::executor::shape;
use super::*;
use crate::builder::QueryExecutorExt;
use crate::error::QueryError;
use crate::executor::QueryExecutor;
use crate::monitor::QueryOperation;
use crate::query::{FilterOp, Query, Resolution};
use serde_json::{Value, json};
use std::convert::Infallible;

// Builds queries through the public surface without running them.
struct Recorder;

impl QueryExecutor for Recorder {
    type Output = ();
    type Error = Infallible;

    async fn resolve(&self, _query: Query) -> Result<(), Infallible> {
        Ok(())
    }
}

const AGG: &str = "SELECT coalesce(jsonb_agg(to_jsonb(_qw_rows)), '[]'::jsonb) FROM ";

#[test]
fn select_with_filter_order_and_limit() {
    let query = Recorder
        .from("users")
        .select("id, email")
        .eq("id", 42)
        .order("created_at", false)
        .limit(10)
        .into_query();

    let sql = compile(&query).unwrap();
    assert_eq!(
        sql.to_sql(),
        format!(
            "{AGG}(SELECT {users}.{id}, {users}.\"email\" FROM {users} \
             WHERE {users}.{id} = (jsonb_populate_record(NULL::{users}, $1::jsonb)).{id} \
             ORDER BY {users}.\"created_at\" DESC LIMIT $2) _qw_rows",
            users = r#""users""#,
            id = r#""id""#,
        )
    );
    assert_eq!(sql.param_count(), 2);
}

#[test]
fn select_star_projects_all_columns() {
    let query = Recorder.from("public.chats").select("*").into_query();
    let sql = compile(&query).unwrap();
    assert_eq!(
        sql.to_sql(),
        format!(r#"{AGG}(SELECT "public"."chats".* FROM "public"."chats") _qw_rows"#)
    );
    assert_eq!(sql.param_count(), 0);
}

#[test]
fn pattern_and_null_filters() {
    let query = Recorder
        .from("users")
        .select("*")
        .ilike("email", "%@example.com")
        .is_null("deleted_at")
        .into_query();

    let sql = compile(&query).unwrap().to_sql();
    assert!(sql.contains(r#"WHERE "users"."email"::text ILIKE $1 AND "users"."deleted_at" IS NULL"#));
}

#[test]
fn empty_in_list_matches_nothing() {
    let query = Recorder
        .from("users")
        .select("*")
        .in_list("id", Vec::<i64>::new())
        .into_query();
    let sql = compile(&query).unwrap();
    assert!(sql.to_sql().contains("WHERE FALSE"));
    assert_eq!(sql.param_count(), 0);
}

#[test]
fn in_filter_requires_array() {
    let query = Query::new("users", QueryOperation::Select).with_filter("id", FilterOp::In, json!(1));
    assert!(compile(&query).unwrap_err().is_validation());
}

#[test]
fn insert_many_rows_uses_union_of_keys() {
    let query = Recorder
        .from("messages")
        .insert(json!([{ "chat_id": 1, "body": "hi" }, { "chat_id": 2 }]))
        .into_query();

    let sql = compile(&query).unwrap();
    assert_eq!(
        sql.to_sql(),
        format!(
            "WITH _qw_rows AS (INSERT INTO {t} ({cols}) SELECT {cols} \
             FROM jsonb_populate_recordset(NULL::{t}, $1::jsonb) RETURNING {t}.*) \
             {AGG}_qw_rows",
            t = r#""messages""#,
            cols = r#""body", "chat_id""#,
        )
    );
    assert_eq!(sql.param_count(), 1);
}

#[test]
fn insert_quotes_mixed_case_keys() {
    let query = Recorder
        .from("events")
        .insert(json!({ "userId": 1 }))
        .into_query();
    let sql = compile(&query).unwrap().to_sql();
    assert!(sql.contains(r#"INSERT INTO "events" ("userId") SELECT "userId" FROM"#));
}

#[test]
fn insert_empty_array_is_a_no_op_statement() {
    let query = Recorder.from("messages").insert(json!([])).into_query();
    assert_eq!(compile(&query).unwrap().to_sql(), "SELECT '[]'::jsonb");
}

#[test]
fn insert_single_empty_row_uses_defaults() {
    let query = Recorder.from("audit").insert(json!({})).into_query();
    let sql = compile(&query).unwrap().to_sql();
    assert!(sql.contains(r#"INSERT INTO "audit" DEFAULT VALUES RETURNING "audit".*"#));
}

#[test]
fn insert_rejects_scalar_payload() {
    let query = Recorder.from("messages").insert(json!(3)).into_query();
    assert!(compile(&query).unwrap_err().is_validation());
}

#[test]
fn upsert_with_conflict_target() {
    let query = Recorder
        .from("profiles")
        .upsert(json!({ "id": 1, "name": "a" }))
        .on_conflict("id")
        .into_query();

    let sql = compile(&query).unwrap();
    assert_eq!(
        sql.to_sql(),
        format!(
            "WITH _qw_rows AS (INSERT INTO {t} ({cols}) SELECT {cols} \
             FROM jsonb_populate_recordset(NULL::{t}, $1::jsonb) \
             ON CONFLICT ({id}) DO UPDATE SET {name} = EXCLUDED.{name} RETURNING {t}.*) \
             {AGG}_qw_rows",
            t = r#""profiles""#,
            cols = r#""id", "name""#,
            id = r#""id""#,
            name = r#""name""#,
        )
    );
}

#[test]
fn upsert_defaults_to_primary_key_constraint() {
    let query = Recorder
        .from("profiles")
        .upsert(json!({ "id": 1, "name": "a" }))
        .into_query();
    let sql = compile(&query).unwrap().to_sql();
    assert!(sql.contains(
        r#"ON CONFLICT ON CONSTRAINT "profiles_pkey" DO UPDATE SET "id" = EXCLUDED."id", "name" = EXCLUDED."name""#
    ));
}

#[test]
fn upsert_ignoring_duplicates_does_nothing() {
    let query = Recorder
        .from("profiles")
        .upsert(json!({ "id": 1 }))
        .ignore_duplicates()
        .into_query();
    let sql = compile(&query).unwrap().to_sql();
    assert!(sql.contains("ON CONFLICT DO NOTHING RETURNING"));
}

#[test]
fn update_sets_payload_columns() {
    let query = Recorder
        .from("chats")
        .update(json!({ "title": "renamed" }))
        .eq("id", 5)
        .into_query();

    let sql = compile(&query).unwrap();
    assert_eq!(
        sql.to_sql(),
        format!(
            "WITH _qw_rows AS (UPDATE {t} SET {title} = _qw_payload.{title} \
             FROM jsonb_populate_record(NULL::{t}, $1::jsonb) AS _qw_payload \
             WHERE {t}.{id} = (jsonb_populate_record(NULL::{t}, $2::jsonb)).{id} \
             RETURNING {t}.*) {AGG}_qw_rows",
            t = r#""chats""#,
            title = r#""title""#,
            id = r#""id""#,
        )
    );
    assert_eq!(sql.param_count(), 2);
}

#[test]
fn update_and_delete_require_filters() {
    let update = Recorder.from("chats").update(json!({ "title": "x" })).into_query();
    let delete = Recorder.from("chats").delete().into_query();
    assert!(compile(&update).unwrap_err().is_validation());
    assert!(compile(&delete).unwrap_err().is_validation());
}

#[test]
fn update_requires_non_empty_object() {
    let query = Recorder.from("chats").update(json!({})).eq("id", 1).into_query();
    assert!(compile(&query).unwrap_err().is_validation());
}

#[test]
fn delete_with_in_list_and_returning() {
    let query = Recorder
        .from("sessions")
        .delete()
        .in_list("id", [1, 2])
        .returning("id")
        .into_query();

    let sql = compile(&query).unwrap();
    assert_eq!(
        sql.to_sql(),
        format!(
            "WITH _qw_rows AS (DELETE FROM {t} WHERE {t}.{id} IN \
             (SELECT _qw_in.{id} FROM jsonb_populate_recordset(NULL::{t}, $1::jsonb) AS _qw_in) \
             RETURNING {t}.{id}) {AGG}_qw_rows",
            t = r#""sessions""#,
            id = r#""id""#,
        )
    );
}

#[test]
fn reserved_words_are_quoted() {
    let insert = Recorder
        .from("user")
        .insert(json!({ "order": 1, "group": "a" }))
        .into_query();
    assert_eq!(
        compile(&insert).unwrap().to_sql(),
        format!(
            r#"WITH _qw_rows AS (INSERT INTO "user" ("group", "order") SELECT "group", "order" FROM jsonb_populate_recordset(NULL::"user", $1::jsonb) RETURNING "user".*) {AGG}_qw_rows"#
        )
    );

    let update = Recorder
        .from("items")
        .update(json!({ "order": 2 }))
        .eq("check", true)
        .into_query();
    let sql = compile(&update).unwrap().to_sql();
    assert!(sql.contains(r#"UPDATE "items" SET "order" = _qw_payload."order" FROM"#));
    assert!(sql.contains(r#"WHERE "items"."check" = (jsonb_populate_record(NULL::"items", $2::jsonb))."check""#));

    let select = Recorder
        .from("group")
        .select("default, order")
        .order("order", true)
        .into_query();
    let sql = compile(&select).unwrap().to_sql();
    assert!(sql.contains(r#"SELECT "group"."default", "group"."order" FROM "group" ORDER BY "group"."order" ASC"#));
}

#[test]
fn mutations_reject_order_and_limit() {
    let query = Recorder
        .from("sessions")
        .delete()
        .eq("id", 1)
        .limit(1)
        .into_query();
    assert!(compile(&query).unwrap_err().is_validation());
}

#[test]
fn invalid_identifiers_are_rejected() {
    let table = Recorder.from("users; DROP TABLE users").select("*").into_query();
    assert!(compile(&table).unwrap_err().is_validation());

    let column = Recorder.from("users").select("id, 1bad").into_query();
    assert!(compile(&column).unwrap_err().is_validation());

    let qualified = Recorder.from("users").select("*").eq("users.id", 1).into_query();
    assert!(compile(&qualified).unwrap_err().is_validation());
}

#[test]
fn ident_parsing_and_resolution() {
    let ident = Ident::parse("public.users").unwrap();
    assert_eq!(ident.to_sql(), r#""public"."users""#);
    assert_eq!(ident.name(), "users");

    let quoted = Ident::parse(r#""Camel""Case""#).unwrap();
    assert_eq!(quoted.name(), "Camel\"Case");
    assert_eq!(quoted.to_sql(), r#""Camel""Case""#);

    let folded = Ident::column("Email").unwrap();
    assert_eq!(folded.name(), "email");
    assert_eq!(folded.to_sql(), r#""email""#);
    assert!(Ident::parse("users.").is_err());
    assert!(Ident::parse("\"unclosed").is_err());
}

#[test]
fn shape_follows_resolution() {
    let rows = json!([{ "id": 1 }]);
    assert_eq!(shape(rows.clone(), Resolution::Many).unwrap(), rows);
    assert_eq!(
        shape(rows.clone(), Resolution::Single).unwrap(),
        json!({ "id": 1 })
    );
    assert_eq!(
        shape(rows, Resolution::MaybeSingle).unwrap(),
        json!({ "id": 1 })
    );

    assert!(matches!(
        shape(json!([]), Resolution::Single),
        Err(QueryError::NotFound(_))
    ));
    assert_eq!(shape(json!([]), Resolution::MaybeSingle).unwrap(), Value::Null);
    assert!(matches!(
        shape(json!([{}, {}]), Resolution::MaybeSingle),
        Err(QueryError::TooManyRows { expected: 1, got: 2 })
    ));
    assert!(matches!(
        shape(json!({}), Resolution::Many),
        Err(QueryError::Decode(_))
    ));
}
