use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::{validate_identifier, Backend, BackendError, Filter, Query, Row, SortDirection};
use crate::config::BackendConfig;

/// Direct Postgres connection to the hosted database.
///
/// Rows travel as `jsonb` so one code path serves every table: filters are
/// containment checks against `to_jsonb(t)`, and writes go through
/// `jsonb_populate_recordset` so only the supplied columns are written.
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub async fn connect(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.database_url.is_empty() {
            return Err(BackendError::ConfigMissing("DATABASE_URL"));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.database_url)
            .await?;
        info!("Created Postgres pool ({} max connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Quote SQL identifier to prevent injection
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Union of the keys of every row, in stable order
fn column_set(rows: &[Row]) -> Result<Vec<String>, BackendError> {
    let columns: BTreeSet<&String> = rows.iter().flat_map(|r| r.keys()).collect();
    columns
        .into_iter()
        .map(|c| validate_identifier(c).map(|_| c.clone()))
        .collect()
}

fn column_list(columns: &[String], prefix: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| match prefix {
            Some(p) => format!("{}.{}", p, quote_identifier(c)),
            None => quote_identifier(c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn select_sql(table: &str, query: &Query) -> String {
    let order = match &query.order {
        Some((column, SortDirection::Asc)) => format!(" ORDER BY t.{} ASC", quote_identifier(column)),
        Some((column, SortDirection::Desc)) => format!(" ORDER BY t.{} DESC", quote_identifier(column)),
        None => String::new(),
    };
    format!(
        "SELECT to_jsonb(t) FROM {} AS t WHERE to_jsonb(t) @> $1::jsonb{} LIMIT $2 OFFSET $3",
        quote_identifier(table),
        order
    )
}

pub(crate) fn upsert_sql(table: &str, columns: &[String], on_conflict: &[&str]) -> String {
    let table_q = quote_identifier(table);
    let conflict: Vec<String> = on_conflict.iter().map(|c| quote_identifier(c)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !on_conflict.contains(&c.as_str()))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_identifier(c)))
        .collect();
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {table} ({cols}) SELECT {src} FROM jsonb_populate_recordset(NULL::{table}, $1::jsonb) AS r ON CONFLICT ({conflict}) {action}",
        table = table_q,
        cols = column_list(columns, None),
        src = column_list(columns, Some("r")),
        conflict = conflict.join(", "),
        action = action
    )
}

fn rows_from_values(values: Vec<Value>) -> Result<Vec<Row>, BackendError> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => Ok(map),
            other => Err(BackendError::Decode(format!("expected row object, got {}", other))),
        })
        .collect()
}

#[async_trait]
impl Backend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError> {
        validate_identifier(table)?;
        query.validate()?;

        let values: Vec<Value> = sqlx::query_scalar(&select_sql(table, query))
            .bind(query.filter.to_json_object())
            .bind(query.limit.map(|l| l as i64))
            .bind(query.offset.unwrap_or(0) as i64)
            .fetch_all(&self.pool)
            .await?;
        rows_from_values(values)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, BackendError> {
        validate_identifier(table)?;
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let columns = column_set(&rows)?;
        let table_q = quote_identifier(table);
        let sql = format!(
            "INSERT INTO {table} AS t ({cols}) SELECT {src} FROM jsonb_populate_recordset(NULL::{table}, $1::jsonb) AS r RETURNING to_jsonb(t)",
            table = table_q,
            cols = column_list(&columns, None),
            src = column_list(&columns, Some("r")),
        );

        let payload = Value::Array(rows.into_iter().map(Value::Object).collect());
        let values: Vec<Value> = sqlx::query_scalar(&sql).bind(payload).fetch_all(&self.pool).await?;
        rows_from_values(values)
    }

    async fn upsert(&self, table: &str, rows: Vec<Row>, on_conflict: &[&str]) -> Result<usize, BackendError> {
        validate_identifier(table)?;
        for column in on_conflict {
            validate_identifier(column)?;
        }
        if rows.is_empty() {
            return Ok(0);
        }
        let keys: Vec<&str> = if on_conflict.is_empty() { vec!["id"] } else { on_conflict.to_vec() };
        let columns = column_set(&rows)?;
        let sql = upsert_sql(table, &columns, &keys);

        let payload = Value::Array(rows.into_iter().map(Value::Object).collect());
        let result = sqlx::query(&sql).bind(payload).execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>, BackendError> {
        validate_identifier(table)?;
        filter.validate()?;
        if filter.is_empty() {
            return Err(BackendError::UnfilteredWrite("update", table.to_string()));
        }
        if patch.is_empty() {
            return self.select(table, &Query::filtered(filter.clone())).await;
        }
        let columns = column_set(std::slice::from_ref(&patch))?;
        let table_q = quote_identifier(table);
        let sql = format!(
            "UPDATE {table} AS t SET ({cols}) = (SELECT {src} FROM jsonb_populate_record(NULL::{table}, $2::jsonb) AS p) WHERE to_jsonb(t) @> $1::jsonb RETURNING to_jsonb(t)",
            table = table_q,
            cols = column_list(&columns, None),
            src = column_list(&columns, Some("p")),
        );

        let values: Vec<Value> = sqlx::query_scalar(&sql)
            .bind(filter.to_json_object())
            .bind(Value::Object(patch))
            .fetch_all(&self.pool)
            .await?;
        rows_from_values(values)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, BackendError> {
        validate_identifier(table)?;
        filter.validate()?;
        if filter.is_empty() {
            return Err(BackendError::UnfilteredWrite("delete", table.to_string()));
        }
        let sql = format!(
            "DELETE FROM {} AS t WHERE to_jsonb(t) @> $1::jsonb",
            quote_identifier(table)
        );
        let result = sqlx::query(&sql).bind(filter.to_json_object()).execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("orders"), "\"orders\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn select_sql_orders_by_quoted_column() {
        let query = Query::default().order_by("created_at", SortDirection::Desc);
        let sql = select_sql("orders", &query);
        assert!(sql.contains("FROM \"orders\" AS t"));
        assert!(sql.contains("ORDER BY t.\"created_at\" DESC"));
    }

    #[test]
    fn upsert_sql_skips_conflict_columns_in_update() {
        let columns = vec!["access_token".to_string(), "page_id".to_string(), "platform".to_string(), "tenant_id".to_string()];
        let sql = upsert_sql("social_connections", &columns, &["tenant_id", "platform", "page_id"]);
        assert!(sql.contains("ON CONFLICT (\"tenant_id\", \"platform\", \"page_id\")"));
        assert!(sql.contains("DO UPDATE SET \"access_token\" = EXCLUDED.\"access_token\""));
        assert!(!sql.contains("\"tenant_id\" = EXCLUDED"));
    }

    #[test]
    fn upsert_sql_with_only_key_columns_does_nothing_on_conflict() {
        let columns = vec!["id".to_string()];
        assert!(upsert_sql("products", &columns, &["id"]).ends_with("DO NOTHING"));
    }

    #[test]
    fn column_set_rejects_bad_keys() {
        let rows = vec![json!({"ok": 1, "Bad Key": 2}).as_object().cloned().unwrap()];
        assert!(column_set(&rows).is_err());
    }
}
