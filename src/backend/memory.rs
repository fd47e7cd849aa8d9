use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{validate_identifier, Backend, BackendError, Filter, Query, Row, SortDirection};

/// Process-local tables with the same row semantics as the hosted backend.
///
/// Missing `id` and `created_at` columns are filled on insert, the way the
/// hosted schema defaults do.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table without counting as a write
    pub async fn seed(&self, table: &str, rows: Vec<Row>) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Snapshot of a table's current rows
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    /// Number of write calls (insert/upsert/update/delete) served
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn fill_defaults(mut row: Row) -> Row {
    if !row.contains_key("id") {
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
    if !row.contains_key("created_at") {
        row.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
    row
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError> {
        validate_identifier(table)?;
        query.validate()?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, BackendError> {
        validate_identifier(table)?;
        self.record_write();

        let stored: Vec<Row> = rows.into_iter().map(fill_defaults).collect();
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn upsert(&self, table: &str, rows: Vec<Row>, on_conflict: &[&str]) -> Result<usize, BackendError> {
        validate_identifier(table)?;
        for column in on_conflict {
            validate_identifier(column)?;
        }
        self.record_write();

        let keys: Vec<&str> = if on_conflict.is_empty() { vec!["id"] } else { on_conflict.to_vec() };
        let count = rows.len();
        let mut tables = self.tables.write().await;
        let existing = tables.entry(table.to_string()).or_default();

        for row in rows {
            let position = existing
                .iter()
                .position(|r| keys.iter().all(|k| row.get(*k).is_some() && r.get(*k) == row.get(*k)));
            match position {
                Some(i) => {
                    for (k, v) in row {
                        existing[i].insert(k, v);
                    }
                }
                None => existing.push(fill_defaults(row)),
            }
        }
        Ok(count)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>, BackendError> {
        validate_identifier(table)?;
        filter.validate()?;
        if filter.is_empty() {
            return Err(BackendError::UnfilteredWrite("update", table.to_string()));
        }
        self.record_write();

        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, BackendError> {
        validate_identifier(table)?;
        filter.validate()?;
        if filter.is_empty() {
            return Err(BackendError::UnfilteredWrite("delete", table.to_string()));
        }
        self.record_write();

        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok(before - rows.len())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn upsert_merges_on_conflict_key() {
        let backend = MemoryBackend::new();
        let key = ["tenant_id", "platform", "page_id"];
        backend
            .upsert("social_connections", vec![row(json!({"tenant_id": "t", "platform": "facebook", "page_id": "1", "access_token": "a"}))], &key)
            .await
            .unwrap();
        backend
            .upsert("social_connections", vec![row(json!({"tenant_id": "t", "platform": "facebook", "page_id": "1", "access_token": "b"}))], &key)
            .await
            .unwrap();

        let rows = backend.rows("social_connections").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["access_token"], "b");
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn select_orders_and_pages() {
        let backend = MemoryBackend::new();
        backend
            .seed("products", (1..=5).map(|i| row(json!({"id": i, "tenant_id": "t"}))).collect())
            .await;

        let query = Query::filtered(Filter::new().eq("tenant_id", "t"))
            .order_by("id", SortDirection::Desc)
            .page(2, 1);
        let rows = backend.select("products", &query).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn unfiltered_delete_is_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.delete("orders", &Filter::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::UnfilteredWrite("delete", _)));
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn insert_fills_generated_columns() {
        let backend = MemoryBackend::new();
        let stored = backend.insert("finance_entries", vec![row(json!({"amount": "10"}))]).await.unwrap();
        assert!(stored[0].contains_key("id"));
        assert!(stored[0].contains_key("created_at"));
    }
}
