//! Access to the hosted relational backend.
//!
//! Every business table lives in one managed database and is scoped by a
//! `tenant_id` column. Callers talk to it through the [`Backend`] trait so
//! the same services run against the hosted REST interface, a direct
//! Postgres connection, or process-local tables.

pub mod memory;
pub mod postgres;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{BackendConfig, BackendKind};

pub use memory::MemoryBackend;
pub use postgres::PgBackend;
pub use rest::RestBackend;

/// One table row as returned by the backend
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Refusing unfiltered {0} on table {1}")]
    UnfilteredWrite(&'static str, String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Equality conditions joined with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| match row.get(column) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }

    /// JSON object used for containment queries
    pub fn to_json_object(&self) -> Value {
        let mut obj = Map::new();
        for (column, value) in &self.conditions {
            obj.insert(column.clone(), value.clone());
        }
        Value::Object(obj)
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        for (column, _) in &self.conditions {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn filtered(filter: Filter) -> Self {
        Self { filter, ..Default::default() }
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        self.filter.validate()?;
        if let Some((column, _)) = &self.order {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

/// Generic row-level interface of the hosted database.
///
/// Writes are serialized by the backend itself; nothing here holds a lock
/// across calls.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Insert rows and return them as stored (with generated columns)
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, BackendError>;

    /// Insert or merge rows keyed by `on_conflict`; returns rows written
    async fn upsert(&self, table: &str, rows: Vec<Row>, on_conflict: &[&str]) -> Result<usize, BackendError>;

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>, BackendError>;

    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, BackendError>;

    async fn health_check(&self) -> Result<(), BackendError>;

    async fn select_one(&self, table: &str, filter: Filter) -> Result<Option<Row>, BackendError> {
        let query = Query {
            filter,
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.select(table, &query).await?.into_iter().next())
    }
}

/// Build the backend selected by configuration
pub async fn connect(config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
    let backend: Arc<dyn Backend> = match config.kind {
        BackendKind::Rest => Arc::new(RestBackend::from_config(config)?),
        BackendKind::Postgres => Arc::new(PgBackend::connect(config).await?),
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
    };
    tracing::info!("Using {} backend", backend.name());
    Ok(backend)
}

/// Accepts lowercase SQL identifiers: `[a-z_][a-z0-9_]*`
pub fn validate_identifier(name: &str) -> Result<(), BackendError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(BackendError::InvalidIdentifier(name.to_string()))
    }
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, BackendError> {
    match serde_json::to_value(value).map_err(|e| BackendError::Decode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Decode(format!("expected object, got {}", other))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, BackendError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| BackendError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_identifiers() {
        assert!(validate_identifier("salaries").is_ok());
        assert!(validate_identifier("_meta_2").is_ok());
        assert!(validate_identifier("Salaries").is_err());
        assert!(validate_identifier("2fa").is_err());
        assert!(validate_identifier("orders; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn filter_matches_on_every_condition() {
        let filter = Filter::new().eq("tenant_id", "t1").eq("status", "draft");
        let row = json!({ "tenant_id": "t1", "status": "draft", "x": 1 });
        let other = json!({ "tenant_id": "t1", "status": "paid" });
        assert!(filter.matches(row.as_object().unwrap()));
        assert!(!filter.matches(other.as_object().unwrap()));
    }

    #[test]
    fn null_condition_matches_missing_column() {
        let filter = Filter::new().eq("deleted_at", Value::Null);
        assert!(filter.matches(json!({ "id": 1 }).as_object().unwrap()));
    }
}
