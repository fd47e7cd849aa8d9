//! Operator backup and restore against the configured backend.
//!
//! Tables are exported and restored in foreign-key dependency order. Export
//! pages through each table; restore verifies every checksum before the
//! first write, then upserts in fixed-size batches so a rerun is harmless.

pub mod snapshot;

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{Backend, BackendError, Filter, Query, Row, SortDirection};
use crate::models::social;

pub use snapshot::{checksum, Snapshot, TableDump};

/// How a table's rows are narrowed to one tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The row is the tenant itself
    TenantRow,
    /// `tenant_id` column
    Tenant,
    /// No tenant column; follow `column` to rows already exported from `parent`
    Parent { parent: &'static str, column: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub scope: Scope,
    pub conflict_key: &'static [&'static str],
}

const ID: &[&str] = &["id"];

/// Parents before children
pub const TABLE_ORDER: &[TableSpec] = &[
    TableSpec { name: "tenants", scope: Scope::TenantRow, conflict_key: ID },
    TableSpec { name: "profiles", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "employees", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "customers", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "suppliers", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "products", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "orders", scope: Scope::Tenant, conflict_key: ID },
    TableSpec {
        name: "order_items",
        scope: Scope::Parent { parent: "orders", column: "order_id" },
        conflict_key: ID,
    },
    TableSpec { name: "technical_jobs", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "warranties", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "debts", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "salaries", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: "finance_entries", scope: Scope::Tenant, conflict_key: ID },
    TableSpec { name: social::TABLE, scope: Scope::Tenant, conflict_key: &social::CONFLICT_KEY },
];

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Checksum mismatch for table {table}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn table_spec(name: &str) -> Result<&'static TableSpec, BackupError> {
    TABLE_ORDER
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| BackupError::UnknownTable(name.to_string()))
}

/// Requested tables in dependency order; `None` means all of them
pub fn select_tables(requested: Option<&[String]>) -> Result<Vec<&'static TableSpec>, BackupError> {
    let Some(requested) = requested else {
        return Ok(TABLE_ORDER.iter().collect());
    };
    for name in requested {
        table_spec(name)?;
    }
    Ok(TABLE_ORDER
        .iter()
        .filter(|t| requested.iter().any(|r| r == t.name))
        .collect())
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub tenant_id: Option<Uuid>,
    pub tables: Option<Vec<String>>,
    pub page_size: usize,
}

pub async fn export(backend: &dyn Backend, options: &ExportOptions) -> Result<Snapshot, BackupError> {
    let specs = select_tables(options.tables.as_deref())?;
    let page_size = options.page_size.max(1);
    let mut dumps: Vec<TableDump> = Vec::with_capacity(specs.len());

    for spec in specs {
        let rows = match (options.tenant_id, spec.scope) {
            (None, _) => read_all(backend, spec.name, Filter::new(), page_size).await?,
            (Some(tenant), Scope::TenantRow) => {
                read_all(backend, spec.name, Filter::new().eq("id", tenant.to_string()), page_size).await?
            }
            (Some(tenant), Scope::Tenant) => {
                read_all(backend, spec.name, Filter::new().eq("tenant_id", tenant.to_string()), page_size).await?
            }
            (Some(_), Scope::Parent { parent, column }) => {
                let parent_ids = match dumps.iter().find(|d| d.name == parent) {
                    Some(dump) => ids_of(&dump.rows),
                    None => {
                        tracing::warn!("Skipping {}: parent table {} not exported", spec.name, parent);
                        Vec::new()
                    }
                };
                let mut rows = Vec::new();
                for id in parent_ids {
                    rows.extend(read_all(backend, spec.name, Filter::new().eq(column, id), page_size).await?);
                }
                rows
            }
        };
        tracing::info!("Exported {} rows from {}", rows.len(), spec.name);
        dumps.push(TableDump::new(spec.name, rows));
    }

    Ok(Snapshot::new(options.tenant_id, dumps))
}

async fn read_all(backend: &dyn Backend, table: &str, filter: Filter, page_size: usize) -> Result<Vec<Row>, BackupError> {
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let query = Query::filtered(filter.clone())
            .order_by("id", SortDirection::Asc)
            .page(page_size, offset);
        let page = backend.select(table, &query).await?;
        let fetched = page.len();
        rows.extend(page);
        if fetched < page_size {
            return Ok(rows);
        }
        offset += fetched;
    }
}

fn ids_of(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|r| r.get("id").and_then(|v| v.as_str()).map(str::to_string))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub tables: Option<Vec<String>>,
    pub dry_run: bool,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub dry_run: bool,
    pub tables: Vec<TableReport>,
}

impl RestoreReport {
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

pub async fn restore(
    backend: &dyn Backend,
    snapshot: &Snapshot,
    options: &RestoreOptions,
) -> Result<RestoreReport, BackupError> {
    for dump in &snapshot.tables {
        table_spec(&dump.name)?;
    }
    let specs = select_tables(options.tables.as_deref())?;
    let batch_size = options.batch_size.max(1);

    let dumps: Vec<(&TableSpec, &TableDump)> = specs
        .into_iter()
        .filter_map(|spec| snapshot.tables.iter().find(|d| d.name == spec.name).map(|d| (spec, d)))
        .collect();

    // Nothing is written unless every selected table is intact
    for (_, dump) in &dumps {
        dump.verify()?;
    }

    let mut report = RestoreReport { dry_run: options.dry_run, tables: Vec::new() };
    for (spec, dump) in dumps {
        let batches = dump.rows.len().div_ceil(batch_size);
        if !options.dry_run {
            for (i, chunk) in dump.rows.chunks(batch_size).enumerate() {
                backend.upsert(spec.name, chunk.to_vec(), spec.conflict_key).await?;
                tracing::debug!("Restored {} batch {}/{}", spec.name, i + 1, batches);
            }
        }
        tracing::info!(
            "{} {} rows into {} ({} batches)",
            if options.dry_run { "Would restore" } else { "Restored" },
            dump.rows.len(),
            spec.name,
            batches
        );
        report.tables.push(TableReport { table: spec.name.to_string(), rows: dump.rows.len(), batches });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_follow_their_parents() {
        let position = |name: &str| TABLE_ORDER.iter().position(|t| t.name == name).unwrap();
        assert!(position("orders") < position("order_items"));
        assert!(position("products") < position("orders"));
        assert!(position("tenants") < position("employees"));
        assert!(position("employees") < position("salaries"));
    }

    #[test]
    fn selected_tables_keep_dependency_order() {
        let requested = vec!["order_items".to_string(), "orders".to_string()];
        let names: Vec<&str> = select_tables(Some(&requested)).unwrap().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["orders", "order_items"]);

        let unknown = vec!["pg_catalog".to_string()];
        assert!(matches!(select_tables(Some(&unknown)), Err(BackupError::UnknownTable(_))));
    }
}
