use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::BackupError;
use crate::backend::Row;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Set when the backup was limited to one tenant
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    pub tables: Vec<TableDump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDump {
    pub name: String,
    pub row_count: usize,
    /// Hex SHA-256 of the canonical JSON of `rows`
    pub checksum: String,
    pub rows: Vec<Row>,
}

impl TableDump {
    pub fn new(name: &str, rows: Vec<Row>) -> Self {
        Self {
            name: name.to_string(),
            row_count: rows.len(),
            checksum: checksum(&rows),
            rows,
        }
    }

    pub fn verify(&self) -> Result<(), BackupError> {
        let actual = checksum(&self.rows);
        if actual != self.checksum || self.row_count != self.rows.len() {
            return Err(BackupError::ChecksumMismatch {
                table: self.name.clone(),
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

impl Snapshot {
    pub fn new(tenant_id: Option<Uuid>, tables: Vec<TableDump>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            tenant_id,
            tables,
        }
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.row_count).sum()
    }

    pub fn write_to(&self, path: &Path) -> Result<(), BackupError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, BackupError> {
        let file = std::fs::File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(BackupError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }
}

pub fn checksum(rows: &[Row]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"[");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        hasher.update(canonical_json(&Value::Object(row.clone())).as_bytes());
    }
    hasher.update(b"]");
    format!("{:x}", hasher.finalize())
}

/// Compact JSON with object keys sorted, so equal data always hashes the same
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn canonical_form_ignores_key_order() {
        let a = json!({ "b": 2, "a": { "y": [1, "x"], "x": null } });
        assert_eq!(canonical_json(&a), r#"{"a":{"x":null,"y":[1,"x"]},"b":2}"#);

        let r1 = row(json!({ "id": "1", "name": "Áo thun" }));
        let r2 = row(json!({ "name": "Áo thun", "id": "1" }));
        assert_eq!(checksum(&[r1]), checksum(&[r2]));
    }

    #[test]
    fn tampered_rows_fail_verification() {
        let mut dump = TableDump::new("products", vec![row(json!({ "id": "1", "stock_quantity": 5 }))]);
        assert!(dump.verify().is_ok());

        dump.rows[0].insert("stock_quantity".into(), json!(500));
        assert!(matches!(dump.verify(), Err(BackupError::ChecksumMismatch { .. })));
    }

    #[test]
    fn snapshot_file_roundtrip_keeps_checksums() {
        let dir = std::env::temp_dir().join(format!("bizops-snapshot-{}", Uuid::new_v4()));
        let path = dir.join("backup.json");
        let snapshot = Snapshot::new(None, vec![TableDump::new("debts", vec![row(json!({ "id": "d1" }))])]);
        snapshot.write_to(&path).unwrap();

        let loaded = Snapshot::read_from(&path).unwrap();
        assert_eq!(loaded.row_count(), 1);
        loaded.tables[0].verify().unwrap();
        std::fs::remove_dir_all(dir).ok();
    }
}
