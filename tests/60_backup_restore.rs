
use serde_json::{json, Value};
use uuid::Uuid;

use bizops_api::backend::{MemoryBackend, Row};
use bizops_api::backup::{self, BackupError, ExportOptions, RestoreOptions, Snapshot};

fn rows(values: Vec<Value>) -> Vec<Row> {
    values.into_iter().filter_map(|v| v.as_object().cloned()).collect()
}

struct Seeded {
    source: MemoryBackend,
    tenant_a: Uuid,
    tenant_b: Uuid,
}

/// Two tenants, each with products and one order of two items
async fn seeded() -> Seeded {
    let source = MemoryBackend::new();
    let (tenant_a, tenant_b) = (Uuid::new_v4(), Uuid::new_v4());
    source
        .seed("tenants", rows(vec![json!({ "id": tenant_a, "name": "Shop A" }), json!({ "id": tenant_b, "name": "Shop B" })]))
        .await;

    for tenant in [tenant_a, tenant_b] {
        let products: Vec<Value> = (0..5)
            .map(|i| json!({ "id": Uuid::new_v4(), "tenant_id": tenant, "name": format!("SP {}", i), "stock_quantity": i }))
            .collect();
        source.seed("products", rows(products)).await;

        let order = Uuid::new_v4();
        source
            .seed("orders", rows(vec![json!({ "id": order, "tenant_id": tenant, "code": "DH01", "status": "completed" })]))
            .await;
        source
            .seed(
                "order_items",
                rows(vec![
                    json!({ "id": Uuid::new_v4(), "order_id": order, "product_id": Uuid::new_v4(), "quantity": 1 }),
                    json!({ "id": Uuid::new_v4(), "order_id": order, "product_id": Uuid::new_v4(), "quantity": 2 }),
                ]),
            )
            .await;
    }
    source
        .seed(
            "social_connections",
            rows(vec![json!({
                "tenant_id": tenant_a, "platform": "facebook", "page_id": "1", "access_token": "t", "is_active": true
            })]),
        )
        .await;

    Seeded { source, tenant_a, tenant_b }
}

fn export_all() -> ExportOptions {
    ExportOptions { tenant_id: None, tables: None, page_size: 3 }
}

fn restore_all(batch_size: usize) -> RestoreOptions {
    RestoreOptions { tables: None, dry_run: false, batch_size }
}

fn table<'a>(snapshot: &'a Snapshot, name: &str) -> &'a backup::TableDump {
    snapshot.tables.iter().find(|t| t.name == name).unwrap()
}

#[tokio::test]
async fn export_pages_through_every_table() {
    let s = seeded().await;
    let snapshot = backup::export(&s.source, &export_all()).await.unwrap();

    assert_eq!(table(&snapshot, "products").row_count, 10);
    assert_eq!(table(&snapshot, "order_items").row_count, 4);
    assert_eq!(table(&snapshot, "salaries").row_count, 0);
    assert_eq!(snapshot.row_count(), 2 + 10 + 2 + 4 + 1);
    for dump in &snapshot.tables {
        dump.verify().unwrap();
    }
    assert_eq!(s.source.write_count(), 0);
}

#[tokio::test]
async fn restore_writes_in_batches_and_can_be_repeated() {
    let s = seeded().await;
    let snapshot = backup::export(&s.source, &export_all()).await.unwrap();
    let target = MemoryBackend::new();

    let report = backup::restore(&target, &snapshot, &restore_all(4)).await.unwrap();
    let products = report.tables.iter().find(|t| t.table == "products").unwrap();
    assert_eq!((products.rows, products.batches), (10, 3));
    assert_eq!(report.row_count(), snapshot.row_count());
    assert_eq!(target.rows("products").await.len(), 10);
    assert_eq!(target.rows("order_items").await.len(), 4);

    // Upserts on the conflict key leave a rerun with the same rows
    backup::restore(&target, &snapshot, &restore_all(4)).await.unwrap();
    assert_eq!(target.rows("products").await.len(), 10);
    assert_eq!(target.rows("social_connections").await.len(), 1);
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let s = seeded().await;
    let snapshot = backup::export(&s.source, &export_all()).await.unwrap();
    let target = MemoryBackend::new();

    let options = RestoreOptions { dry_run: true, ..restore_all(500) };
    let report = backup::restore(&target, &snapshot, &options).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.row_count(), snapshot.row_count());
    assert_eq!(target.write_count(), 0);
}

#[tokio::test]
async fn tampered_snapshot_is_rejected_before_any_write() {
    let s = seeded().await;
    let mut snapshot = backup::export(&s.source, &export_all()).await.unwrap();
    let items = snapshot.tables.iter_mut().find(|t| t.name == "order_items").unwrap();
    items.rows[0].insert("quantity".into(), json!(999));

    let target = MemoryBackend::new();
    let err = backup::restore(&target, &snapshot, &restore_all(500)).await.unwrap_err();

    assert!(matches!(err, BackupError::ChecksumMismatch { ref table, .. } if table == "order_items"));
    assert_eq!(target.write_count(), 0);
}

#[tokio::test]
async fn tenant_export_follows_order_items_through_orders() {
    let s = seeded().await;
    let options = ExportOptions { tenant_id: Some(s.tenant_a), ..export_all() };
    let snapshot = backup::export(&s.source, &options).await.unwrap();

    assert_eq!(snapshot.tenant_id, Some(s.tenant_a));
    assert_eq!(table(&snapshot, "tenants").row_count, 1);
    assert_eq!(table(&snapshot, "products").row_count, 5);
    assert_eq!(table(&snapshot, "order_items").row_count, 2);

    let b = s.tenant_b.to_string();
    let leaked = snapshot
        .tables
        .iter()
        .flat_map(|t| t.rows.iter())
        .any(|r| r.get("tenant_id").and_then(Value::as_str) == Some(b.as_str()) || r.get("id").and_then(Value::as_str) == Some(b.as_str()));
    assert!(!leaked);
}

#[tokio::test]
async fn selected_tables_and_snapshot_files() {
    let s = seeded().await;
    let options = ExportOptions { tables: Some(vec!["orders".into(), "products".into()]), ..export_all() };
    let snapshot = backup::export(&s.source, &options).await.unwrap();
    let names: Vec<&str> = snapshot.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["products", "orders"]);

    let path = std::env::temp_dir().join(format!("bizops-backup-{}.json", Uuid::new_v4()));
    snapshot.write_to(&path).unwrap();
    let loaded = Snapshot::read_from(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let target = MemoryBackend::new();
    let only_orders = RestoreOptions { tables: Some(vec!["orders".into()]), ..restore_all(500) };
    let report = backup::restore(&target, &loaded, &only_orders).await.unwrap();
    assert_eq!(report.tables.len(), 1);
    assert_eq!(target.rows("orders").await.len(), 2);
    assert!(target.rows("products").await.is_empty());

    let unknown = ExportOptions { tables: Some(vec!["auth.users".into()]), ..export_all() };
    assert!(matches!(backup::export(&s.source, &unknown).await, Err(BackupError::UnknownTable(_))));
}
