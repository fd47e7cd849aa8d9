use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::backend;
use crate::backup::{self, ExportOptions, RestoreOptions, Snapshot};
use crate::cli::utils::{output_success, print_rows};
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[arg(long, help = "Only export rows of this tenant")]
    pub tenant: Option<Uuid>,

    #[arg(long, help = "Snapshot file to write (default: <BACKUP_OUTPUT_DIR>/backup-<scope>-<timestamp>.json)")]
    pub out: Option<PathBuf>,

    #[arg(long, value_delimiter = ',', help = "Comma-separated subset of tables")]
    pub tables: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    #[arg(help = "Snapshot file produced by `bizops backup`")]
    pub file: PathBuf,

    #[arg(long, help = "Verify and count without writing")]
    pub dry_run: bool,

    #[arg(long, value_delimiter = ',', help = "Comma-separated subset of tables")]
    pub tables: Option<Vec<String>>,
}

pub async fn handle_backup(args: BackupArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let settings = config();
    let backend = backend::connect(&settings.backend).await.context("connecting to backend")?;

    let options = ExportOptions {
        tenant_id: args.tenant,
        tables: args.tables,
        page_size: settings.backup.page_size,
    };
    let snapshot = backup::export(backend.as_ref(), &options).await?;

    let path = args.out.unwrap_or_else(|| {
        let scope = args.tenant.map(|t| t.to_string()).unwrap_or_else(|| "all".to_string());
        PathBuf::from(&settings.backup.output_dir).join(format!(
            "backup-{}-{}.json",
            scope,
            snapshot.created_at.format("%Y%m%d-%H%M%S")
        ))
    });
    snapshot
        .write_to(&path)
        .with_context(|| format!("writing snapshot to {}", path.display()))?;

    if output_format == OutputFormat::Text {
        print_rows(("TABLE", "ROWS"), snapshot.tables.iter().map(|t| (t.name.as_str(), t.row_count.to_string())));
    }
    output_success(
        output_format,
        &format!("Backed up {} rows to {}", snapshot.row_count(), path.display()),
        Some(json!({
            "file": path.display().to_string(),
            "rows": snapshot.row_count(),
            "tables": snapshot.tables.iter().map(|t| json!({ "table": t.name, "rows": t.row_count, "checksum": t.checksum })).collect::<Vec<_>>(),
        })),
    )
}

pub async fn handle_restore(args: RestoreArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let settings = config();
    let snapshot = Snapshot::read_from(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let backend = backend::connect(&settings.backend).await.context("connecting to backend")?;

    let options = RestoreOptions {
        tables: args.tables,
        dry_run: args.dry_run,
        batch_size: settings.backup.batch_size,
    };
    let report = backup::restore(backend.as_ref(), &snapshot, &options).await?;

    if output_format == OutputFormat::Text {
        print_rows(
            ("TABLE", "ROWS / BATCHES"),
            report.tables.iter().map(|t| (t.table.as_str(), format!("{} / {}", t.rows, t.batches))),
        );
    }
    let verb = if report.dry_run { "Would restore" } else { "Restored" };
    output_success(
        output_format,
        &format!("{} {} rows from {}", verb, report.row_count(), args.file.display()),
        Some(serde_json::to_value(&report)?),
    )
}
