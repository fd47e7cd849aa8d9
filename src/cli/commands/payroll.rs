use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;

use crate::cli::utils::{output_success, print_rows};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::payroll::{compute_salary, CommissionPolicy, SalaryInput};

#[derive(Subcommand)]
pub enum PayrollCommands {
    #[command(about = "Compute a salary from a JSON input file ('-' reads stdin)")]
    Calc {
        #[arg(help = "Salary input JSON")]
        file: PathBuf,
    },
}

pub async fn handle(cmd: PayrollCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PayrollCommands::Calc { file } => {
            let raw = if file.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?
            };
            let input: SalaryInput = serde_json::from_str(&raw).context("parsing salary input")?;

            let policy = CommissionPolicy::from(&config().payroll);
            let breakdown = compute_salary(&input, &policy)?;

            if output_format == OutputFormat::Text {
                print_rows(
                    ("COMPONENT", "AMOUNT"),
                    [
                        ("actual_basic", breakdown.actual_basic),
                        ("livestream_total", breakdown.livestream_total),
                        ("media_total", breakdown.media_total),
                        ("media_actor_total", breakdown.media_actor_total),
                        ("kho_total", breakdown.kho_total),
                        ("kythuat_total", breakdown.kythuat_total),
                        ("sale_total", breakdown.sale_total),
                        ("bonus", breakdown.bonus),
                        ("deduction", -breakdown.deduction),
                        ("custom_total", breakdown.custom_total),
                    ]
                    .into_iter()
                    .map(|(name, amount)| (name, amount.to_string())),
                );
            }
            output_success(
                output_format,
                &format!("Salary {} for {}: {}", input.month, input.employee_id, breakdown.total_salary),
                Some(serde_json::to_value(&breakdown)?),
            )
        }
    }
}
