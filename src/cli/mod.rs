pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "bizops")]
#[command(about = "BizOps CLI - backup, restore and payroll tooling for the BizOps backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, conflicts_with = "json", help = "Output in human-readable text format (default)")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Export tables to a JSON snapshot file")]
    Backup(commands::backup::BackupArgs),

    #[command(about = "Restore tables from a JSON snapshot file")]
    Restore(commands::backup::RestoreArgs),

    #[command(about = "Salary calculation")]
    Payroll {
        #[command(subcommand)]
        cmd: commands::payroll::PayrollCommands,
    },

    #[command(about = "Development access tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        match (cli.text, cli.json) {
            (false, true) => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Backup(args) => commands::backup::handle_backup(args, output_format).await,
        Commands::Restore(args) => commands::backup::handle_restore(args, output_format).await,
        Commands::Payroll { cmd } => commands::payroll::handle(cmd, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_restore_flags() {
        let cli = Cli::parse_from(["bizops", "--json", "restore", "snap.json", "--dry-run", "--tables", "orders,order_items"]);
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Restore(args) => {
                assert!(args.dry_run);
                assert_eq!(args.tables, Some(vec!["orders".to_string(), "order_items".to_string()]));
            }
            _ => panic!("expected restore"),
        }
    }

    #[test]
    fn text_and_json_flags_select_output() {
        let tenant = "7f8d0c3e-6a52-4a7e-9a51-0d5c2b1e4f10";
        let text = Cli::parse_from(["bizops", "--text", "token", "issue", "--tenant", tenant]);
        assert_eq!(OutputFormat::from_cli(&text), OutputFormat::Text);

        let default = Cli::parse_from(["bizops", "token", "issue", "--tenant", tenant]);
        assert_eq!(OutputFormat::from_cli(&default), OutputFormat::Text);

        let both = Cli::try_parse_from(["bizops", "--text", "--json", "token", "issue", "--tenant", tenant]);
        assert!(both.is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
