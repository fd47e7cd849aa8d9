use clap::Parser;
use tracing_subscriber::EnvFilter;

use bizops_api::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so --json output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_format = bizops_api::cli::OutputFormat::from_cli(&cli);

    if let Err(e) = bizops_api::cli::run(cli).await {
        let message = match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => format!("{e:?}"),
            _ => format!("{e:#}"),
        };
        bizops_api::cli::utils::output_error(output_format, &message, None)?;
        std::process::exit(1);
    }

    Ok(())
}
