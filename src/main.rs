use anyhow::{Context, Result};
use clap::Parser;
use monitor_comisiones::{provider_config, run, HttpFetcher, Provider, RunOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "monitor-comisiones",
    about = "Refresh merchant fees for one provider in the record store",
    version
)]
struct Cli {
    /// Record store (JSON array of entities)
    #[arg(long, env = "COMISIONES_DATA_FILE", default_value = "data.json")]
    data_file: PathBuf,

    /// Published page carrying the "Actualizado: DD/MM/YY" stamp
    #[arg(long, env = "COMISIONES_INDEX_FILE", default_value = "index.html")]
    index_file: PathBuf,

    /// Leave the date stamp untouched
    #[arg(long)]
    skip_date_stamp: bool,

    /// Diagnostics level on stderr (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// mercadopago | bna | bapro | uala
    provider: Provider,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let opts = RunOptions {
        data_file: cli.data_file,
        index_file: cli.index_file,
        refresh_date_stamp: !cli.skip_date_stamp,
    };

    let config = provider_config(cli.provider);
    let summary = run(&config, &HttpFetcher::new(), &opts)
        .with_context(|| format!("{} update failed", cli.provider.name()))?;

    tracing::info!(
        provider = %summary.provider,
        updated = summary.updated(),
        persisted = summary.persisted,
        warnings = summary.warnings.len(),
        "run finished"
    );

    Ok(())
}
