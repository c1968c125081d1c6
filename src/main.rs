// Simples Consulta - batch CLI
// Runs the same pipeline as the server, synchronously, against local files.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use simples_consulta::pipeline::process_workbook_with_progress;
use simples_consulta::registry::HttpRegistryClient;
use simples_consulta::workbook::results_to_csv;
use simples_consulta::Config;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simples-consulta")]
#[command(version)]
#[command(about = "Classify CNPJs month by month as Simples Nacional or other regime")]
struct Cli {
    /// Input spreadsheet (.xlsx, .xls, .ods or .csv) with a 'cnpj_part' column
    input: PathBuf,

    /// Output workbook (default: <input stem>_consulta.xlsx next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the result rows as CSV
    #[arg(long, value_name = "RESULTS.csv")]
    csv: Option<PathBuf>,

    /// First year of the reporting window (overrides START_YEAR)
    #[arg(long)]
    start_year: Option<i32>,

    /// Pause between registry lookups in milliseconds (overrides REQUEST_DELAY_MS)
    #[arg(long)]
    delay_ms: Option<u64>,
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "planilha".to_string());
    input.with_file_name(format!("{}_consulta.xlsx", stem))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,simples_consulta=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(year) = cli.start_year {
        config.batch.start_year = year;
    }
    if let Some(ms) = cli.delay_ms {
        config.batch.request_delay = Duration::from_millis(ms);
    }

    let input = fs::read(&cli.input)
        .with_context(|| format!("Failed to read input workbook: {}", cli.input.display()))?;
    let client =
        HttpRegistryClient::new(&config.registry).context("Failed to create registry client")?;

    info!(input = %cli.input.display(), "📂 processing");
    let today = Local::now().date_naive();
    let output = process_workbook_with_progress(&input, &client, &config.batch, today, |p| {
        info!("⏳ {}/{} CNPJs", p.processed, p.total)
    })?;

    let output_path = cli.output.unwrap_or_else(|| default_output(&cli.input));
    fs::write(&output_path, &output.workbook)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(rows = output.results.len(), "✓ workbook written to {}", output_path.display());

    if let Some(csv_path) = cli.csv {
        let bytes = results_to_csv(&output.rows())?;
        fs::write(&csv_path, bytes)
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        info!("✓ results CSV written to {}", csv_path.display());
    }

    Ok(())
}
