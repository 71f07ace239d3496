use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ledgerport_core::{Transaction, ValidationResult};
use ledgerport_import::{detect_field, field_label, import_file_async, write_csv, ImportConfig, ImportReport};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "ledgerport", about = "Normalize bank and bookkeeping exports into transactions.")]
struct Cli {
    /// Log pipeline decisions to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an XML, XLS or XLSX export and print the normalized transactions.
    Import {
        file: PathBuf,
        /// TOML import settings (header mode, sheet, date formats, column overrides)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Leave out rows that failed validation
        #[arg(long)]
        valid_only: bool,
    },
    /// Compute which rows of a long list must be rendered for a scroll position.
    Window {
        #[arg(long)]
        total: usize,
        /// Viewport height in pixels
        #[arg(long)]
        height: f64,
        #[arg(long)]
        row_height: Option<f64>,
        #[arg(long, default_value_t = 0.0)]
        scroll: f64,
        #[arg(long)]
        overscan: Option<usize>,
        /// TOML settings whose [window] section supplies row height and overscan
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show which field each header text maps to.
    Detect {
        #[arg(required = true)]
        headers: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Serialize)]
struct ImportOutput<'a> {
    kind: String,
    columns: Vec<&'static str>,
    valid: usize,
    invalid: usize,
    entries: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Entry<'a> {
    transaction: &'a Transaction,
    validation: &'a ValidationResult,
}

#[derive(Serialize)]
struct WindowOutput {
    start: usize,
    end: usize,
    top_offset: f64,
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default = if verbose {
        "ledgerport=debug,ledgerport_core=debug,ledgerport_import=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ImportConfig> {
    match path {
        Some(path) => ImportConfig::load(path).with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ImportConfig::default()),
    }
}

async fn run_import(
    file: &Path,
    config: ImportConfig,
    format: OutputFormat,
    valid_only: bool,
    out: &mut impl Write,
) -> Result<ImportReport> {
    let report = import_file_async(file, config).await.with_context(|| {
        format!("Failed to import {}", file.display())
    })?;
    tracing::debug!(rows = report.len(), "writing {:?} output", format);

    match format {
        OutputFormat::Json => {
            let output = ImportOutput {
                kind: report.kind.to_string(),
                columns: report.mapping.labels(),
                valid: report.valid_count(),
                invalid: report.invalid_count(),
                entries: report
                    .entries()
                    .filter(|(_, result)| !valid_only || result.valid)
                    .map(|(transaction, validation)| Entry { transaction, validation })
                    .collect(),
            };
            serde_json::to_writer_pretty(&mut *out, &output)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut *out, &report, valid_only)?,
    }
    Ok(report)
}

/// Flags win over the `[window]` settings in `config`.
fn run_window(
    config: &ImportConfig,
    total: usize,
    height: f64,
    row_height: Option<f64>,
    scroll: f64,
    overscan: Option<usize>,
    out: &mut impl Write,
) -> Result<WindowOutput> {
    let mut viewport = config.viewport(total, height, scroll);
    if let Some(row_height) = row_height {
        viewport.row_height = row_height;
    }
    if let Some(overscan) = overscan {
        viewport.overscan = overscan;
    }
    let range = viewport.window();
    let output = WindowOutput {
        start: range.start,
        end: range.end,
        top_offset: viewport.top_offset(),
    };
    serde_json::to_writer(&mut *out, &output)?;
    writeln!(out)?;
    Ok(output)
}

fn run_detect(headers: &[String], out: &mut impl Write) -> Result<()> {
    for header in headers {
        writeln!(out, "{header}\t{}", field_label(detect_field(Some(header))))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Import {
            file,
            config,
            format,
            valid_only,
        } => {
            let config = load_config(config.as_deref())?;
            let report = run_import(&file, config, format, valid_only, &mut out).await?;
            if report.invalid_count() > 0 {
                tracing::warn!(invalid = report.invalid_count(), "some rows failed validation");
            }
        }
        Commands::Window {
            total,
            height,
            row_height,
            scroll,
            overscan,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            run_window(&config, total, height, row_height, scroll, overscan, &mut out)?;
        }
        Commands::Detect { headers } => run_detect(&headers, &mut out)?,
    }
    Ok(())
}
