use std::path::Path;
use std::sync::Arc;

use ledgerport_core::{Field, Money, Transaction, ValidationResult};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, HeaderMode, ImportConfig};
use crate::grid::RawGrid;
use crate::mapper::{detect_field, ColumnMapping};
use crate::normalize::Normalizer;
use crate::parser::{self, FileKind, ImportStage, ParseError, ParseOptions};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ImportError {
    pub fn stage(&self) -> ImportStage {
        match self {
            ImportError::Parse(e) => e.stage(),
            ImportError::Io(_) => ImportStage::Read,
            ImportError::Config(_) => ImportStage::Configuration,
        }
    }
}

/// Everything one import produced, in input row order.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub kind: FileKind,
    /// Column names the mapping was detected from, if any.
    pub header: Option<Vec<String>>,
    pub mapping: ColumnMapping,
    /// Data rows exactly as parsed, including cells no column was mapped for.
    pub rows: Vec<Vec<String>>,
    pub transactions: Vec<Transaction>,
    /// One entry per transaction, at the same index.
    pub results: Vec<ValidationResult>,
}

impl ImportReport {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.results.iter().filter(|r| r.valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.results.len() - self.valid_count()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Transaction, &ValidationResult)> {
        self.transactions.iter().zip(&self.results)
    }

    pub fn valid_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries().filter(|(_, r)| r.valid).map(|(tx, _)| tx)
    }

    /// Sum of one monetary field over the valid transactions, or `None` if it overflows.
    pub fn total(&self, field: Field) -> Option<Money> {
        self.valid_transactions()
            .filter_map(|tx| tx.amount(field))
            .try_fold(Money::zero(), Money::checked_add)
    }
}

/// Parse, map and normalize an export held in memory.
pub fn import_bytes(data: &[u8], extension: &str, config: &ImportConfig) -> Result<ImportReport, ImportError> {
    let kind = FileKind::from_extension(extension)?;
    let overrides = config.overrides()?;
    let options = ParseOptions {
        sheet: config.sheet.clone(),
    };
    let grid = parser::parse_kind(data, kind, &options)?;
    let report = build_report(kind, grid, config, &overrides);

    tracing::info!(
        %kind,
        rows = report.len(),
        valid = report.valid_count(),
        invalid = report.invalid_count(),
        "import finished"
    );
    Ok(report)
}

/// Import a file from disk. The extension is checked before the file is opened.
pub fn import_file(path: impl AsRef<Path>, config: &ImportConfig) -> Result<ImportReport, ImportError> {
    let path = path.as_ref();
    let extension = extension_of(path);
    FileKind::from_extension(extension)?;
    let data = std::fs::read(path)?;
    import_bytes(&data, extension, config)
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

struct ImportJob {
    data: Vec<u8>,
    extension: String,
    config: ImportConfig,
}

impl ImportJob {
    fn run(&self) -> Result<ImportReport, ImportError> {
        import_bytes(&self.data, &self.extension, &self.config)
    }
}

/// Run [`import_bytes`] on the blocking pool so large workbooks don't stall the runtime.
///
/// When the blocking worker is cancelled before it runs, the import is done in-process
/// instead; the result is the same either way.
pub async fn import_bytes_async(
    data: Vec<u8>,
    extension: String,
    config: ImportConfig,
) -> Result<ImportReport, ImportError> {
    FileKind::from_extension(&extension)?;

    let job = Arc::new(ImportJob { data, extension, config });
    let worker = Arc::clone(&job);
    match tokio::task::spawn_blocking(move || worker.run()).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            tracing::warn!(error = %err, "blocking worker unavailable, importing in-process");
            job.run()
        }
    }
}

pub async fn import_file_async(path: impl AsRef<Path>, config: ImportConfig) -> Result<ImportReport, ImportError> {
    let path = path.as_ref();
    let extension = extension_of(path).to_string();
    FileKind::from_extension(&extension)?;
    let data = tokio::fs::read(path).await?;
    import_bytes_async(data, extension, config).await
}

fn build_report(
    kind: FileKind,
    grid: RawGrid,
    config: &ImportConfig,
    overrides: &[(usize, Option<Field>)],
) -> ImportReport {
    let RawGrid { rows, element_names } = grid;

    let (header, rows) = match (config.header, element_names) {
        (HeaderMode::None, _) => (None, rows),
        (HeaderMode::Auto, Some(names)) if names_identify_fields(&names) => (Some(names), rows),
        _ => {
            let mut rows = rows.into_iter();
            let header = rows.next();
            (header, rows.collect::<Vec<_>>())
        }
    };

    let mapping = overrides
        .iter()
        .fold(ColumnMapping::from_header(header.as_deref()), |mapping, (idx, field)| {
            mapping.with_override(*idx, *field)
        });
    if mapping.mapped().next().is_none() {
        tracing::warn!(%kind, "no column could be mapped to a field");
    }

    let header_width = header.as_ref().map(Vec::len);
    let normalizer = Normalizer::new(config.date_formats.clone());
    let mut transactions = Vec::with_capacity(rows.len());
    let mut results = Vec::with_capacity(rows.len());

    for (seq, row) in rows.iter().enumerate() {
        let (tx, mut result) = normalizer.normalize(row, &mapping, seq);
        if let Some(width) = header_width {
            warn_on_extra_cells(row, width, &mapping, &mut result);
        }
        transactions.push(tx);
        results.push(result);
    }

    ImportReport {
        kind,
        header,
        mapping,
        rows,
        transactions,
        results,
    }
}

/// Generic tags such as `<col>` carry no header; the first row does.
fn names_identify_fields(names: &[String]) -> bool {
    names.iter().any(|name| detect_field(Some(name)).is_some())
}

/// Cells past the header that carry a value but no field are reported, not dropped.
fn warn_on_extra_cells(row: &[String], width: usize, mapping: &ColumnMapping, result: &mut ValidationResult) {
    let filled = row
        .iter()
        .enumerate()
        .skip(width)
        .filter(|(idx, cell)| mapping.field_at(*idx).is_none() && !cell.trim().is_empty())
        .count();
    if filled > 0 {
        result.warn(format!(
            "Row has {filled} value(s) beyond the {width} header column(s); they were kept but not mapped"
        ));
    }
}
