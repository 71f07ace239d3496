use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::grid::RawGrid;
use crate::{markup, spreadsheet};

/// Which step of an import failed, so callers can word an actionable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    /// The import settings are unusable; nothing was read.
    Configuration,
    /// The file could not be read from disk.
    Read,
    /// The extension is not one we parse; nothing was read.
    FormatRejection,
    /// The content is not a well-formed workbook or markup document.
    StructuralParse,
    /// The document parsed but holds no rows.
    EmptyResult,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::Configuration => write!(f, "configuration"),
            ImportStage::Read => write!(f, "read"),
            ImportStage::FormatRejection => write!(f, "format rejection"),
            ImportStage::StructuralParse => write!(f, "structural parse"),
            ImportStage::EmptyResult => write!(f, "empty result"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unsupported file format: '{0}' (expected xml, xls or xlsx)")]
    UnsupportedFormat(String),
    #[error("Malformed markup: {0}")]
    MalformedMarkup(String),
    #[error("Malformed spreadsheet: {0}")]
    MalformedSpreadsheet(String),
    #[error("Worksheet not found: {0}")]
    SheetNotFound(String),
    #[error("No data rows found")]
    NoDataFound,
}

impl ParseError {
    pub fn stage(&self) -> ImportStage {
        match self {
            ParseError::UnsupportedFormat(_) => ImportStage::FormatRejection,
            ParseError::MalformedMarkup(_)
            | ParseError::MalformedSpreadsheet(_)
            | ParseError::SheetNotFound(_) => ImportStage::StructuralParse,
            ParseError::NoDataFound => ImportStage::EmptyResult,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Xml,
    Xls,
    Xlsx,
}

impl FileKind {
    /// Accepts `xlsx`, `.XLSX` and friends; anything else is rejected.
    pub fn from_extension(ext: &str) -> Result<Self, ParseError> {
        let normalized = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "xml" => Ok(FileKind::Xml),
            "xls" => Ok(FileKind::Xls),
            "xlsx" => Ok(FileKind::Xlsx),
            _ => Err(ParseError::UnsupportedFormat(ext.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Xml => "xml",
            FileKind::Xls => "xls",
            FileKind::Xlsx => "xlsx",
        }
    }

    pub fn is_spreadsheet(self) -> bool {
        matches!(self, FileKind::Xls | FileKind::Xlsx)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Worksheet to read; the first sheet when unset. Ignored for markup.
    pub sheet: Option<String>,
}

/// Parse an export into a raw grid using the first worksheet.
pub fn parse(data: &[u8], extension: &str) -> Result<RawGrid, ParseError> {
    parse_with(data, extension, &ParseOptions::default())
}

pub fn parse_with(data: &[u8], extension: &str, options: &ParseOptions) -> Result<RawGrid, ParseError> {
    let kind = FileKind::from_extension(extension)?;
    parse_kind(data, kind, options)
}

pub fn parse_kind(data: &[u8], kind: FileKind, options: &ParseOptions) -> Result<RawGrid, ParseError> {
    tracing::debug!(%kind, bytes = data.len(), "parsing export");
    let grid = match kind {
        FileKind::Xls | FileKind::Xlsx => {
            spreadsheet::read_workbook(data, kind, options.sheet.as_deref())?
        }
        FileKind::Xml => markup::read_markup(data)?,
    };
    if grid.is_empty() {
        return Err(ParseError::NoDataFound);
    }
    tracing::debug!(%kind, rows = grid.len(), width = grid.width(), "parsed raw grid");
    Ok(grid)
}
