use std::path::Path;

use ledgerport_core::{Field, Viewport, UNMAPPED};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Column {index}: unknown field '{name}'")]
    UnknownField { index: usize, name: String },
}

/// Where the column names of an import come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMode {
    /// Markup element names when the rows were written as per-field tags, else the first row.
    #[default]
    Auto,
    FirstRow,
    /// Every row is data; only manual column overrides assign fields.
    None,
}

/// Manual assignment of one column, applied after detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOverride {
    pub index: usize,
    /// Field name, or `"–"` to leave the column unmapped.
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub row_height: f64,
    pub overscan: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            row_height: 40.0,
            overscan: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub header: HeaderMode,
    /// Worksheet to read; the first one when unset.
    pub sheet: Option<String>,
    /// Extra chrono formats tried before the built-in date formats.
    pub date_formats: Vec<String>,
    pub columns: Vec<ColumnOverride>,
    pub window: WindowConfig,
}

impl ImportConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ImportConfig = toml::from_str(toml_content)?;
        config.overrides()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Column overrides resolved to fields; `None` means "force unmapped".
    pub fn overrides(&self) -> Result<Vec<(usize, Option<Field>)>, ConfigError> {
        self.columns
            .iter()
            .map(|col| {
                let name = col.field.trim();
                if name.is_empty() || name == UNMAPPED || name == "-" {
                    return Ok((col.index, None));
                }
                name.parse::<Field>()
                    .map(|field| (col.index, Some(field)))
                    .map_err(|_| ConfigError::UnknownField {
                        index: col.index,
                        name: name.to_string(),
                    })
            })
            .collect()
    }

    /// Viewport for a list of `total` rows using the configured row height and overscan.
    pub fn viewport(&self, total: usize, container_height: f64, scroll_top: f64) -> Viewport {
        Viewport {
            total,
            container_height,
            row_height: self.window.row_height,
            scroll_top,
            overscan: self.window.overscan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ImportConfig::from_toml("").unwrap();
        assert_eq!(config, ImportConfig::default());
        assert_eq!(config.header, HeaderMode::Auto);
        assert_eq!(config.window.row_height, 40.0);
        assert_eq!(config.window.overscan, 5);
    }

    #[test]
    fn full_config() {
        let toml = r#"
header = "first_row"
sheet = "Export"
date_formats = ["%d/%m/%Y"]

[[columns]]
index = 2
field = "Income"

[[columns]]
index = 4
field = "check_number"

[[columns]]
index = 0
field = "–"

[window]
row_height = 32.0
"#;
        let config = ImportConfig::from_toml(toml).unwrap();
        assert_eq!(config.header, HeaderMode::FirstRow);
        assert_eq!(config.sheet.as_deref(), Some("Export"));
        assert_eq!(config.date_formats, vec!["%d/%m/%Y".to_string()]);
        assert_eq!(
            config.overrides().unwrap(),
            vec![(2, Some(Field::Income)), (4, Some(Field::CheckNumber)), (0, None)]
        );
        assert_eq!(config.window.row_height, 32.0);
        assert_eq!(config.window.overscan, 5);
    }

    #[test]
    fn unknown_override_field_is_rejected() {
        let toml = "[[columns]]\nindex = 1\nfield = \"Amount\"\n";
        match ImportConfig::from_toml(toml) {
            Err(ConfigError::UnknownField { index, name }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "Amount");
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn bad_header_mode_is_a_toml_error() {
        assert!(matches!(
            ImportConfig::from_toml("header = \"sometimes\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header = \"none\"").unwrap();
        let config = ImportConfig::load(file.path()).unwrap();
        assert_eq!(config.header, HeaderMode::None);

        assert!(matches!(
            ImportConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn viewport_uses_window_settings() {
        let config = ImportConfig::default();
        let vp = config.viewport(1000, 400.0, 800.0);
        assert_eq!(vp.row_height, 40.0);
        assert_eq!(vp.overscan, 5);
        // Row 20 is at the top; five rows of overscan above it.
        assert_eq!(vp.window().start, 15);
    }
}
