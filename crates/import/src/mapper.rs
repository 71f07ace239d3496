use ledgerport_core::{match_header, Field, UNMAPPED};
use serde::{Deserialize, Serialize};

/// Detect the field a header names. Absent, empty and unrecognised headers map to nothing.
pub fn detect_field(header: Option<&str>) -> Option<Field> {
    header.and_then(match_header)
}

/// Display label for a detection result, using `"–"` for unmapped columns.
pub fn field_label(field: Option<Field>) -> &'static str {
    field.map(Field::name).unwrap_or(UNMAPPED)
}

/// Column index → field assignment for one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: Vec<Option<Field>>,
}

impl ColumnMapping {
    /// Detect a field for every header cell; without a header every column is unmapped.
    pub fn from_header(header: Option<&[String]>) -> Self {
        let Some(header) = header else {
            return ColumnMapping::default();
        };
        let columns: Vec<Option<Field>> = header
            .iter()
            .map(|text| detect_field(Some(text)))
            .collect();

        for (idx, (text, field)) in header.iter().zip(&columns).enumerate() {
            tracing::debug!(column = idx, header = %text, field = field_label(*field), "detected column");
        }
        ColumnMapping { columns }
    }

    /// `width` columns, none of them mapped.
    pub fn unmapped(width: usize) -> Self {
        ColumnMapping {
            columns: vec![None; width],
        }
    }

    /// Replace the assignment of one column, growing the mapping when `index` is past its end.
    pub fn with_override(mut self, index: usize, field: Option<Field>) -> Self {
        if index >= self.columns.len() {
            self.columns.resize(index + 1, None);
        }
        self.columns[index] = field;
        self
    }

    pub fn field_at(&self, index: usize) -> Option<Field> {
        self.columns.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Mapped columns as `(index, field)`, in column order.
    pub fn mapped(&self) -> impl Iterator<Item = (usize, Field)> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(idx, field)| field.map(|f| (idx, f)))
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains(&Some(field))
    }

    /// Labels for every column, `"–"` where nothing is mapped.
    pub fn labels(&self) -> Vec<&'static str> {
        self.columns.iter().map(|f| field_label(*f)).collect()
    }
}
