pub mod config;
pub mod export;
pub mod grid;
pub mod mapper;
mod markup;
pub mod normalize;
pub mod parser;
pub mod pipeline;
mod spreadsheet;

pub use config::{ColumnOverride, ConfigError, HeaderMode, ImportConfig, WindowConfig};
pub use export::write_csv;
pub use grid::RawGrid;
pub use mapper::{detect_field, field_label, ColumnMapping};
pub use normalize::{coerce_amount, normalize, Normalizer};
pub use parser::{parse, parse_with, FileKind, ImportStage, ParseError, ParseOptions};
pub use pipeline::{import_bytes, import_bytes_async, import_file_async, import_file, ImportError, ImportReport};
