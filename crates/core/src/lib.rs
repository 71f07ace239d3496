pub mod field;
pub mod money;
pub mod transaction;
pub mod window;

pub use field::{match_header, Field, FieldSchema, UnknownField, SCHEMA, UNMAPPED};
pub use money::Money;
pub use transaction::{parse_calendar_date, validate, Transaction, TransactionId, ValidationResult};
pub use window::{compute_window, top_offset, Viewport, WindowRange};
