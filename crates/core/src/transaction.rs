use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::field::Field;
use super::money::Money;

/// Stable identifier of an imported transaction.
///
/// Built from the creation time, the row's sequence index and a random component.
/// There is no way to change the id of an existing transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate(seq: usize) -> Self {
        let millis = Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple();
        TransactionId(format!("txn-{millis:x}-{seq}-{random}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    /// Raw date text as it appeared in the export.
    pub date: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub income: Money,
    pub expenses: Money,
    pub balance: Money,
    pub currency: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub account: Option<String>,
    pub payee: Option<String>,
    pub check_number: Option<String>,
    /// Identifier supplied by the bank, unrelated to `id`.
    pub transaction_id: Option<String>,
}

impl Transaction {
    /// An empty transaction carrying a freshly generated id.
    pub fn new(seq: usize) -> Self {
        Transaction {
            id: TransactionId::generate(seq),
            date: String::new(),
            description: None,
            category: None,
            subcategory: None,
            income: Money::zero(),
            expenses: Money::zero(),
            balance: Money::zero(),
            currency: None,
            reference: None,
            notes: None,
            account: None,
            payee: None,
            check_number: None,
            transaction_id: None,
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn amount(&self, field: Field) -> Option<Money> {
        match field {
            Field::Income => Some(self.income),
            Field::Expenses => Some(self.expenses),
            Field::Balance => Some(self.balance),
            _ => None,
        }
    }

    /// Text value of a non-monetary field. Empty strings read as absent.
    pub fn text(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Date => Some(&self.date),
            Field::Description => self.description.as_ref(),
            Field::Category => self.category.as_ref(),
            Field::Subcategory => self.subcategory.as_ref(),
            Field::Currency => self.currency.as_ref(),
            Field::Reference => self.reference.as_ref(),
            Field::Notes => self.notes.as_ref(),
            Field::Account => self.account.as_ref(),
            Field::Payee => self.payee.as_ref(),
            Field::CheckNumber => self.check_number.as_ref(),
            Field::TransactionId => self.transaction_id.as_ref(),
            Field::Income | Field::Expenses | Field::Balance => None,
        };
        value.map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Store raw text for a non-monetary field. Returns `false` for monetary fields.
    pub fn set_text(&mut self, field: Field, value: impl Into<String>) -> bool {
        let value = value.into();
        let slot = match field {
            Field::Date => {
                self.date = value;
                return true;
            }
            Field::Description => &mut self.description,
            Field::Category => &mut self.category,
            Field::Subcategory => &mut self.subcategory,
            Field::Currency => &mut self.currency,
            Field::Reference => &mut self.reference,
            Field::Notes => &mut self.notes,
            Field::Account => &mut self.account,
            Field::Payee => &mut self.payee,
            Field::CheckNumber => &mut self.check_number,
            Field::TransactionId => &mut self.transaction_id,
            Field::Income | Field::Expenses | Field::Balance => return false,
        };
        *slot = Some(value);
        true
    }

    /// Store an amount for a monetary field. Returns `false` for any other field.
    pub fn set_amount(&mut self, field: Field, amount: Money) -> bool {
        match field {
            Field::Income => self.income = amount,
            Field::Expenses => self.expenses = amount,
            Field::Balance => self.balance = amount,
            _ => return false,
        }
        true
    }

    pub fn is_valid(&self) -> bool {
        validate(self, &[]).valid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Non-fatal notes about the row, e.g. cells that were coerced to zero.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Check the validity rules: a real calendar date and at least one non-zero amount.
///
/// `date_formats` are chrono format strings tried before the built-in ones.
pub fn validate(tx: &Transaction, date_formats: &[String]) -> ValidationResult {
    let mut errors = Vec::new();

    let date = tx.date.trim();
    if date.is_empty() {
        errors.push(format!("Missing required field: {}", Field::Date));
    } else if parse_calendar_date(date, date_formats).is_none() {
        errors.push(format!("Invalid date: '{date}'"));
    }

    if Field::MONETARY
        .iter()
        .filter_map(|f| tx.amount(*f))
        .all(Money::is_zero)
    {
        errors.push("At least one of Income, Expenses or Balance must be non-zero".to_string());
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings: Vec::new(),
    }
}

// Two-digit-year formats come first: chrono's %Y accepts short years, so "01/05/24"
// would otherwise read as year 1.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y", "%d/%m/%y", "%d.%m.%y",
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d",
    "%m/%d/%Y", "%d/%m/%Y",
    "%m-%d-%Y", "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y",
    "%d-%b-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parse the many date spellings found in bank exports into a calendar date.
pub fn parse_calendar_date(s: &str, extra_formats: &[String]) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in extra_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    // Compact YYYYMMDD as used by OFX-style exports.
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let y: i32 = s[0..4].parse().ok()?;
        let m: u32 = s[4..6].parse().ok()?;
        let d: u32 = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    None
}
