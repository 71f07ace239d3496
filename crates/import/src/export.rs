use std::io::Write;

use ledgerport_core::{Transaction, ValidationResult};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::pipeline::ImportReport;

/// Flat CSV shape of one normalized transaction. Amounts keep the precision they were read with.
#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    id: &'a str,
    date: &'a str,
    description: Option<&'a str>,
    category: Option<&'a str>,
    subcategory: Option<&'a str>,
    income: Decimal,
    expenses: Decimal,
    balance: Decimal,
    currency: Option<&'a str>,
    reference: Option<&'a str>,
    notes: Option<&'a str>,
    account: Option<&'a str>,
    payee: Option<&'a str>,
    check_number: Option<&'a str>,
    transaction_id: Option<&'a str>,
    valid: bool,
    errors: String,
    warnings: String,
}

impl<'a> ExportRecord<'a> {
    fn new(tx: &'a Transaction, result: &ValidationResult) -> Self {
        ExportRecord {
            id: tx.id().as_str(),
            date: &tx.date,
            description: tx.description.as_deref(),
            category: tx.category.as_deref(),
            subcategory: tx.subcategory.as_deref(),
            income: tx.income.as_decimal(),
            expenses: tx.expenses.as_decimal(),
            balance: tx.balance.as_decimal(),
            currency: tx.currency.as_deref(),
            reference: tx.reference.as_deref(),
            notes: tx.notes.as_deref(),
            account: tx.account.as_deref(),
            payee: tx.payee.as_deref(),
            check_number: tx.check_number.as_deref(),
            transaction_id: tx.transaction_id.as_deref(),
            valid: result.valid,
            errors: result.errors.join("; "),
            warnings: result.warnings.join("; "),
        }
    }
}

/// Write the report as CSV with a header row. `valid_only` leaves out rows that failed validation.
pub fn write_csv<W: Write>(out: W, report: &ImportReport, valid_only: bool) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(out);
    for (tx, result) in report.entries() {
        if valid_only && !result.valid {
            continue;
        }
        wtr.serialize(ExportRecord::new(tx, result))?;
    }
    wtr.flush()?;
    Ok(())
}
