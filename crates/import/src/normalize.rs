use std::collections::HashSet;
use std::str::FromStr;

use ledgerport_core::{validate, Field, Money, Transaction, ValidationResult};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::mapper::ColumnMapping;

/// Turns mapped rows into transactions and checks them.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    date_formats: Vec<String>,
}

impl Normalizer {
    /// `date_formats` are chrono formats tried before the built-in ones.
    pub fn new(date_formats: Vec<String>) -> Self {
        Normalizer { date_formats }
    }

    /// Build one transaction from a row. `seq` is the row's position in the import and
    /// becomes part of the generated id.
    ///
    /// Never fails: unreadable amounts become zero with a warning and rule violations are
    /// reported in the returned result next to the transaction.
    pub fn normalize(&self, row: &[String], mapping: &ColumnMapping, seq: usize) -> (Transaction, ValidationResult) {
        let mut tx = Transaction::new(seq);
        let mut filled: HashSet<Field> = HashSet::new();
        let mut warnings = Vec::new();

        for (idx, field) in mapping.mapped() {
            let raw = row.get(idx).map(|s| s.trim()).unwrap_or("");
            // Later columns mapped to the same field only fill it when earlier ones were empty.
            if raw.is_empty() || filled.contains(&field) {
                continue;
            }
            filled.insert(field);

            if field.is_monetary() {
                match coerce_amount(raw) {
                    Some(amount) => {
                        tx.set_amount(field, Money::from_decimal(amount));
                    }
                    None => {
                        tracing::debug!(row = seq, column = idx, %field, raw, "amount coerced to zero");
                        warnings.push(format!("Could not read {field} amount '{raw}' in column {}, using 0", idx + 1));
                    }
                }
            } else {
                tx.set_text(field, raw);
            }
        }

        let mut result = validate(&tx, &self.date_formats);
        result.warnings.extend(warnings);
        (tx, result)
    }

    /// Check a transaction again after the caller edited it. The id is left alone.
    pub fn revalidate(&self, tx: &Transaction) -> ValidationResult {
        validate(tx, &self.date_formats)
    }
}

/// Normalize with the built-in date formats only.
pub fn normalize(row: &[String], mapping: &ColumnMapping, seq: usize) -> (Transaction, ValidationResult) {
    Normalizer::default().normalize(row, mapping, seq)
}

/// Read an amount as it appears in bank exports: currency symbols, thousands separators,
/// decimal commas, accounting parentheses and trailing minus signs are all accepted.
///
/// An empty cell is zero. Returns `None` when the text holds no number at all.
pub fn coerce_amount(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Decimal::ZERO);
    }
    if let Ok(dec) = Decimal::from_str(raw) {
        return Some(dec);
    }
    if let Ok(dec) = Decimal::from_scientific(raw) {
        return Some(dec);
    }

    let signs: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(*c, '.' | ',' | '-' | '−' | '(' | ')'))
        .collect();
    let negative = signs.starts_with(['-', '−', '(']) || signs.ends_with(['-', '−']);

    let digits: String = signs
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(*c, '.' | ','))
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = normalize_separators(&digits);
    let magnitude = Decimal::from_str(&normalized)
        .ok()
        .or_else(|| normalized.parse::<f64>().ok().and_then(Decimal::from_f64))?;

    Some(if negative { -magnitude } else { magnitude })
}

fn normalize_separators(digits: &str) -> String {
    let last_dot = digits.rfind('.');
    let last_comma = digits.rfind(',');
    match (last_dot, last_comma) {
        // Both present: whichever comes last is the decimal separator.
        (Some(dot), Some(comma)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = digits.len() - comma - 1;
            if digits.matches(',').count() == 1 && decimals != 3 {
                digits.replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
        (Some(_), None) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn mapping(fields: &[Option<Field>]) -> ColumnMapping {
        fields
            .iter()
            .enumerate()
            .fold(ColumnMapping::unmapped(fields.len()), |m, (idx, f)| m.with_override(idx, *f))
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── coerce_amount ─────────────────────────────────────────────────────────

    #[test]
    fn plain_numbers() {
        assert_eq!(coerce_amount("123.45"), Some(dec("123.45")));
        assert_eq!(coerce_amount("-50"), Some(dec("-50")));
        assert_eq!(coerce_amount("1e3"), Some(dec("1000")));
        assert_eq!(coerce_amount(""), Some(Decimal::ZERO));
        assert_eq!(coerce_amount("   "), Some(Decimal::ZERO));
    }

    #[test]
    fn currency_symbols_and_thousands() {
        assert_eq!(coerce_amount("$99.99"), Some(dec("99.99")));
        assert_eq!(coerce_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(coerce_amount("USD 1,234,567"), Some(dec("1234567")));
        assert_eq!(coerce_amount("€ 12"), Some(dec("12")));
    }

    #[test]
    fn european_notation() {
        assert_eq!(coerce_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(coerce_amount("12,5"), Some(dec("12.5")));
        assert_eq!(coerce_amount("1 234,56 €"), Some(dec("1234.56")));
        assert_eq!(coerce_amount("1.234.567"), Some(dec("1234567")));
        assert_eq!(coerce_amount("1,234"), Some(dec("1234")));
    }

    #[test]
    fn negative_spellings() {
        assert_eq!(coerce_amount("(42.00)"), Some(dec("-42")));
        assert_eq!(coerce_amount("42.00-"), Some(dec("-42")));
        assert_eq!(coerce_amount("−7,50"), Some(dec("-7.5")));
        assert_eq!(coerce_amount("-$5.00"), Some(dec("-5")));
    }

    #[test]
    fn text_without_digits_is_not_a_number() {
        assert_eq!(coerce_amount("n/a"), None);
        assert_eq!(coerce_amount("€"), None);
        assert_eq!(coerce_amount("--"), None);
    }

    // ── normalize ─────────────────────────────────────────────────────────────

    #[test]
    fn date_and_income_is_valid() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income)]);
        let (tx, result) = normalize(&row(&["2024-01-05", "100"]), &m, 0);
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(tx.income, Money::from_cents(10000));
        assert!(tx.expenses.is_zero());
        assert!(!tx.id().as_str().is_empty());
    }

    #[test]
    fn zero_amounts_fail_the_monetary_rule() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income), Some(Field::Expenses)]);
        let (_, result) = normalize(&row(&["2024-01-05", "0", ""]), &m, 0);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Income, Expenses or Balance"));
    }

    #[test]
    fn missing_date_still_returns_the_transaction() {
        let m = mapping(&[Some(Field::Description), Some(Field::Expenses)]);
        let (tx, result) = normalize(&row(&["Coffee", "3.50"]), &m, 7);
        assert!(!result.valid);
        assert!(result.errors[0].contains("Date"));
        assert_eq!(tx.description.as_deref(), Some("Coffee"));
        assert_eq!(tx.expenses, Money::from_cents(350));
    }

    #[test]
    fn bad_amount_is_a_warning_not_a_failure() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income), Some(Field::Balance)]);
        let (tx, result) = normalize(&row(&["2024-01-05", "n/a", "1.000,00"]), &m, 0);
        assert!(result.valid, "{:?}", result.errors);
        assert!(tx.income.is_zero());
        assert_eq!(tx.balance, Money::from_cents(100000));
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("'n/a'"));
    }

    #[test]
    fn unmapped_columns_are_ignored() {
        let m = mapping(&[Some(Field::Date), None, Some(Field::Income)]);
        let (tx, _) = normalize(&row(&["2024-01-05", "Salary", "5"]), &m, 0);
        assert_eq!(tx.description, None);
        assert_eq!(tx.income, Money::from_cents(500));
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income), Some(Field::Notes)]);
        let (tx, result) = normalize(&row(&["2024-01-05", "5"]), &m, 0);
        assert!(result.valid);
        assert_eq!(tx.notes, None);
    }

    #[test]
    fn first_non_empty_duplicate_wins() {
        let m = mapping(&[Some(Field::Date), Some(Field::Notes), Some(Field::Notes), Some(Field::Income)]);
        let (tx, _) = normalize(&row(&["2024-01-05", "", "second", "1"]), &m, 0);
        assert_eq!(tx.notes.as_deref(), Some("second"));

        let (tx, _) = normalize(&row(&["2024-01-05", "first", "second", "1"]), &m, 0);
        assert_eq!(tx.notes.as_deref(), Some("first"));
    }

    #[test]
    fn cells_are_trimmed() {
        let m = mapping(&[Some(Field::Date), Some(Field::Payee), Some(Field::Income)]);
        let (tx, result) = normalize(&row(&[" 2024-01-05 ", "  ACME  ", " 1 "]), &m, 0);
        assert!(result.valid);
        assert_eq!(tx.date, "2024-01-05");
        assert_eq!(tx.payee.as_deref(), Some("ACME"));
    }

    #[test]
    fn ids_differ_within_the_same_tick() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income)]);
        let r = row(&["2024-01-05", "1"]);
        let ids: HashSet<String> = (0..500)
            .map(|seq| normalize(&r, &m, seq).0.id().as_str().to_string())
            .collect();
        assert_eq!(ids.len(), 500);

        // Even with the same sequence index.
        let a = normalize(&r, &m, 3).0;
        let b = normalize(&r, &m, 3).0;
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn configured_date_formats_are_used() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income)]);
        let normalizer = Normalizer::new(vec!["%d|%m|%Y".to_string()]);
        let (_, strict) = normalize(&row(&["05|01|2024", "1"]), &m, 0);
        let (tx, lenient) = normalizer.normalize(&row(&["05|01|2024", "1"]), &m, 0);
        assert!(!strict.valid);
        assert!(lenient.valid, "{:?}", lenient.errors);
        assert!(normalizer.revalidate(&tx).valid);
    }

    #[test]
    fn revalidation_keeps_the_id() {
        let m = mapping(&[Some(Field::Date), Some(Field::Income)]);
        let normalizer = Normalizer::default();
        let (mut tx, result) = normalizer.normalize(&row(&["bad", "1"]), &m, 0);
        assert!(!result.valid);
        let id = tx.id().clone();
        tx.date = "2024-01-05".to_string();
        assert!(normalizer.revalidate(&tx).valid);
        assert_eq!(tx.id(), &id);
    }
}
