//! Post-processing: validate, sign-correct, and canonicalise raw records.
//!
//! This is the only place a [`RawRecord`] becomes a [`Transaction`]. The
//! rules are strict on purpose: a record that cannot be fully validated is
//! dropped with a debug log rather than patched up, because a silently
//! wrong amount is far worse than a missing row.

use crate::transaction::{coerce_number, is_meaningful, RawRecord, RawTransaction, Transaction};
use serde_json::Value;
use tracing::debug;

/// Descriptions that are statement legend text, not transactions. The model
/// occasionally transcribes glossary entries as rows; these exact phrases
/// (lower-cased, trimmed) are dropped unconditionally.
const DESCRIPTION_DENYLIST: &[&str] = &[
    "interest paid to customer",
    "pos purchase",
    "upi - unified payments interface",
    "neft - national electronic funds transfer",
    "imps - immediate payment service",
];

/// Fallback category when the model assigned none.
const DEFAULT_CATEGORY: &str = "Other";

/// Which sign-relevant columns the statement header declared.
///
/// Sign resolution is header-driven: a `debit`/`credit` column pair, a
/// `Dr/Cr` indicator column, and a bare signed `amount` column each imply a
/// different convention, and guessing wrong flips every sign in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderColumns {
    pub has_debit: bool,
    pub has_credit: bool,
    pub has_type: bool,
    pub has_amount: bool,
}

impl HeaderColumns {
    /// Derive column info from the detected header row, if any.
    pub fn from_header_row(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Self::default();
        };
        let lower = header.to_lowercase();
        Self {
            has_debit: lower.contains("debit") || lower.contains("withdrawal"),
            has_credit: lower.contains("credit") || lower.contains("deposit"),
            has_type: lower.contains("type")
                || lower.contains("dr/cr")
                || lower.contains("cr/dr")
                || lower.contains("dr / cr"),
            has_amount: lower.contains("amount"),
        }
    }
}

/// Canonicalise raw records into transactions, dropping anything that
/// fails validation. Per-record failures never abort the batch.
pub fn postprocess(
    records: Vec<RawRecord>,
    columns: &HeaderColumns,
    bank_name: Option<&str>,
) -> Vec<Transaction> {
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        let raw = match record {
            RawRecord::Transaction(t) => t,
            RawRecord::Unknown(v) => {
                debug!("dropping non-transaction reply element: {}", v);
                continue;
            }
        };
        if let Some(txn) = canonicalize(raw, columns, bank_name) {
            out.push(txn);
        }
    }

    out
}

/// Validate and convert one record. `None` means dropped.
fn canonicalize(
    raw: RawTransaction,
    columns: &HeaderColumns,
    bank_name: Option<&str>,
) -> Option<Transaction> {
    let date = non_empty(raw.date.as_deref())?;
    let description = non_empty(raw.description.as_deref())?;

    let lowered = description.to_lowercase();
    if DESCRIPTION_DENYLIST.contains(&lowered.as_str()) {
        debug!("dropping legend record: {}", description);
        return None;
    }
    if description.len() > 120 && description.chars().filter(|c| *c == ' ').count() > 15 {
        debug!("dropping narrative record: {:.60}...", description);
        return None;
    }

    let amount = resolve_amount(&raw, columns)?;
    let balance = resolve_balance(raw.balance.as_ref())?;

    let bank_name = bank_name
        .map(str::to_string)
        .or(raw.bank_name)
        .unwrap_or_default();
    let category = raw
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    Some(Transaction {
        date,
        description,
        amount,
        balance,
        category,
        bank_name,
    })
}

/// Header-driven sign resolution, in decreasing order of trust:
///
/// 1. A declared debit column with a meaningful value → negative magnitude.
/// 2. A declared credit column with a meaningful value → positive magnitude.
/// 3. A declared indicator column plus an amount → magnitude signed by the
///    `dr`/`cr` token; an unrecognised token leaves the amount as given.
/// 4. A bare amount column, or no column info at all → the amount verbatim.
///
/// `None` means the record has no derivable amount and must be dropped, as
/// must any record whose chosen field fails numeric coercion.
fn resolve_amount(raw: &RawTransaction, columns: &HeaderColumns) -> Option<f64> {
    if columns.has_debit && is_meaningful(&raw.debit) {
        return Some(-coerce_number(raw.debit.as_ref()?)?.abs());
    }
    if columns.has_credit && is_meaningful(&raw.credit) {
        return Some(coerce_number(raw.credit.as_ref()?)?.abs());
    }
    if columns.has_type {
        if let Some(amount_value) = raw.amount.as_ref() {
            let amount = coerce_number(amount_value)?;
            return Some(match indicator(raw.kind.as_deref()) {
                Indicator::Debit => -amount.abs(),
                Indicator::Credit => amount.abs(),
                Indicator::Other => amount,
            });
        }
    }
    coerce_number(raw.amount.as_ref()?)
}

enum Indicator {
    Debit,
    Credit,
    Other,
}

fn indicator(kind: Option<&str>) -> Indicator {
    match kind.map(|k| k.trim().to_lowercase()).as_deref() {
        Some("dr") | Some("debit") => Indicator::Debit,
        Some("cr") | Some("credit") => Indicator::Credit,
        _ => Indicator::Other,
    }
}

/// Coerce the balance when present and non-empty; `Some(None)` when absent.
/// An outer `None` means the value was present but not numeric, which
/// drops the record — a balance is never computed or inferred.
fn resolve_balance(balance: Option<&Value>) -> Option<Option<f64>> {
    match balance {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) if s.trim().is_empty() => Some(None),
        Some(v) => coerce_number(v).map(Some),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    let trimmed = s?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawRecord {
        serde_json::from_value(v).unwrap()
    }

    const DEBIT_CREDIT: HeaderColumns = HeaderColumns {
        has_debit: true,
        has_credit: true,
        has_type: false,
        has_amount: false,
    };

    const TYPE_AMOUNT: HeaderColumns = HeaderColumns {
        has_debit: false,
        has_credit: false,
        has_type: true,
        has_amount: true,
    };

    #[test]
    fn columns_from_header_row() {
        let c = HeaderColumns::from_header_row(Some("Date Description Debit Credit Balance"));
        assert!(c.has_debit && c.has_credit);
        assert!(!c.has_type && !c.has_amount);

        let c = HeaderColumns::from_header_row(Some("Date Description Amount Type Balance"));
        assert!(c.has_type && c.has_amount);

        let c = HeaderColumns::from_header_row(Some("Txn Date Narration Withdrawal Deposit"));
        assert!(c.has_debit && c.has_credit);

        assert_eq!(HeaderColumns::from_header_row(None), HeaderColumns::default());
    }

    #[test]
    fn debit_column_negates() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "UPI OUT", "debit": "120.50"
        }))];
        let txns = postprocess(records, &DEBIT_CREDIT, None);
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, -120.50);
    }

    #[test]
    fn credit_column_stays_positive() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "SALARY", "credit": "2000.00"
        }))];
        let txns = postprocess(records, &DEBIT_CREDIT, None);
        assert_eq!(txns[0].amount, 2000.00);
    }

    #[test]
    fn debit_wins_over_credit_when_both_present() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "debit": 50, "credit": 10
        }))];
        let txns = postprocess(records, &DEBIT_CREDIT, None);
        assert_eq!(txns[0].amount, -50.0);
    }

    #[test]
    fn zero_debit_falls_through_to_credit() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "debit": 0, "credit": "75.00"
        }))];
        let txns = postprocess(records, &DEBIT_CREDIT, None);
        assert_eq!(txns[0].amount, 75.0);
    }

    #[test]
    fn type_indicator_signs_the_amount() {
        let dr = vec![raw(json!({
            "date": "2025-01-05", "description": "ATM WDL", "amount": 2000, "type": "DR"
        }))];
        assert_eq!(postprocess(dr, &TYPE_AMOUNT, None)[0].amount, -2000.0);

        let cr = vec![raw(json!({
            "date": "2025-01-05", "description": "REFUND", "amount": "-300", "type": "cr "
        }))];
        // Credit indicator forces positive magnitude.
        assert_eq!(postprocess(cr, &TYPE_AMOUNT, None)[0].amount, 300.0);
    }

    #[test]
    fn unrecognised_indicator_keeps_signed_amount() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": -42.5, "type": "??"
        }))];
        assert_eq!(postprocess(records, &TYPE_AMOUNT, None)[0].amount, -42.5);
    }

    #[test]
    fn no_column_info_uses_amount_verbatim() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": -99.0
        }))];
        let txns = postprocess(records, &HeaderColumns::default(), None);
        assert_eq!(txns[0].amount, -99.0);
    }

    #[test]
    fn record_without_derivable_amount_is_dropped() {
        let records = vec![raw(json!({"date": "2025-01-05", "description": "X"}))];
        assert!(postprocess(records, &HeaderColumns::default(), None).is_empty());
    }

    #[test]
    fn missing_date_or_description_drops() {
        let no_date = vec![raw(json!({"description": "X", "amount": 1}))];
        assert!(postprocess(no_date, &HeaderColumns::default(), None).is_empty());

        let no_desc = vec![raw(json!({"date": "2025-01-05", "amount": 1}))];
        assert!(postprocess(no_desc, &HeaderColumns::default(), None).is_empty());
    }

    #[test]
    fn legend_description_is_dropped_unconditionally() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "Interest paid to customer", "amount": 12.0
        }))];
        assert!(postprocess(records, &HeaderColumns::default(), None).is_empty());
    }

    #[test]
    fn narrative_description_is_dropped() {
        let narrative = "this account is governed by terms ".repeat(5);
        assert!(narrative.len() > 120);
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": narrative, "amount": 1.0
        }))];
        assert!(postprocess(records, &HeaderColumns::default(), None).is_empty());
    }

    #[test]
    fn non_numeric_balance_drops_the_record() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": 1.0, "balance": "N/A"
        }))];
        assert!(postprocess(records, &HeaderColumns::default(), None).is_empty());
    }

    #[test]
    fn empty_balance_is_left_absent() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": 1.0, "balance": ""
        }))];
        let txns = postprocess(records, &HeaderColumns::default(), None);
        assert_eq!(txns[0].balance, None);
    }

    #[test]
    fn document_bank_name_overrides_record_values() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": 1.0, "bankName": "ICICI"
        }))];
        let txns = postprocess(records, &HeaderColumns::default(), Some("HDFC"));
        assert_eq!(txns[0].bank_name, "HDFC");
    }

    #[test]
    fn record_bank_name_survives_without_document_value() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": 1.0, "bankName": "ICICI"
        }))];
        let txns = postprocess(records, &HeaderColumns::default(), None);
        assert_eq!(txns[0].bank_name, "ICICI");
    }

    #[test]
    fn missing_category_gets_default() {
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "X", "amount": 1.0
        }))];
        assert_eq!(postprocess(records, &HeaderColumns::default(), None)[0].category, "Other");
    }

    #[test]
    fn unknown_elements_are_dropped() {
        let records = vec![raw(json!("stray string")), raw(json!(7))];
        assert!(postprocess(records, &HeaderColumns::default(), None).is_empty());
    }

    #[test]
    fn reprocessing_canonical_output_is_a_fixed_point() {
        let columns = TYPE_AMOUNT;
        let records = vec![raw(json!({
            "date": "2025-01-05", "description": "ATM WDL", "amount": 2000,
            "type": "DR", "balance": 15000.00, "bankName": "HDFC"
        }))];
        let first = postprocess(records, &columns, Some("HDFC"));

        // Feed the canonical output back through with the same columns.
        let reraw: Vec<RawRecord> = first
            .iter()
            .map(|t| raw(serde_json::to_value(t).unwrap()))
            .collect();
        let second = postprocess(reraw, &columns, Some("HDFC"));
        assert_eq!(first, second);
    }
}
