//! Transaction data model: raw model output vs. canonical records.
//!
//! The external model returns heterogeneous, half-typed JSON. Rather than
//! letting untyped maps flow through the pipeline, the model boundary is a
//! tagged union: a reply element either deserialises into a
//! [`RawTransaction`] (the known shape, with every field optional and
//! number-or-string tolerant) or is captured as [`RawRecord::Unknown`] and
//! dropped with a log line. Only the post-processor may turn a
//! `RawTransaction` into a [`Transaction`]; nothing downstream of it ever
//! sees an unvalidated record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One element of the model's reply array.
///
/// `serde(untagged)` tries the known transaction shape first and falls back
/// to capturing whatever the model actually sent, so a single malformed
/// element never poisons the surrounding array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRecord {
    /// Transaction-shaped data. Still unvalidated.
    Transaction(RawTransaction),
    /// Anything else the model emitted. Logged and discarded.
    Unknown(Value),
}

/// An unvalidated transaction record as returned by the external model.
///
/// Every field is optional and the numeric fields accept both JSON numbers
/// and strings — statements rendered through OCR routinely come back as
/// `"amount": "1,250.00"`. Coercion happens in the post-processor via
/// [`coerce_number`]; a field that cannot be coerced drops the record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub date: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub debit: Option<Value>,
    #[serde(default)]
    pub credit: Option<Value>,
    /// Dr/Cr indicator column, when the statement has one.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub balance: Option<Value>,
    pub category: Option<String>,
    pub bank_name: Option<String>,
}

/// A validated, sign-resolved, bank-stamped transaction.
///
/// Invariants: `amount` is always present and finite; `balance`, when
/// present, is finite. Negative `amount` means debit, positive means
/// credit. Immutable once produced by the post-processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// ISO 8601 date string as reported by the model.
    pub date: String,
    pub description: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    pub category: String,
    pub bank_name: String,
}

/// Coerce a JSON value into a finite `f64`.
///
/// Accepts numbers and numeric strings; thousands separators are stripped
/// because OCR-derived statements emit `"2,000.00"` as routinely as `2000`.
/// Returns `None` for anything else — the caller treats that as a
/// validation failure for the record.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// True when a raw numeric field should participate in sign resolution:
/// present, non-empty, and not literally zero.
pub fn is_meaningful(value: &Option<Value>) -> bool {
    match value {
        None => false,
        Some(v) => match coerce_number(v) {
            Some(n) => n != 0.0,
            None => !matches!(v, Value::String(s) if s.trim().is_empty()),
        },
    }
}
