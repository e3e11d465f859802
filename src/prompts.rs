//! Prompts for the record-extraction and bank-name model calls.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the schema contract or the
//!    sign-convention instructions requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the built prompts without a
//!    live model, so a regression in the column-mapping instructions is
//!    caught before it silently corrupts amounts.

/// Build the per-row-chunk extraction prompt.
///
/// The prompt states the bank name to stamp on every record (or an
/// "infer it once" instruction when unknown), supplies the header row for
/// column-sign disambiguation, and constrains the reply to a bare JSON
/// array of objects with fields `date, description, amount, category,
/// bankName` (plus optional `balance, debit, credit, type`).
pub fn record_extraction_prompt(row_chunk: &str, header_row: &str, bank_name: Option<&str>) -> String {
    let bank_instruction = match bank_name {
        Some(name) => format!(
            "The issuing bank is '{name}'. Set bankName to '{name}' on every transaction."
        ),
        None => "Infer the bankName (the bank or card issuer, e.g. 'HDFC', 'ICICI', 'Citi', \
                 'HSBC') ONCE from the whole fragment and set it on every transaction."
            .to_string(),
    };

    format!(
        r#"You are a financial assistant parsing and categorising bank transactions.

{bank_instruction}

Each transaction must include:
- date (YYYY-MM-DD)
- description (short merchant or transfer info)
- amount (positive for credit, negative for debit)
- balance (account balance after the transaction, if shown)
- category (short label like 'Food', 'Travel', 'Utilities', 'Salary', 'Shopping', 'Rent', 'Bank Fee')
- bankName

The statement starts with a header row. Use it to map columns for each transaction.
If the header has 'Debit'/'Credit' columns, report their values in debit/credit fields.
If it has a 'Type' or 'Dr/Cr' indicator column, report it in the type field and the
unsigned value in amount. If only an 'Amount' column is present, use it as-is.

Header row:
{header_row}

Bank statement rows:
{row_chunk}

Return ONLY a JSON array of transactions. If none, return []."#
    )
}

/// Build the one-shot bank-name detection prompt.
///
/// `leading_text` is the first two pages of the statement, already bounded
/// to the configured character budget. The reply is expected to be a single
/// short token; the caller keeps only the first whitespace-separated word.
pub fn bank_name_prompt(leading_text: &str) -> String {
    format!(
        r#"The text below is the start of a bank statement. Reply with ONLY the name of the
issuing bank or card issuer as a single short token (e.g. 'HDFC', 'ICICI', 'SBI',
'Axis', 'Citi', 'HSBC'). No punctuation, no explanation. If you cannot tell,
reply 'unknown'.

{leading_text}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_embeds_header_and_rows() {
        let p = record_extraction_prompt(
            "2025-01-05 ATM WDL 2000 DR 15000.00",
            "Date Description Amount Type Balance",
            Some("HDFC"),
        );
        assert!(p.contains("Date Description Amount Type Balance"));
        assert!(p.contains("ATM WDL"));
        assert!(p.contains("Set bankName to 'HDFC'"));
        assert!(p.contains("ONLY a JSON array"));
    }

    #[test]
    fn extraction_prompt_falls_back_to_infer_once() {
        let p = record_extraction_prompt("rows", "", None);
        assert!(p.contains("Infer the bankName"));
        assert!(p.contains("ONCE"));
    }

    #[test]
    fn bank_prompt_embeds_leading_text() {
        let p = bank_name_prompt("HDFC BANK LTD\nStatement of account");
        assert!(p.contains("HDFC BANK LTD"));
        assert!(p.contains("single short token"));
    }
}
