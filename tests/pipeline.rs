//! Integration tests over the deterministic pipeline stages.
//!
//! Everything here runs without a PDF engine, an OCR binary, or a live
//! model: the stages under test (range splitting, normalisation, response
//! parsing, post-processing, job progress) are pure, and the model reply is
//! simulated with the JSON a compliant model would return.

use pdf2txn::pipeline::chunker::split_ranges;
use pdf2txn::pipeline::llm::parse_records;
use pdf2txn::pipeline::normalize::normalize;
use pdf2txn::pipeline::postprocess::{postprocess, HeaderColumns};
use pdf2txn::{ChunkState, JobProgress};

// ── Chunk range properties ───────────────────────────────────────────────

#[test]
fn page_ranges_partition_without_loss_or_overlap() {
    for total in 1..=40 {
        let ranges = split_ranges(total, 4);
        let mut covered = vec![false; total];
        for r in &ranges {
            for page in r.start..=r.end {
                assert!(!covered[page], "page {} covered twice", page);
                covered[page] = true;
            }
        }
        assert!(covered.into_iter().all(|c| c), "total {} left pages uncovered", total);
    }
}

// ── Normalisation round trip ─────────────────────────────────────────────

const STATEMENT: &str = "\
HDFC BANK LTD
Statement for account ****1234
Date Description Debit Credit Balance
01-Jan UPI/PAY/grocers 450.00  14550.00
02-Jan NEFT IN salary  50000.00 64550.00
03-Jan ATM WDL 2000.00  62550.00
NEFT - National Electronic Funds Transfer
Legend and other useful information
01-Feb SHOULD NOT APPEAR 1.00  1.00
";

#[test]
fn normalization_detects_header_and_strips_tail() {
    let stmt = normalize(STATEMENT, STATEMENT, 50);
    assert_eq!(
        stmt.header_row.as_deref(),
        Some("Date Description Debit Credit Balance")
    );
    assert_eq!(stmt.row_chunks.len(), 1);

    let chunk = &stmt.row_chunks[0];
    assert!(chunk.starts_with("Date Description Debit Credit Balance\n"));
    assert!(chunk.contains("01-Jan UPI/PAY/grocers"));
    assert!(chunk.contains("03-Jan ATM WDL"));
    // The glossary entry, legend tail, and pre-header metadata are gone.
    assert!(!chunk.contains("National Electronic Funds Transfer"));
    assert!(!chunk.contains("SHOULD NOT APPEAR"));
    assert!(!chunk.contains("HDFC BANK LTD"));
}

#[test]
fn row_chunks_reassemble_to_the_cleaned_rows() {
    let rows: String = (0..130)
        .map(|i| format!("0{}-Jan row-{} 10.00\n", (i % 9) + 1, i))
        .collect();
    let text = format!("Date Description Amount\n{}", rows);
    let stmt = normalize(&text, &text, 50);
    assert_eq!(stmt.row_chunks.len(), 3);

    let mut reassembled = Vec::new();
    for chunk in &stmt.row_chunks {
        let mut lines = chunk.lines();
        assert_eq!(lines.next(), Some("Date Description Amount"));
        reassembled.extend(lines.map(String::from));
    }
    assert_eq!(reassembled.len(), 130);
    assert_eq!(reassembled[0], "01-Jan row-0 10.00");
    assert_eq!(reassembled[129], "04-Jan row-129 10.00");
}

#[test]
fn headerless_statement_degrades_without_failing() {
    let text = "just some rows\n01-Jan X 10.00\n";
    let stmt = normalize("no keywords here at all", text, 50);
    assert!(stmt.header_row.is_none());
    assert!(!stmt.row_chunks.is_empty());
}

// ── Model reply to canonical transactions ────────────────────────────────

#[test]
fn end_to_end_single_row_statement() {
    // A 1-page statement with a Type indicator column and one ATM row.
    let header = "Date Description Amount Type Balance";
    let reply = r#"```json
[{"date":"2025-01-05","description":"ATM WDL","amount":2000,"type":"DR",
  "balance":15000.00,"category":"Cash","bankName":"HDFC"}]
```"#;

    let records = parse_records(reply).expect("reply parses");
    let columns = HeaderColumns::from_header_row(Some(header));
    let txns = postprocess(records, &columns, Some("HDFC"));

    assert_eq!(txns.len(), 1);
    let t = &txns[0];
    assert_eq!(t.date, "2025-01-05");
    assert_eq!(t.description, "ATM WDL");
    assert_eq!(t.amount, -2000.0);
    assert_eq!(t.balance, Some(15000.0));
    assert_eq!(t.bank_name, "HDFC");
}

#[test]
fn debit_credit_statement_signs_both_directions() {
    let reply = r#"{"value":[
        {"date":"2025-01-01","description":"UPI OUT","debit":"120.50","balance":"14,879.50"},
        {"date":"2025-01-02","description":"SALARY","credit":"2000.00"}
    ]}"#;
    let records = parse_records(reply).unwrap();
    let columns = HeaderColumns::from_header_row(Some("Date Description Debit Credit Balance"));
    let txns = postprocess(records, &columns, Some("ICICI"));

    assert_eq!(txns.len(), 2);
    assert_eq!(txns[0].amount, -120.50);
    assert_eq!(txns[0].balance, Some(14879.50));
    assert_eq!(txns[1].amount, 2000.00);
    assert!(txns.iter().all(|t| t.bank_name == "ICICI"));
}

#[test]
fn malformed_reply_yields_zero_records() {
    assert!(parse_records("I could not find any transactions, sorry!").is_err());
    assert!(parse_records(r#"{"unexpected":"shape"}"#).is_err());
}

#[test]
fn legend_records_are_filtered_from_model_output() {
    let reply = r#"[
        {"date":"2025-01-05","description":"Interest paid to customer","amount":12.0},
        {"date":"2025-01-05","description":"Coffee shop","amount":-4.5}
    ]"#;
    let records = parse_records(reply).unwrap();
    let txns = postprocess(records, &HeaderColumns::default(), None);
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].description, "Coffee shop");
}

// ── Job progress under at-least-once delivery ────────────────────────────

#[test]
fn job_progress_survives_redelivery_and_races() {
    let mut progress = JobProgress::new("job-42");

    // First completion arrives before the splitter announced the total.
    assert!(progress.record_completed(2, 4));
    assert!(!progress.is_terminal());

    // Splitter's seed notification reconciles the total.
    progress.record_total(3);
    assert_eq!(progress.total_chunks(), Some(3));

    // Redelivered work item completes the same chunk again.
    assert!(!progress.record_completed(2, 4));
    assert_eq!(progress.completed_count(), 1);
    assert_eq!(progress.pages_processed(), 4);

    // A failure and a racing completion for the same chunk.
    assert!(progress.record_failed(0));
    assert!(!progress.record_completed(0, 4));
    assert_eq!(progress.state_of(0), ChunkState::Failed);

    assert!(!progress.is_terminal());
    assert!(progress.record_completed(1, 4));
    assert!(progress.is_terminal());
    assert_eq!(progress.percent(), 100);
    assert_eq!(progress.completed_count(), 2);
    assert_eq!(progress.failed_count(), 1);
}
