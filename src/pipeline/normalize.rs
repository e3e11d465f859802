//! Statement normalisation: header detection, noise stripping, row chunking.
//!
//! Everything in this module is pure text processing. Bank-name detection is
//! the one normalisation step that needs a model call and lives in
//! [`crate::pipeline::llm`] instead.
//!
//! The cleaning rules are tuned for retail bank statements, which follow a
//! common shape: account metadata, a column-header line, the transaction
//! table, then a tail of legend/glossary definitions and regulatory
//! boilerplate. The tail is worse than useless for record extraction (models
//! happily turn "Interest paid to customer" legend entries into fake
//! transactions), so the stripper cuts the document off at the first sign
//! of it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords that identify a column-header line, matched case-insensitively
/// as substrings.
const HEADER_KEYWORDS: &[&str] = &[
    "date", "desc", "debit", "credit", "amount", "balance", "type",
];

/// Phrases that mark the start of the statement's non-transactional tail.
/// Everything from the first match onward is discarded.
const STOP_PHRASES: &[&str] = &[
    "legend",
    "end of statement",
    "terms and conditions",
    "gstin",
    "registered office",
    "computer generated statement",
    "does not require signature",
];

static DAY_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[-/][A-Za-z]{3}").expect("valid regex"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid regex"));
static TWO_DECIMALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d{2}\b").expect("valid regex"));

/// Maximum consecutive narrative lines before the rest of the document is
/// treated as prose and discarded.
const NARRATIVE_RUN_LIMIT: usize = 3;

/// The normalised statement: detected header plus model-sized row chunks.
#[derive(Debug, Clone)]
pub struct NormalizedStatement {
    /// The column-header line, verbatim (trimmed). `None` when the first
    /// page has no recognisable header; extraction degrades but proceeds.
    pub header_row: Option<String>,
    /// Cleaned transaction rows, grouped and prefixed with the header.
    pub row_chunks: Vec<String>,
}

/// Normalise raw statement text into row chunks ready for record extraction.
///
/// `first_page` is scanned for the header row; `full_text` supplies the rows.
pub fn normalize(first_page: &str, full_text: &str, rows_per_chunk: usize) -> NormalizedStatement {
    let header_row = detect_header(first_page);

    let mut lines = strip_noise(full_text);

    if let Some(ref header) = header_row {
        remove_recurring_header(&mut lines, header);
    }

    let row_chunks = chunk_rows(&lines, header_row.as_deref(), rows_per_chunk);

    NormalizedStatement {
        header_row,
        row_chunks,
    }
}

/// Find the column-header line on the first page.
///
/// The first line containing any header keyword wins. Statements vary wildly
/// in header wording ("Txn Date", "Withdrawal Amt.", "Dr/Cr") so substring
/// matching against a small keyword set is deliberately loose.
pub fn detect_header(first_page: &str) -> Option<String> {
    for line in first_page.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// True when the line looks like a transaction row rather than prose.
fn has_row_pattern(line: &str) -> bool {
    DAY_MONTH.is_match(line) || ISO_DATE.is_match(line) || TWO_DECIMALS.is_match(line)
}

/// Long free-text lines with many words and no date/amount shape are
/// narrative prose, not rows.
fn is_narrative(line: &str) -> bool {
    !has_row_pattern(line)
        && line.len() > 160
        && line.chars().filter(|c| *c == ' ').count() > 15
}

/// Glossary entries look like `NEFT - National Electronic Funds Transfer`:
/// a short alphabetic code, a dash, an explanation.
fn is_glossary_line(line: &str) -> bool {
    let Some((lhs, rhs)) = line.split_once('-') else {
        return false;
    };
    let code = lhs.trim();
    if rhs.trim().is_empty() || code.len() < 2 || code.len() > 15 {
        return false;
    }
    let mut has_alpha = false;
    for c in code.chars() {
        if c.is_ascii_alphabetic() {
            has_alpha = true;
        } else if !matches!(c, '.' | '/' | '-') {
            return false;
        }
    }
    has_alpha
}

/// Drop blank lines and cut the document off at the legend/boilerplate tail.
pub fn strip_noise(text: &str) -> Vec<String> {
    let mut kept = Vec::new();
    let mut narrative_run = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let lower = trimmed.to_lowercase();
        if STOP_PHRASES.iter().any(|p| lower.contains(p)) {
            break;
        }

        if is_glossary_line(trimmed) {
            continue;
        }

        if is_narrative(trimmed) {
            narrative_run += 1;
            if narrative_run >= NARRATIVE_RUN_LIMIT {
                // The earlier lines of the run were prose all along.
                kept.truncate(kept.len() - (NARRATIVE_RUN_LIMIT - 1));
                break;
            }
        } else {
            narrative_run = 0;
        }

        kept.push(trimmed.to_string());
    }

    kept
}

/// Remove the first in-body recurrence of the header line and everything
/// before it. PDFs repeat the header per page; everything before the first
/// occurrence is account metadata, not rows.
fn remove_recurring_header(lines: &mut Vec<String>, header: &str) {
    let needle = header.trim().to_lowercase();
    if let Some(pos) = lines.iter().position(|l| l.trim().to_lowercase() == needle) {
        lines.drain(..=pos);
    }
}

/// Group cleaned rows into chunks of `rows_per_chunk`, each prefixed with
/// the header so every model call has column context.
pub fn chunk_rows(lines: &[String], header: Option<&str>, rows_per_chunk: usize) -> Vec<String> {
    let rows_per_chunk = rows_per_chunk.max(1);
    lines
        .chunks(rows_per_chunk)
        .map(|group| {
            let body = group.join("\n");
            match header {
                Some(h) => format!("{}\n{}", h, body),
                None => body,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Date Description Debit Credit Balance";

    #[test]
    fn detect_header_finds_first_keyword_line() {
        let page = "HDFC BANK LTD\nAccount Statement\nDate Description Debit Credit Balance\nrows...";
        assert_eq!(detect_header(page), Some(HEADER.to_string()));
    }

    #[test]
    fn detect_header_none_when_no_keywords() {
        assert_eq!(detect_header("HDFC BANK\nMumbai Branch\n"), None);
    }

    #[test]
    fn detect_header_is_case_insensitive() {
        let page = "TXN DATE | NARRATION | WITHDRAWAL";
        assert_eq!(detect_header(page), Some(page.to_string()));
    }

    #[test]
    fn stop_phrase_discards_rest_of_document() {
        let text = "01-Jan UPI 100.00\nLegend and abbreviations\n02-Jan POS 50.00\n";
        let lines = strip_noise(text);
        assert_eq!(lines, vec!["01-Jan UPI 100.00"]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let text = "01-Jan A 10.00\n\n   \n02-Jan B 20.00\n";
        assert_eq!(strip_noise(text).len(), 2);
    }

    #[test]
    fn glossary_lines_are_dropped_without_stopping() {
        let text = "NEFT - National Electronic Funds Transfer\n01-Jan NEFT IN 500.00\n";
        let lines = strip_noise(text);
        assert_eq!(lines, vec!["01-Jan NEFT IN 500.00"]);
    }

    #[test]
    fn dates_with_dashes_are_not_glossary() {
        assert!(!is_glossary_line("2025-01-05 transfer received"));
        assert!(!is_glossary_line("01-Jan UPI payment 100.00"));
        assert!(is_glossary_line("NEFT - National Electronic Funds Transfer"));
        assert!(is_glossary_line("Dr./Cr. - Debit or Credit indicator"));
    }

    #[test]
    fn three_narrative_lines_stop_the_document() {
        let narrative = format!(
            "{} {}",
            "This account is governed by the standard deposit terms available at any branch and",
            "customers are requested to review them carefully before raising a dispute about it"
        );
        assert!(is_narrative(&narrative));

        let text = format!(
            "01-Jan A 10.00\n{n}\n{n}\n{n}\n02-Jan B 20.00\n",
            n = narrative
        );
        let lines = strip_noise(&text);
        // The narrative run and everything after it is discarded.
        assert_eq!(lines, vec!["01-Jan A 10.00"]);
    }

    #[test]
    fn two_narrative_lines_do_not_stop() {
        let narrative = "a".repeat(100) + &" word".repeat(16);
        assert!(is_narrative(&narrative));
        let text = format!("{n}\n{n}\n01-Jan A 10.00\n", n = narrative);
        let lines = strip_noise(&text);
        assert!(lines.contains(&"01-Jan A 10.00".to_string()));
    }

    #[test]
    fn lines_with_amounts_are_never_narrative() {
        let long_row = format!("01-Jan {} 1234.56", "very long merchant description ".repeat(8));
        assert!(long_row.len() > 160);
        assert!(!is_narrative(&long_row));
    }

    #[test]
    fn recurring_header_removal_drops_prefix() {
        let mut lines = vec![
            "Account No 1234".to_string(),
            "DATE DESCRIPTION DEBIT CREDIT BALANCE".to_string(),
            "01-Jan A 10.00".to_string(),
        ];
        remove_recurring_header(&mut lines, HEADER);
        assert_eq!(lines, vec!["01-Jan A 10.00"]);
    }

    #[test]
    fn recurring_header_absent_is_a_no_op() {
        let mut lines = vec!["01-Jan A 10.00".to_string()];
        remove_recurring_header(&mut lines, HEADER);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn chunking_prefixes_header_and_partitions_rows() {
        let lines: Vec<String> = (0..7).map(|i| format!("row {}", i)).collect();
        let chunks = chunk_rows(&lines, Some("HDR"), 3);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.starts_with("HDR\n")));
        assert!(chunks[2].ends_with("row 6"));
    }

    #[test]
    fn chunk_concatenation_reproduces_rows_exactly() {
        let lines: Vec<String> = (0..123).map(|i| format!("row {}", i)).collect();
        let chunks = chunk_rows(&lines, Some("HDR"), 50);

        let mut reassembled = Vec::new();
        for chunk in &chunks {
            for line in chunk.lines().skip(1) {
                reassembled.push(line.to_string());
            }
        }
        assert_eq!(reassembled, lines);
    }

    #[test]
    fn chunking_without_header_has_no_prefix() {
        let lines = vec!["row".to_string()];
        let chunks = chunk_rows(&lines, None, 50);
        assert_eq!(chunks, vec!["row"]);
    }

    #[test]
    fn normalize_end_to_end() {
        let page1 = "HDFC BANK\nDate Description Debit Credit Balance\n";
        let full = "HDFC BANK\nDate Description Debit Credit Balance\n\
                    01-Jan UPI OUT 120.50  15000.00\n\
                    02-Jan SALARY  50000.00 65000.00\n\
                    Legend\nNEFT - National Electronic Funds Transfer\n";
        let stmt = normalize(page1, full, 50);
        assert_eq!(
            stmt.header_row.as_deref(),
            Some("Date Description Debit Credit Balance")
        );
        assert_eq!(stmt.row_chunks.len(), 1);
        let chunk = &stmt.row_chunks[0];
        assert!(chunk.starts_with("Date Description Debit Credit Balance\n"));
        assert!(chunk.contains("01-Jan UPI OUT"));
        assert!(chunk.contains("02-Jan SALARY"));
        assert!(!chunk.contains("Legend"));
        assert!(!chunk.contains("HDFC BANK"));
    }
}
