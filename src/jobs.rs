//! Job bookkeeping: work items, notifications, and the progress tracker.
//!
//! In the distributed variant a statement job is split into page-range
//! chunks dispatched over an at-least-once queue. Every message may be
//! redelivered, completion notices may race failure notices, and the first
//! chunk can finish before the splitter has announced the total. The
//! [`JobProgress`] tracker therefore keeps an explicit per-chunk state map
//! with idempotent transitions instead of mutating counters in place:
//! applying `Completed` twice is a no-op, `Failed` is terminal, and the
//! total chunk count is a set-once-or-confirm-equal value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A job submission: which statement to split, under which job id.
///
/// Field names match the JSON the splitter receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: String,
    /// Local path or URL of the source statement.
    pub source: String,
}

/// One queue message: a single page-range chunk to process.
///
/// Immutable once dispatched; consumed (at least once) by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub job_id: String,
    /// Store key of the materialised sub-document.
    pub chunk_key: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Payload of a chunk-complete notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkCompleteNotice {
    pub pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
}

/// Payload of a chunk-fail notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailNotice {
    pub error: String,
}

/// Lifecycle state of one chunk, keyed by chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkState {
    Pending,
    Completed,
    Failed,
}

/// Progress of one statement job across its chunks.
///
/// Transitions tolerate everything an at-least-once queue can throw at
/// them: duplicate completions, completions arriving before the total is
/// known, and completion/failure races. `Failed` is terminal for a chunk —
/// a later `Completed` for the same index is rejected, on the grounds that
/// a failure notice means the chunk's output was not persisted and a
/// racing success cannot be trusted.
#[derive(Debug, Clone)]
pub struct JobProgress {
    job_id: String,
    total_chunks: Option<usize>,
    chunks: HashMap<usize, ChunkState>,
    pages_processed: usize,
}

impl JobProgress {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            total_chunks: None,
            chunks: HashMap::new(),
            pages_processed: 0,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Record the authoritative total chunk count.
    ///
    /// Set-once-or-confirm-equal: the first non-zero value wins; a later
    /// differing value is ignored with a warning rather than corrupting
    /// the terminal condition.
    pub fn record_total(&mut self, total: usize) {
        match self.total_chunks {
            None => self.total_chunks = Some(total),
            Some(existing) if existing != total => {
                warn!(
                    job_id = %self.job_id,
                    existing, conflicting = total,
                    "conflicting totalChunks ignored"
                );
            }
            Some(_) => {}
        }
    }

    /// Apply a chunk-complete notification.
    ///
    /// Returns true when the state actually changed (first completion for
    /// this index); duplicates and completions after a failure return
    /// false and leave all counts untouched.
    pub fn record_completed(&mut self, chunk_index: usize, pages: usize) -> bool {
        if let Some(total) = self.total_chunks {
            if chunk_index >= total {
                warn!(
                    job_id = %self.job_id,
                    chunk_index, total,
                    "completion for out-of-range chunk index ignored"
                );
                return false;
            }
        }
        match self.chunks.get(&chunk_index) {
            Some(ChunkState::Completed) => false,
            Some(ChunkState::Failed) => {
                warn!(
                    job_id = %self.job_id,
                    chunk_index,
                    "completion after failure ignored (Failed is terminal)"
                );
                false
            }
            _ => {
                self.chunks.insert(chunk_index, ChunkState::Completed);
                self.pages_processed += pages;
                true
            }
        }
    }

    /// Apply a chunk-fail notification. Idempotent; a failure after a
    /// completion is ignored (the chunk's output was already persisted).
    pub fn record_failed(&mut self, chunk_index: usize) -> bool {
        match self.chunks.get(&chunk_index) {
            Some(ChunkState::Completed) | Some(ChunkState::Failed) => false,
            _ => {
                self.chunks.insert(chunk_index, ChunkState::Failed);
                true
            }
        }
    }

    pub fn state_of(&self, chunk_index: usize) -> ChunkState {
        self.chunks
            .get(&chunk_index)
            .copied()
            .unwrap_or(ChunkState::Pending)
    }

    pub fn total_chunks(&self) -> Option<usize> {
        self.total_chunks
    }

    pub fn completed_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|s| **s == ChunkState::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|s| **s == ChunkState::Failed)
            .count()
    }

    pub fn pages_processed(&self) -> usize {
        self.pages_processed
    }

    /// A job is terminal once every known chunk has resolved. Unknown
    /// total means not terminal: a completion count alone proves nothing.
    pub fn is_terminal(&self) -> bool {
        match self.total_chunks {
            Some(total) => self.completed_count() + self.failed_count() >= total,
            None => false,
        }
    }

    /// Percentage for display, capped at 99 until terminal (the final
    /// point is awarded only when the job actually finishes).
    pub fn percent(&self) -> u8 {
        match self.total_chunks {
            Some(total) if total > 0 => {
                if self.is_terminal() {
                    100
                } else {
                    let done = self.completed_count() + self.failed_count();
                    ((done * 100 / total) as u8).min(99)
                }
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_uses_camel_case_wire_keys() {
        let item = WorkItem {
            job_id: "job-1".into(),
            chunk_key: "chunks/job-1/chunk_0_3.pdf".into(),
            chunk_index: 0,
            total_chunks: 3,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["chunkKey"], "chunks/job-1/chunk_0_3.pdf");
        assert_eq!(json["totalChunks"], 3);
    }

    #[test]
    fn duplicate_completion_does_not_double_count() {
        let mut p = JobProgress::new("job-1");
        p.record_total(3);
        assert!(p.record_completed(0, 4));
        assert!(!p.record_completed(0, 4));
        assert_eq!(p.completed_count(), 1);
        assert_eq!(p.pages_processed(), 4);
    }

    #[test]
    fn completion_before_total_is_held_and_reconciled() {
        let mut p = JobProgress::new("job-1");
        assert!(p.record_completed(1, 4));
        assert!(!p.is_terminal());
        p.record_total(2);
        assert!(p.record_completed(0, 4));
        assert!(p.is_terminal());
        assert_eq!(p.pages_processed(), 8);
    }

    #[test]
    fn failed_is_terminal_for_the_chunk() {
        let mut p = JobProgress::new("job-1");
        p.record_total(2);
        assert!(p.record_failed(1));
        assert!(!p.record_completed(1, 4), "completion after failure must be rejected");
        assert_eq!(p.failed_count(), 1);
        assert_eq!(p.completed_count(), 0);
    }

    #[test]
    fn failure_after_completion_is_ignored() {
        let mut p = JobProgress::new("job-1");
        p.record_total(2);
        assert!(p.record_completed(0, 4));
        assert!(!p.record_failed(0));
        assert_eq!(p.completed_count(), 1);
        assert_eq!(p.failed_count(), 0);
    }

    #[test]
    fn terminal_mixes_completions_and_failures() {
        let mut p = JobProgress::new("job-1");
        p.record_total(3);
        p.record_completed(0, 4);
        p.record_completed(2, 2);
        assert!(!p.is_terminal());
        p.record_failed(1);
        assert!(p.is_terminal());
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn conflicting_total_keeps_first_value() {
        let mut p = JobProgress::new("job-1");
        p.record_total(3);
        p.record_total(5);
        assert_eq!(p.total_chunks(), Some(3));
    }

    #[test]
    fn percent_caps_at_99_before_terminal() {
        let mut p = JobProgress::new("job-1");
        p.record_total(1000);
        for i in 0..999 {
            p.record_completed(i, 1);
        }
        assert_eq!(p.percent(), 99);
        p.record_completed(999, 1);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn unknown_total_is_never_terminal() {
        let mut p = JobProgress::new("job-1");
        p.record_completed(0, 4);
        p.record_completed(1, 4);
        assert!(!p.is_terminal());
        assert_eq!(p.percent(), 0);
    }
}
