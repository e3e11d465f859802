//! Page chunking: partition a statement into fixed-size page ranges and
//! materialise each range as a standalone PDF.
//!
//! Range computation is pure and cheap; materialisation goes through pdfium
//! (copy pages into a fresh document, serialise to bytes) and therefore runs
//! on the blocking pool. A chunk's identity is stable and derived only from
//! its page range, so re-splitting the same document always produces the
//! same chunk keys.

use crate::error::ExtractError;
use crate::pipeline::extract_text::open_document;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// A contiguous, inclusive range of 0-based page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    /// Inclusive last page of the range.
    pub end: usize,
}

impl PageRange {
    /// Number of pages in the range (always at least one).
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Stable chunk identifier, e.g. `chunk_0_3` for pages 0..=3.
    pub fn id(&self) -> String {
        format!("chunk_{}_{}", self.start, self.end)
    }
}

/// A materialised chunk: its range plus the bytes of the sub-document.
#[derive(Debug, Clone)]
pub struct ChunkDocument {
    pub range: PageRange,
    pub bytes: Vec<u8>,
}

/// Partition `total_pages` pages into contiguous ranges of at most
/// `max_per_chunk` pages each.
///
/// Every page index in `0..total_pages` appears in exactly one range and
/// ranges come back in ascending page order. Zero pages yields zero ranges.
pub fn split_ranges(total_pages: usize, max_per_chunk: usize) -> Vec<PageRange> {
    let max_per_chunk = max_per_chunk.max(1);
    let mut ranges = Vec::with_capacity(total_pages.div_ceil(max_per_chunk));
    let mut start = 0;
    while start < total_pages {
        let end = (start + max_per_chunk - 1).min(total_pages - 1);
        ranges.push(PageRange { start, end });
        start = end + 1;
    }
    ranges
}

/// Split the PDF at `path` into per-range sub-documents.
///
/// # Errors
/// Document-level failures only (open/decrypt/copy/serialise). An empty
/// document is reported as [`ExtractError::EmptyDocument`] so a job never
/// silently fans out to zero work items.
pub async fn materialize_chunks(
    path: &Path,
    password: Option<String>,
    max_per_chunk: usize,
) -> Result<Vec<ChunkDocument>, ExtractError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        materialize_chunks_blocking(&path, password.as_deref(), max_per_chunk)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("chunking task panicked: {}", e)))?
}

fn materialize_chunks_blocking(
    path: &Path,
    password: Option<&str>,
    max_per_chunk: usize,
) -> Result<Vec<ChunkDocument>, ExtractError> {
    let pdfium = Pdfium::default();
    let source = open_document(&pdfium, path, password)?;

    let total_pages = source.pages().len() as usize;
    if total_pages == 0 {
        return Err(ExtractError::EmptyDocument {
            path: path.to_path_buf(),
            pages: 0,
        });
    }

    let ranges = split_ranges(total_pages, max_per_chunk);
    info!(
        "splitting {} pages into {} chunks of up to {} pages",
        total_pages,
        ranges.len(),
        max_per_chunk
    );

    let mut chunks = Vec::with_capacity(ranges.len());

    for range in ranges {
        let mut destination = pdfium
            .create_new_pdf()
            .map_err(|e| ExtractError::Internal(format!("failed to create chunk document: {:?}", e)))?;

        destination
            .pages_mut()
            .copy_page_range_from_document(&source, range.start as u16..=range.end as u16, 0)
            .map_err(|e| ExtractError::Internal(format!(
                "failed to copy pages {}..={}: {:?}",
                range.start, range.end, e
            )))?;

        let bytes = destination
            .save_to_bytes()
            .map_err(|e| ExtractError::Internal(format!(
                "failed to serialise chunk {}: {:?}",
                range.id(),
                e
            )))?;

        debug!("materialised {} ({} bytes)", range.id(), bytes.len());
        chunks.push(ChunkDocument { range, bytes });
    }

    Ok(chunks)
}
