//! Per-page text extraction: native PDF text with OCR fallback.
//!
//! ## State machine per page
//!
//! `NativeAttempt → (text non-empty ? DONE : OcrAttempt) → DONE`
//!
//! The native attempt asks pdfium for the page's text layer. Scanned
//! statements have none, so the fallback rasterises exactly that page,
//! converts it to grayscale, binarises it at a fixed threshold, and hands
//! the result to the OCR engine. A page that yields nothing from either
//! path is recorded as a failure; extraction continues for the remaining
//! pages. Only a decryption failure is fatal for the whole document.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state that is not safe to
//! drive from async contexts, and OCR shells out to an external binary.
//! Both run on the blocking pool so Tokio worker threads never stall.

use crate::error::ExtractError;
use crate::ocr::{binarize, OcrEngine};
use crate::progress::ExtractionProgressCallback;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One page's extraction result.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based page index within the document that was opened.
    pub index: usize,
    /// Recovered text; `None` when both paths failed.
    pub text: Option<String>,
    /// True when the text came from the OCR fallback.
    pub via_ocr: bool,
}

impl Page {
    pub fn failed(&self) -> bool {
        self.text.is_none()
    }
}

/// Indices of pages that yielded no text from either path.
pub fn failed_pages(pages: &[Page]) -> Vec<usize> {
    pages.iter().filter(|p| p.failed()).map(|p| p.index).collect()
}

/// Concatenate all recovered page texts in page order.
pub fn joined_text(pages: &[Page]) -> String {
    let mut out = String::new();
    for page in pages {
        if let Some(ref text) = page.text {
            out.push('\n');
            out.push_str(text);
        }
    }
    out
}

/// Extract text from every page of the PDF at `path`.
///
/// # Errors
/// Fatal only for document-level problems: [`ExtractError::PasswordRequired`],
/// [`ExtractError::WrongPassword`], [`ExtractError::CorruptPdf`]. Per-page
/// failures are recorded in the returned pages, never propagated.
pub async fn extract_pages(
    path: &Path,
    password: Option<String>,
    ocr: Arc<dyn OcrEngine>,
    ocr_threshold: u8,
    progress: Option<Arc<dyn ExtractionProgressCallback>>,
) -> Result<Vec<Page>, ExtractError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        extract_pages_blocking(&path, password.as_deref(), ocr.as_ref(), ocr_threshold, progress)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("extraction task panicked: {}", e)))?
}

/// Open a PDF, distinguishing password problems from ordinary corruption.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ExtractError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.to_lowercase().contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            ExtractError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn extract_pages_blocking(
    path: &Path,
    password: Option<&str>,
    ocr: &dyn OcrEngine,
    ocr_threshold: u8,
    progress: Option<Arc<dyn ExtractionProgressCallback>>,
) -> Result<Vec<Page>, ExtractError> {
    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, path, password)?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("PDF loaded: {} pages", total);

    if let Some(ref cb) = progress {
        cb.on_extraction_start(total);
    }

    // 2000 px on the long edge is crisp enough for OCR without letting an
    // oversized page exhaust memory.
    let render_config = PdfRenderConfig::new()
        .set_target_width(2000)
        .set_maximum_height(2000);

    let mut results = Vec::with_capacity(total);

    for idx in 0..total {
        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("page {} unreadable: {:?}", idx, e);
                results.push(Page {
                    index: idx,
                    text: None,
                    via_ocr: false,
                });
                if let Some(ref cb) = progress {
                    cb.on_page_extracted(idx, false, true);
                }
                continue;
            }
        };

        let native = page
            .text()
            .map(|t| t.all())
            .unwrap_or_default();

        let (text, via_ocr) = if !native.trim().is_empty() {
            debug!("page {}: native text ({} bytes)", idx, native.len());
            (Some(native), false)
        } else {
            match ocr_page(&page, &render_config, ocr, ocr_threshold) {
                Ok(ocr_text) if !ocr_text.trim().is_empty() => {
                    debug!("page {}: OCR text ({} bytes)", idx, ocr_text.len());
                    (Some(ocr_text), true)
                }
                Ok(_) => {
                    warn!("page {} is empty or unreadable", idx);
                    (None, true)
                }
                Err(e) => {
                    warn!("page {}: OCR fallback failed: {}", idx, e);
                    (None, true)
                }
            }
        };

        if let Some(ref cb) = progress {
            cb.on_page_extracted(idx, via_ocr, text.is_none());
        }

        results.push(Page {
            index: idx,
            text,
            via_ocr,
        });
    }

    Ok(results)
}

/// Rasterise one page, binarise it, and run OCR over the temp image.
fn ocr_page(
    page: &PdfPage<'_>,
    render_config: &PdfRenderConfig,
    ocr: &dyn OcrEngine,
    threshold: u8,
) -> Result<String, ExtractError> {
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| ExtractError::Internal(format!("rasterisation failed: {:?}", e)))?;

    let mut gray = bitmap.as_image().to_luma8();
    binarize(&mut gray, threshold);

    let tmp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {}", e)))?;
    gray.save(tmp.path())
        .map_err(|e| ExtractError::Internal(format!("image write: {}", e)))?;

    ocr.recognize(tmp.path())
        .map_err(|e| ExtractError::Internal(e.to_string()))
}
