//! OCR seam: recognise text from a binarised page image.
//!
//! OCR is a capability black box for this crate — quality is out of scope,
//! failure is per-page and non-fatal. The bundled [`TesseractOcr`] shells
//! out to the `tesseract` binary because that is the most widely deployed
//! option and keeps the crate free of native OCR bindings; any other engine
//! (ocrs, PaddleOCR, a vision model) can implement [`OcrEngine`] instead.

use image::GrayImage;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors from a single OCR invocation. Always recovered by the caller
/// (the page is recorded as failed and extraction continues).
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR binary not available: {0}")]
    NotAvailable(String),

    #[error("OCR run failed: {0}")]
    Failed(String),

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text recognition over a pre-processed (grayscale, binarised) page image.
pub trait OcrEngine: Send + Sync {
    /// Recognise text in the image file at `path`.
    fn recognize(&self, path: &Path) -> Result<String, OcrError>;
}

/// Tesseract CLI backend: `tesseract <image> stdout -l <lang>`.
pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            language: "eng".to_string(),
        }
    }

    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let text = String::from_utf8_lossy(&output.stdout).to_string();
                debug!("tesseract produced {} bytes from {}", text.len(), path.display());
                Ok(text)
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::Failed(format!("tesseract failed: {}", stderr)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::NotAvailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

/// Map a grayscale image to pure black/white at a fixed threshold.
///
/// Values above the threshold become 255, the rest 0. Run before OCR so
/// faint watermarks and table rules do not read as characters.
pub fn binarize(image: &mut GrayImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn binarize_maps_around_threshold() {
        let mut img = GrayImage::from_fn(3, 1, |x, _| match x {
            0 => Luma([10u8]),
            1 => Luma([150u8]),
            _ => Luma([200u8]),
        });
        binarize(&mut img, 150);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        // Exactly at the threshold stays black; only strictly above is white.
        assert_eq!(img.get_pixel(1, 0).0[0], 0);
        assert_eq!(img.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn binarize_is_idempotent() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([180u8]));
        binarize(&mut img, 150);
        let first: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        binarize(&mut img, 150);
        let second: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_binary_reports_not_available() {
        struct Probe;
        impl OcrEngine for Probe {
            fn recognize(&self, _path: &Path) -> Result<String, OcrError> {
                Err(OcrError::NotAvailable("tesseract not found".into()))
            }
        }
        let err = Probe.recognize(Path::new("/tmp/x.png")).unwrap_err();
        assert!(err.to_string().contains("not available"));
    }
}
