//! Error types for highlight extraction.
//!
//! Only [`SourceError::Open`] and OCR setup failures end a run. Everything a
//! single page, annotation or strategy can raise is absorbed further up.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ai::AiError;

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the document/page provider.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The document cannot be opened or parsed at all.
    #[error("failed to open PDF {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },
    /// A single page could not be read; the rest of the document is still usable.
    #[error("failed to read page {page}: {reason}")]
    Page { page: usize, reason: String },
}

/// Failures of the page rasterizer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer is not available: {0}")]
    Unavailable(String),
    #[error("rendering page {page} failed: {reason}")]
    Failed { page: usize, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Failures of the OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Language data is missing. Raised once, before any page is processed.
    #[error("{}", model_not_found_message(.language, .searched))]
    ModelNotFound {
        language: String,
        searched: Vec<PathBuf>,
    },
    #[error("tesseract executable is not available: {0}")]
    EngineUnavailable(String),
    #[error("recognition failed: {0}")]
    Recognition(String),
    #[error("failed to encode image for OCR: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn model_not_found_message(language: &str, searched: &[PathBuf]) -> String {
    let mut message = format!(
        "could not find Tesseract language data '{language}.traineddata'; searched:"
    );
    for path in searched {
        let _ = write!(message, "\n  - {}", path.display());
    }
    message.push_str(
        "\ninstall Tesseract, set TESSDATA_PREFIX, or run download_models to fetch the data",
    );
    message
}

/// Why a single strategy produced nothing for one annotation.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("malformed quad points: {0} values is not a multiple of 8")]
    MalformedQuadPoints(usize),
    #[error("highlight maps to an empty image region")]
    EmptyCrop,
    #[error("no renderer or OCR engine configured")]
    OcrUnavailable,
    #[error("page image is not available")]
    NoPageImage,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Upscale(#[from] AiError),
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Upscale(#[from] AiError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
