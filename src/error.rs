//! Error types for the challan-reader library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ChallanError`] is **fatal**: the document cannot be processed at all
//!   (missing file, corrupt PDF, pdfium unavailable, provider misconfigured).
//!   Returned as `Err(ChallanError)` from the top-level `extract*` functions.
//!
//! * [`PageError`] is **non-fatal**: the model call for a single page failed.
//!   Stored inside [`crate::output::PageOutcome::Failed`]; the remaining
//!   pages are still processed and the page simply contributes no records.
//!
//! [`ModelError`] is what a [`crate::pipeline::model::VisionModel`] backend
//! returns; the page loop folds it into a [`PageError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the challan-reader library.
#[derive(Debug, Error)]
pub enum ChallanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers are all beyond the actual page count.
    #[error("No selected page exists (document has {total} pages)")]
    PageOutOfRange { total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the binary or set CHALLAN_PDFIUM_LIB to its directory."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The named provider could not be constructed.
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The model call failed; the page is skipped.
    #[error("Page {page}: model call failed: {detail}")]
    ModelFailed { page: usize, detail: String },

    /// The model refused the request on content-safety grounds.
    #[error("Page {page}: blocked by safety filter: {reason}")]
    Blocked { page: usize, reason: String },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ModelFailed { page, .. } | PageError::Blocked { page, .. } => *page,
        }
    }

    pub(crate) fn from_model(page: usize, err: ModelError) -> Self {
        match err {
            ModelError::Blocked { reason } => PageError::Blocked { page, reason },
            other => PageError::ModelFailed {
                page,
                detail: other.to_string(),
            },
        }
    }
}

/// Errors raised by a vision model backend for one request.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No API key was available when the request was made.
    #[error("no API key configured (set {env_var})")]
    MissingApiKey { env_var: &'static str },

    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The prompt or the candidate was blocked by the safety filter.
    #[error("{reason}")]
    Blocked { reason: String },

    /// The API answered but carried no usable candidate content.
    #[error("response has no content (finish reason: {finish_reason})")]
    NoContent { finish_reason: String },

    /// Any other backend-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Rejections of an upload before any processing starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The multipart body had no `file` field.
    #[error("Missing PDF file")]
    MissingFile,

    /// The uploaded filename does not end in `.pdf`.
    #[error("Only PDF files are supported.")]
    NotPdf { filename: String },
}

/// Errors from the batch client for one file.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The local file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request could not be sent or the body could not be decoded.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

/// Errors while writing the exported table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The CSV writer failed (encoding or underlying I/O).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_error_display() {
        let e = PageError::ModelFailed {
            page: 3,
            detail: "quota exceeded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 3"), "got: {msg}");
        assert!(msg.contains("quota exceeded"), "got: {msg}");
    }

    #[test]
    fn blocked_model_error_maps_to_blocked_page_error() {
        let e = PageError::from_model(
            2,
            ModelError::Blocked {
                reason: "SAFETY".into(),
            },
        );
        assert_eq!(
            e,
            PageError::Blocked {
                page: 2,
                reason: "SAFETY".into()
            }
        );
        assert_eq!(e.page(), 2);
    }

    #[test]
    fn api_model_error_maps_to_model_failed() {
        let e = PageError::from_model(
            1,
            ModelError::Api {
                status: 429,
                message: "Resource has been exhausted".into(),
            },
        );
        match e {
            PageError::ModelFailed { page, detail } => {
                assert_eq!(page, 1);
                assert!(detail.contains("429"), "got: {detail}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn upload_error_messages() {
        assert_eq!(UploadError::MissingFile.to_string(), "Missing PDF file");
        assert_eq!(
            UploadError::NotPdf {
                filename: "notes.txt".into()
            }
            .to_string(),
            "Only PDF files are supported."
        );
    }

    #[test]
    fn missing_key_mentions_env_var() {
        let e = ModelError::MissingApiKey {
            env_var: "GOOGLE_API_KEY",
        };
        assert!(e.to_string().contains("GOOGLE_API_KEY"));
    }
}
