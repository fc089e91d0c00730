//! Error types for the flipfolio library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`FolioError`]: **Fatal** for the operation that returned it: the
//!   document bytes could not be fetched or decoded, the storage collaborator
//!   refused to sign a URL, the view was disposed. A viewer that hits one of
//!   these during `load()` moves to its terminal `Error` phase.
//!
//! * [`PageError`]: **Non-fatal**: one page failed to rasterise, or one
//!   overlay element could not be painted. Stored inside
//!   [`crate::viewer::PaintedPage`] so sibling pages and elements keep
//!   rendering.
//!
//! * [`ValidationError`]: extracted content was rejected on ingestion. The
//!   viewer treats this as "extraction unavailable" and degrades to plain page
//!   images instead of failing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the flipfolio library.
#[derive(Debug, Error)]
pub enum FolioError {
    // ── Storage errors ────────────────────────────────────────────────────
    /// No storage endpoint was supplied to a component that needs one.
    #[error("Storage is not configured.\n{hint}")]
    StorageNotConfigured { hint: String },

    /// The storage collaborator could not issue a signed URL.
    #[error("Failed to sign a URL for '{path}': {reason}")]
    SigningFailed { path: String, reason: String },

    /// Network error or non-success status while fetching a signed URL.
    ///
    /// `status` is `None` when no HTTP response was received at all.
    #[error("Failed to fetch '{url}': {reason}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// The fetch exceeded the configured timeout.
    #[error("Fetch timed out after {secs}s for '{url}'")]
    FetchTimeout { url: String, secs: u64 },

    /// Storing an object failed.
    #[error("Upload to '{path}' failed: {reason}")]
    UploadFailed { path: String, reason: String },

    /// The file offered for upload was rejected before any network call.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// The fetched bytes do not start with the PDF magic.
    #[error("Document is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// pdfium could not open the document.
    #[error("Document could not be decoded: {detail}")]
    DecodeFailed { detail: String },

    /// A page index outside `0..total` was requested.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium library could not be bound.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Extracted content failed validation.
    #[error(transparent)]
    InvalidContent(#[from] ValidationError),

    /// The extraction service call failed.
    #[error("Extraction request for '{path}' failed: {reason}")]
    ExtractionRequestFailed { path: String, reason: String },

    // ── View errors ───────────────────────────────────────────────────────
    /// The view was disposed; any in-flight result has been discarded.
    #[error("View has been disposed")]
    Disposed,

    /// An operation needed a loaded document.
    #[error("View is not ready (phase: {phase})")]
    NotReady { phase: String },

    /// The requested view mode cannot be shown for this document.
    #[error("View mode '{mode}' is unavailable: {reason}")]
    ModeUnavailable { mode: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FolioError {
    /// Whether the host should offer a retry affordance.
    ///
    /// Only transport failures qualify. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FolioError::FetchFailed { .. }
                | FolioError::FetchTimeout { .. }
                | FolioError::SigningFailed { .. }
        )
    }

    /// True for a fetch that reached the server and got `404 Not Found`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FolioError::FetchFailed { status: Some(404), .. })
    }
}

/// A non-fatal error for a single page or a single overlay element.
///
/// `page` is 1-indexed as shown to readers; `element` is the element's
/// 0-based position in its page's element list.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// One overlay element could not be painted and was omitted.
    #[error("Page {page}, element {element}: render failed: {detail}")]
    ElementRenderFailed {
        page: usize,
        element: usize,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } => *page,
            PageError::ElementRenderFailed { page, .. } => *page,
        }
    }
}

/// Reasons extracted content is rejected on ingestion.
///
/// Page numbers are 1-indexed; element positions are 0-based.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("metadata.pageCount is {declared} but {actual} pages are present")]
    PageCountMismatch { declared: usize, actual: usize },

    #[error("page {page}, element {element}: unrecognised element type '{tag}'")]
    UnknownElementType {
        page: usize,
        element: usize,
        tag: String,
    },

    #[error(
        "page {page}, element {element}: position.{field} is {value}, expected a finite non-negative number"
    )]
    InvalidPosition {
        page: usize,
        element: usize,
        field: &'static str,
        value: f64,
    },

    #[error("page {page}: dimensions {width}x{height} must be finite and positive")]
    InvalidPageSize { page: usize, width: f64, height: f64 },

    #[error("malformed extracted content: {0}")]
    Malformed(String),
}
