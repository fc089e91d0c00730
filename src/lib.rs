//! # flipfolio
//!
//! Render stored PDF documents as flip-books, scrollable pages with a
//! semantic overlay, or themed reflowed text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! logical path
//!  │
//!  ├─ 1. Sign     storage collaborator issues a time-limited URL
//!  ├─ 2. Cache    process-wide bytes cache keyed by signed URL
//!  ├─ 3. Decode   page count + page sizes via pdfium (spawn_blocking)
//!  ├─ 4. Paint    flip view (windowed) or scroll view (all pages)
//!  ├─ 5. Overlay  extracted elements scaled onto displayed pages
//!  └─ 6. Reflow   dynamic view from extracted content + resolved theme
//! ```
//!
//! Extracted content (`<document>.extracted.json`) is optional everywhere:
//! without it the scroll view paints bare pages and the dynamic view is not
//! offered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flipfolio::{
//!     DocumentViewer, HttpFetcher, PdfiumDecoder, PublicBucketStorage, ResourceCache,
//!     SignedResourceCache, ViewerConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig::default();
//!     let resources = Arc::new(SignedResourceCache::new(
//!         Arc::new(PublicBucketStorage::new("https://bucket.example.com")?),
//!         Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?),
//!         ResourceCache::shared(),
//!         config.signed_url_expires_in(),
//!     ));
//!     let mut viewer = DocumentViewer::new(
//!         config,
//!         resources,
//!         Arc::new(PdfiumDecoder::default()),
//!         "public/annual-report-k3x9q2.pdf",
//!     );
//!     viewer.load().await?;
//!     viewer.load_extraction().await?;
//!
//!     for page in viewer.paint_scroll().await? {
//!         let elements = page.overlay.map(|o| o.items.len()).unwrap_or(0);
//!         println!("page {}: {} overlay elements", page.index + 1, elements);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `flipfolio` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! flipfolio = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod folio;
pub mod geometry;
pub mod pipeline;
pub mod storage;
pub mod stream;
pub mod theme;
pub mod upload;
pub mod view;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{ResourceCache, ResourceHandle, SignedResourceCache};
pub use config::{ViewerConfig, ViewerConfigBuilder};
pub use content::{ExtractedContent, ExtractedPage, PageElement};
pub use error::{FolioError, PageError, ValidationError};
pub use events::{EventSink, ViewEvent};
pub use folio::{document_path, extracted_content_path, slug_for_file_name, slug_to_title};
pub use geometry::{displayed_size, scale_factor, scale_rect, Rect, Size, SizingPreset};
pub use pipeline::decode::{DocumentDecoder, DocumentGeometry, PdfiumDecoder};
pub use pipeline::encode;
pub use pipeline::extraction::{load_extracted_content, ExtractionClient, ExtractionStatus};
pub use pipeline::input::{Fetcher, HttpFetcher};
pub use pipeline::overlay::{build_overlay, OverlayItem, PageOverlay};
pub use storage::{PublicBucketStorage, SignedUrl, StorageClient, TransferProgress};
pub use stream::{scroll_pages, PageStream};
pub use theme::{resolve as resolve_theme, ExtractedTheme, ResolvedTheme};
pub use upload::{start_upload, UploadEvent, UploadTask, MAX_UPLOAD_BYTES};
pub use view::{ViewMode, ViewState, ZoomBounds};
pub use viewer::{DisposeToken, DocumentViewer, PaintedPage, PageSlot, ReflowDocument, ViewPhase};
