//! One viewing session of a stored document.
//!
//! ## Lifecycle
//!
//! ```text
//! Loading ──▶ Ready ──▶ Disposed
//!    │                     ▲
//!    └──────▶ Error ───────┘
//! ```
//!
//! [`DocumentViewer::load`] resolves the document bytes through the shared
//! [`SignedResourceCache`], checks the PDF magic and probes page geometry.
//! Nothing is painted before that completes. A fetch or decode failure moves
//! the view to `Error`; calling `load` again retries.
//!
//! Disposal can happen while a load is suspended: hold a [`DisposeToken`]
//! (from [`DocumentViewer::dispose_token`]) in the task that tears the view
//! down. Results that arrive after disposal are dropped.
//!
//! ## Painting
//!
//! * Flip view paints only pages inside the render window around `current`;
//!   every other page still gets a layout slot of the right size.
//! * Scroll view paints every page and lays the semantic overlay on top when
//!   extracted content is available. Without it, pages paint bare.
//! * Dynamic view reflows the extracted content with the resolved theme and
//!   needs no page images at all.

use crate::cache::{ResourceHandle, SignedResourceCache};
use crate::config::ViewerConfig;
use crate::content::{ExtractedContent, ListType, PageElement};
use crate::error::{FolioError, PageError};
use crate::events::{EventSink, ViewEvent};
use crate::geometry::{displayed_size, Size};
use crate::pipeline::decode::{DocumentDecoder, DocumentGeometry};
use crate::pipeline::encode;
use crate::pipeline::extraction::{load_extracted_content, ExtractionStatus};
use crate::pipeline::input::check_pdf_magic;
use crate::pipeline::overlay::{build_overlay, PageOverlay};
use crate::theme::{resolve, LayoutGeometry, ResolvedTheme, TextStyle};
use crate::view::{ViewMode, ViewState};
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle phase of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    Ready,
    /// Whole-document failure; the message is user-facing.
    Error(String),
    Disposed,
}

impl fmt::Display for ViewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewPhase::Loading => f.write_str("loading"),
            ViewPhase::Ready => f.write_str("ready"),
            ViewPhase::Error(msg) => write!(f, "error: {msg}"),
            ViewPhase::Disposed => f.write_str("disposed"),
        }
    }
}

/// Shared disposal flag for one view.
#[derive(Debug, Clone, Default)]
pub struct DisposeToken(Arc<AtomicBool>);

impl DisposeToken {
    pub fn dispose(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct LoadedDocument {
    /// Keeps the cached bytes alive for this view.
    handle: ResourceHandle,
    geometry: DocumentGeometry,
}

/// Layout slot of one page in flip view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSlot {
    pub index: usize,
    /// Displayed size; reserved even when the page is not rendered.
    pub size: Size,
    pub rendered: bool,
}

/// One page as painted by a view.
#[derive(Debug, Clone)]
pub struct PaintedPage {
    /// 0-based.
    pub index: usize,
    pub size: Size,
    pub image: Option<DynamicImage>,
    pub error: Option<PageError>,
    /// Scroll view only, and only with extracted content for this page.
    pub overlay: Option<PageOverlay>,
}

impl PaintedPage {
    pub fn is_ok(&self) -> bool {
        self.image.is_some()
    }

    /// PNG bytes of the page image, if it painted.
    pub fn to_png(&self) -> Option<Result<Vec<u8>, image::ImageError>> {
        self.image.as_ref().map(encode::encode_png)
    }
}

/// A block of reflowed content in dynamic view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReflowBlock {
    Heading {
        page: usize,
        text: String,
        style: TextStyle,
    },
    Paragraph {
        page: usize,
        text: String,
        style: TextStyle,
    },
    List {
        page: usize,
        ordered: bool,
        items: Vec<String>,
        style: TextStyle,
    },
    Image {
        page: usize,
        /// Embedded image data exactly as extracted.
        src: String,
        alt: Option<String>,
    },
}

/// The whole document reflowed for dynamic view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflowDocument {
    pub layout: LayoutGeometry,
    pub paragraph_spacing: f64,
    pub blocks: Vec<ReflowBlock>,
}

/// A viewing session over one stored document.
pub struct DocumentViewer {
    config: ViewerConfig,
    resources: Arc<SignedResourceCache>,
    decoder: Arc<dyn DocumentDecoder>,
    document_path: String,
    state: ViewState,
    phase: ViewPhase,
    document: Option<LoadedDocument>,
    extraction: Option<ExtractionStatus>,
    theme: ResolvedTheme,
    disposed: DisposeToken,
    events: EventSink,
}

impl DocumentViewer {
    pub fn new(
        config: ViewerConfig,
        resources: Arc<SignedResourceCache>,
        decoder: Arc<dyn DocumentDecoder>,
        document_path: impl Into<String>,
    ) -> Self {
        let state = ViewState::new(config.initial_mode, config.zoom_bounds);
        Self {
            config,
            resources,
            decoder,
            document_path: document_path.into(),
            state,
            phase: ViewPhase::Loading,
            document: None,
            extraction: None,
            theme: resolve(None),
            disposed: DisposeToken::default(),
            events: EventSink::none(),
        }
    }

    /// Report events to `sink`.
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = sink;
        self
    }

    pub fn document_path(&self) -> &str {
        &self.document_path
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == ViewPhase::Ready
    }

    pub fn dispose_token(&self) -> DisposeToken {
        self.disposed.clone()
    }

    pub fn theme(&self) -> &ResolvedTheme {
        &self.theme
    }

    pub fn extraction(&self) -> Option<&ExtractionStatus> {
        self.extraction.as_ref()
    }

    pub fn extracted_content(&self) -> Option<&Arc<ExtractedContent>> {
        self.extraction.as_ref().and_then(ExtractionStatus::content)
    }

    /// Bytes of the loaded document, shared with the cache.
    pub fn document_bytes(&self) -> Option<&ResourceHandle> {
        self.document.as_ref().map(|d| &d.handle)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Fetch the document and probe its geometry.
    pub async fn load(&mut self) -> Result<(), FolioError> {
        if self.disposed.is_disposed() {
            self.mark_disposed();
            return Err(FolioError::Disposed);
        }
        self.set_phase(ViewPhase::Loading);
        info!("Loading {}", self.document_path);

        let result = self.load_document().await;

        if self.disposed.is_disposed() {
            debug!("Discarding load result for disposed view {}", self.document_path);
            self.mark_disposed();
            return Err(FolioError::Disposed);
        }

        match result {
            Ok(doc) => {
                let pages = doc.geometry.page_count();
                self.document = Some(doc);
                self.state.set_num_pages(pages);
                self.set_phase(ViewPhase::Ready);
                self.emit_page();
                info!("{} ready: {} pages", self.document_path, pages);
                Ok(())
            }
            Err(e) => {
                warn!("Loading {} failed: {}", self.document_path, e);
                self.document = None;
                self.set_phase(ViewPhase::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn load_document(&self) -> Result<LoadedDocument, FolioError> {
        let handle = self.resources.resolve(&self.document_path).await?;
        check_pdf_magic(handle.bytes())?;
        let geometry = self.decoder.probe(handle.shared_bytes()).await?;
        Ok(LoadedDocument { handle, geometry })
    }

    /// Look up extracted content for this document and attach the outcome.
    ///
    /// Never fails the view: a missing or invalid file only removes the
    /// overlay and the dynamic mode.
    pub async fn load_extraction(&mut self) -> Result<&ExtractionStatus, FolioError> {
        if self.disposed.is_disposed() {
            self.mark_disposed();
            return Err(FolioError::Disposed);
        }

        let status = load_extracted_content(
            self.resources.storage().as_ref(),
            self.resources.fetcher().as_ref(),
            &self.document_path,
            self.resources.expires_in(),
        )
        .await;

        if self.disposed.is_disposed() {
            self.mark_disposed();
            return Err(FolioError::Disposed);
        }
        Ok(self.attach_extraction(status))
    }

    /// Attach an already-known extraction outcome.
    pub fn attach_extraction(&mut self, status: ExtractionStatus) -> &ExtractionStatus {
        self.theme = resolve(status.content().map(|c| &c.theme));
        if let Some(notice) = status.notice() {
            self.events.emit(ViewEvent::ExtractionUnavailable(notice));
        }
        if !status.is_available() && self.state.mode() == ViewMode::Dynamic {
            self.state.set_mode(ViewMode::Scroll);
            self.events.emit(ViewEvent::ModeChanged(ViewMode::Scroll));
        }
        self.extraction.insert(status)
    }

    /// Tear the view down and release its reference to the cached bytes.
    pub fn dispose(&mut self) {
        self.disposed.dispose();
        self.mark_disposed();
    }

    fn mark_disposed(&mut self) {
        self.document = None;
        if self.phase != ViewPhase::Disposed {
            self.set_phase(ViewPhase::Disposed);
        }
    }

    fn set_phase(&mut self, phase: ViewPhase) {
        self.phase = phase.clone();
        self.events.emit(ViewEvent::PhaseChanged(phase));
    }

    fn emit_page(&self) {
        self.events.emit(ViewEvent::PageChanged {
            current: self.state.current(),
            num_pages: self.state.num_pages(),
        });
    }

    // ── Host surface ──────────────────────────────────────────────────────

    pub fn current(&self) -> usize {
        self.state.current()
    }

    /// Jump to a page; clamped to the document.
    pub fn set_current(&mut self, index: usize) -> usize {
        let current = self.state.set_current(index);
        self.emit_page();
        current
    }

    pub fn num_pages(&self) -> usize {
        self.state.num_pages()
    }

    pub fn set_num_pages(&mut self, n: usize) {
        self.state.set_num_pages(n);
        self.emit_page();
    }

    pub fn zoom_level(&self) -> f64 {
        self.state.zoom_level()
    }

    /// Set the zoom level; clamped to the configured bounds.
    pub fn set_zoom_level(&mut self, zoom: f64) -> f64 {
        let zoom = self.state.set_zoom_level(zoom);
        self.events.emit(ViewEvent::ZoomChanged(zoom));
        zoom
    }

    // ── Navigation and zoom ───────────────────────────────────────────────

    pub fn next_page(&mut self) -> bool {
        let moved = self.state.next();
        if moved {
            self.emit_page();
        }
        moved
    }

    pub fn previous_page(&mut self) -> bool {
        let moved = self.state.previous();
        if moved {
            self.emit_page();
        }
        moved
    }

    /// Multiply the zoom level by `factor` (pinch ratio or one UI step).
    pub fn zoom_by(&mut self, factor: f64) -> f64 {
        let zoom = self.state.zoom_by(factor);
        self.events.emit(ViewEvent::ZoomChanged(zoom));
        zoom
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.zoom_by(self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.zoom_by(1.0 / self.config.zoom_step)
    }

    pub fn mode(&self) -> ViewMode {
        self.state.mode()
    }

    /// Switch view mode. Dynamic mode needs extracted content.
    pub fn set_mode(&mut self, mode: ViewMode) -> Result<(), FolioError> {
        if mode == ViewMode::Dynamic {
            self.extracted_content()
                .ok_or_else(|| self.dynamic_unavailable())?;
        }
        self.state.set_mode(mode);
        self.events.emit(ViewEvent::ModeChanged(mode));
        Ok(())
    }

    /// Modes the host may offer for this document right now.
    pub fn available_modes(&self) -> Vec<ViewMode> {
        let mut modes = vec![ViewMode::Flipbook, ViewMode::Scroll];
        if self.extracted_content().is_some() {
            modes.push(ViewMode::Dynamic);
        }
        modes
    }

    fn dynamic_unavailable(&self) -> FolioError {
        let reason = self
            .extraction
            .as_ref()
            .and_then(ExtractionStatus::notice)
            .unwrap_or_else(|| "extracted content has not been loaded".into());
        FolioError::ModeUnavailable {
            mode: ViewMode::Dynamic.to_string(),
            reason,
        }
    }

    // ── Geometry ──────────────────────────────────────────────────────────

    fn loaded(&self) -> Result<&LoadedDocument, FolioError> {
        if self.disposed.is_disposed() {
            return Err(FolioError::Disposed);
        }
        match (&self.phase, &self.document) {
            (ViewPhase::Ready, Some(doc)) => Ok(doc),
            (phase, _) => Err(FolioError::NotReady {
                phase: phase.to_string(),
            }),
        }
    }

    /// Native size of a page in PDF points.
    pub fn native_page_size(&self, index: usize) -> Option<Size> {
        self.document.as_ref()?.geometry.page_size(index)
    }

    /// Displayed size of a page in `mode` at the current zoom.
    pub fn page_size(&self, index: usize, mode: ViewMode) -> Option<Size> {
        let native = self.native_page_size(index)?;
        Some(displayed_size(
            native,
            self.config.viewport_width,
            self.config.sizing_for(mode),
            self.state.zoom_level(),
        ))
    }

    fn target_pixel_width(&self, mode: ViewMode) -> u32 {
        let width = self.config.sizing_for(mode).base_width(self.config.viewport_width)
            * self.state.zoom_level()
            * self.config.device_pixel_ratio;
        (width.round() as u32).max(1)
    }

    // ── Flip view ─────────────────────────────────────────────────────────

    /// One slot per page; only window pages are marked rendered.
    pub fn layout_flipbook(&self) -> Result<Vec<PageSlot>, FolioError> {
        let doc = self.loaded()?;
        let window = self.state.render_window(self.config.render_window);
        let sizing = self.config.sizing_for(ViewMode::Flipbook);

        Ok(doc
            .geometry
            .page_sizes
            .iter()
            .enumerate()
            .map(|(index, native)| PageSlot {
                index,
                size: displayed_size(
                    *native,
                    self.config.viewport_width,
                    sizing,
                    self.state.zoom_level(),
                ),
                rendered: window.contains(&index),
            })
            .collect())
    }

    /// Paint the pages inside the render window around `current`.
    pub async fn paint_flipbook(&self) -> Result<Vec<PaintedPage>, FolioError> {
        let window = self.state.render_window(self.config.render_window);
        self.paint_pages(window.collect(), ViewMode::Flipbook).await
    }

    // ── Scroll view ───────────────────────────────────────────────────────

    /// Paint every page, with overlay where extracted content exists.
    pub async fn paint_scroll(&self) -> Result<Vec<PaintedPage>, FolioError> {
        let all = 0..self.loaded()?.geometry.page_count();
        self.paint_pages(all.collect(), ViewMode::Scroll).await
    }

    /// Paint one scroll-view page.
    pub async fn paint_scroll_page(&self, index: usize) -> Result<PaintedPage, FolioError> {
        let total = self.loaded()?.geometry.page_count();
        if index >= total {
            return Err(FolioError::PageOutOfRange {
                page: index + 1,
                total,
            });
        }
        let mut pages = self.paint_pages(vec![index], ViewMode::Scroll).await?;
        pages.pop().ok_or_else(|| {
            FolioError::Internal(format!("page {} produced no paint result", index + 1))
        })
    }

    async fn paint_pages(
        &self,
        indices: Vec<usize>,
        mode: ViewMode,
    ) -> Result<Vec<PaintedPage>, FolioError> {
        let doc = self.loaded()?;
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let rasters = self
            .decoder
            .rasterise(
                doc.handle.shared_bytes(),
                indices.clone(),
                self.target_pixel_width(mode),
            )
            .await?;
        if self.disposed.is_disposed() {
            return Err(FolioError::Disposed);
        }

        let mut by_index: HashMap<usize, Result<DynamicImage, PageError>> =
            rasters.into_iter().collect();

        Ok(indices
            .into_iter()
            .map(|index| {
                let raster = by_index.remove(&index).unwrap_or_else(|| {
                    Err(PageError::RenderFailed {
                        page: index + 1,
                        detail: "decoder returned no image".into(),
                    })
                });
                self.assemble(index, raster, mode)
            })
            .collect())
    }

    fn assemble(
        &self,
        index: usize,
        raster: Result<DynamicImage, PageError>,
        mode: ViewMode,
    ) -> PaintedPage {
        let size = self
            .page_size(index, mode)
            .unwrap_or(Size::new(0.0, 0.0));

        let (image, error) = match raster {
            Ok(img) => {
                self.events.emit(ViewEvent::PagePainted { page: index });
                (Some(img), None)
            }
            Err(e) => {
                warn!("{}", e);
                self.events.emit(ViewEvent::PageFailed(e.clone()));
                (None, Some(e))
            }
        };

        let overlay = match mode {
            ViewMode::Scroll => self
                .extracted_content()
                .and_then(|content| content.page(index))
                .map(|page| build_overlay(index, page, size.width, &self.theme)),
            _ => None,
        };
        if let Some(overlay) = &overlay {
            for skipped in &overlay.skipped {
                self.events.emit(ViewEvent::ElementSkipped(skipped.clone()));
            }
        }

        PaintedPage {
            index,
            size,
            image,
            error,
            overlay,
        }
    }

    // ── Dynamic view ──────────────────────────────────────────────────────

    /// Reflow the extracted content in reading order with the resolved theme.
    pub fn reflow(&self) -> Result<ReflowDocument, FolioError> {
        if self.disposed.is_disposed() {
            return Err(FolioError::Disposed);
        }
        let content = self
            .extracted_content()
            .ok_or_else(|| self.dynamic_unavailable())?;

        let body = self.theme.body_style();
        let heading = self.theme.heading_style();
        let mut blocks = Vec::new();

        for (page, extracted) in content.pages.iter().enumerate() {
            for element in &extracted.elements {
                blocks.push(match element {
                    PageElement::Heading(t) => ReflowBlock::Heading {
                        page,
                        text: t.content.clone(),
                        style: heading.clone(),
                    },
                    PageElement::Paragraph(t) => ReflowBlock::Paragraph {
                        page,
                        text: t.content.clone(),
                        style: body.clone(),
                    },
                    PageElement::List(l) => ReflowBlock::List {
                        page,
                        ordered: l.list_type == ListType::Ordered,
                        items: l.items.clone(),
                        style: body.clone(),
                    },
                    PageElement::Image(i) => ReflowBlock::Image {
                        page,
                        src: i.content.clone(),
                        alt: i.alt.clone(),
                    },
                });
            }
        }

        Ok(ReflowDocument {
            layout: self.theme.layout_geometry(),
            paragraph_spacing: self.theme.paragraph_spacing,
            blocks,
        })
    }
}

impl fmt::Debug for DocumentViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentViewer")
            .field("document_path", &self.document_path)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
