//! PDF decoding: page geometry probing and page rasterisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and keeps
//! thread-local state. All pdfium work runs inside
//! `tokio::task::spawn_blocking` so the async workers never stall while a
//! page is being decoded.
//!
//! ## Why a trait?
//!
//! The viewer depends on [`DocumentDecoder`], not on pdfium. Hosts that
//! already own a renderer (or tests that have no libpdfium) provide their own
//! implementation.

use crate::error::{FolioError, PageError};
use crate::geometry::Size;
use futures::future::BoxFuture;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page count and native page sizes of a decoded document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentGeometry {
    /// Native size of each page in PDF points, in page order.
    pub page_sizes: Vec<Size>,
}

impl DocumentGeometry {
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    pub fn page_size(&self, index: usize) -> Option<Size> {
        self.page_sizes.get(index).copied()
    }
}

/// Result of rasterising one page; failures are per page.
pub type RasterisedPage = (usize, Result<DynamicImage, PageError>);

/// Decodes PDF bytes. Implementations must be cheap to share.
pub trait DocumentDecoder: Send + Sync {
    /// Read page count and page sizes. Fails with
    /// [`FolioError::DecodeFailed`] when the bytes cannot be opened.
    fn probe(&self, bytes: Arc<[u8]>) -> BoxFuture<'static, Result<DocumentGeometry, FolioError>>;

    /// Rasterise `pages` (0-based) at `target_width` pixels.
    ///
    /// The outer error is for whole-document failures; a single bad page is
    /// reported in its own slot.
    fn rasterise(
        &self,
        bytes: Arc<[u8]>,
        pages: Vec<usize>,
        target_width: u32,
    ) -> BoxFuture<'static, Result<Vec<RasterisedPage>, FolioError>>;
}

/// pdfium-backed decoder.
#[derive(Debug, Clone)]
pub struct PdfiumDecoder {
    max_rendered_pixels: u32,
}

impl PdfiumDecoder {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels,
        }
    }
}

impl Default for PdfiumDecoder {
    fn default() -> Self {
        Self::new(2000)
    }
}

impl DocumentDecoder for PdfiumDecoder {
    fn probe(&self, bytes: Arc<[u8]>) -> BoxFuture<'static, Result<DocumentGeometry, FolioError>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || probe_blocking(&bytes))
                .await
                .map_err(|e| FolioError::Internal(format!("Probe task panicked: {}", e)))?
        })
    }

    fn rasterise(
        &self,
        bytes: Arc<[u8]>,
        pages: Vec<usize>,
        target_width: u32,
    ) -> BoxFuture<'static, Result<Vec<RasterisedPage>, FolioError>> {
        let max_pixels = self.max_rendered_pixels;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                rasterise_blocking(&bytes, &pages, target_width.min(max_pixels), max_pixels)
            })
            .await
            .map_err(|e| FolioError::Internal(format!("Render task panicked: {}", e)))?
        })
    }
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system.
pub fn bind_pdfium() -> Result<Pdfium, FolioError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| FolioError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn open<'a>(pdfium: &'a Pdfium, bytes: &[u8]) -> Result<PdfDocument<'a>, FolioError> {
    pdfium
        .load_pdf_from_byte_vec(bytes.to_vec(), None)
        .map_err(|e| FolioError::DecodeFailed {
            detail: format!("{:?}", e),
        })
}

fn probe_blocking(bytes: &[u8]) -> Result<DocumentGeometry, FolioError> {
    let pdfium = bind_pdfium()?;
    let document = open(&pdfium, bytes)?;

    let page_sizes: Vec<Size> = document
        .pages()
        .iter()
        .map(|page| Size::new(page.width().value as f64, page.height().value as f64))
        .collect();

    if page_sizes.is_empty() {
        return Err(FolioError::DecodeFailed {
            detail: "document has no pages".into(),
        });
    }
    info!("PDF decoded: {} pages", page_sizes.len());
    Ok(DocumentGeometry { page_sizes })
}

fn rasterise_blocking(
    bytes: &[u8],
    indices: &[usize],
    target_width: u32,
    max_pixels: u32,
) -> Result<Vec<RasterisedPage>, FolioError> {
    let pdfium = bind_pdfium()?;
    let document = open(&pdfium, bytes)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width.max(1) as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());
    for &idx in indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let rendered =
            render_page(pages, idx, &render_config).map_err(|e| PageError::RenderFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            });

        match &rendered {
            Ok(image) => debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            ),
            Err(e) => warn!("{}", e),
        }
        results.push((idx, rendered));
    }

    Ok(results)
}

fn render_page(
    pages: &PdfPages<'_>,
    idx: usize,
    config: &PdfRenderConfig,
) -> Result<DynamicImage, PdfiumError> {
    let page = pages.get(idx as u16)?;
    let bitmap = page.render_with_config(config)?;
    Ok(bitmap.as_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_lookup() {
        let g = DocumentGeometry {
            page_sizes: vec![Size::new(612.0, 792.0), Size::new(792.0, 612.0)],
        };
        assert_eq!(g.page_count(), 2);
        assert_eq!(g.page_size(1), Some(Size::new(792.0, 612.0)));
        assert_eq!(g.page_size(2), None);
    }

    #[test]
    fn default_decoder_caps_at_2000() {
        assert_eq!(PdfiumDecoder::default().max_rendered_pixels, 2000);
    }
}
