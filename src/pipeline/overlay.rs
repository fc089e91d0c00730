//! Semantic overlay: extracted elements positioned over a displayed page.
//!
//! Each element's native rectangle is scaled by
//! `displayed_page_width / native_page_width` and combined with the resolved
//! theme into a paint-ready [`OverlayItem`]. Elements are built one at a time
//! and a failure (today: undecodable embedded image data) drops only that
//! element, recorded as [`PageError::ElementRenderFailed`].

use crate::content::{
    ElementStyle, ExtractedPage, FontStyle, FontWeight, ListType, PageElement, TextAlign,
};
use crate::error::PageError;
use crate::geometry::{scale_factor, scale_rect, Rect};
use crate::theme::{ResolvedTheme, BODY_FONT_WEIGHT, HEADING_FONT_WEIGHT};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;
use tracing::warn;

/// Overlay text sits looser than the theme's body line height.
pub const OVERLAY_LINE_HEIGHT: f64 = 1.6;

const BOLD_FONT_WEIGHT: u16 = 700;

/// Paint-ready style of one overlay element, in displayed units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStyle {
    pub font_family: String,
    pub font_size: f64,
    pub line_height: f64,
    pub color: String,
    pub background_color: Option<String>,
    pub text_align: TextAlign,
    pub font_weight: u16,
    pub italic: bool,
}

/// What an overlay element shows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OverlayContent {
    Text {
        heading: bool,
        content: String,
    },
    List {
        ordered: bool,
        items: Vec<String>,
    },
    Image {
        #[serde(skip)]
        image: DynamicImage,
        width_px: u32,
        height_px: u32,
        alt: Option<String>,
    },
}

/// One element, scaled and styled for the displayed page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayItem {
    /// Position in the page's element list; also the stacking order.
    pub element: usize,
    pub rect: Rect,
    pub style: OverlayStyle,
    pub content: OverlayContent,
}

/// All paintable elements of one page plus the ones that were skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageOverlay {
    pub items: Vec<OverlayItem>,
    pub skipped: Vec<PageError>,
}

/// Build the overlay for one page displayed `displayed_width` units wide.
///
/// `page_index` is 0-based.
pub fn build_overlay(
    page_index: usize,
    page: &ExtractedPage,
    displayed_width: f64,
    theme: &ResolvedTheme,
) -> PageOverlay {
    let factor = scale_factor(page.width, displayed_width);
    let mut overlay = PageOverlay::default();

    for (idx, element) in page.elements.iter().enumerate() {
        match overlay_item(idx, element, factor, theme) {
            Ok(item) => overlay.items.push(item),
            Err(detail) => {
                let err = PageError::ElementRenderFailed {
                    page: page_index + 1,
                    element: idx,
                    detail,
                };
                warn!("Skipping overlay element: {}", err);
                overlay.skipped.push(err);
            }
        }
    }
    overlay
}

fn overlay_item(
    idx: usize,
    element: &PageElement,
    factor: f64,
    theme: &ResolvedTheme,
) -> Result<OverlayItem, String> {
    let rect = scale_rect(Rect::from(element.position()), factor);
    let heading = matches!(element, PageElement::Heading(_));
    let style = overlay_style(element.style(), heading, factor, theme);

    let content = match element {
        PageElement::Paragraph(t) | PageElement::Heading(t) => OverlayContent::Text {
            heading,
            content: t.content.clone(),
        },
        PageElement::List(l) => OverlayContent::List {
            ordered: l.list_type == ListType::Ordered,
            items: l.items.clone(),
        },
        PageElement::Image(i) => {
            let image = decode_embedded_image(&i.content)?;
            OverlayContent::Image {
                width_px: image.width(),
                height_px: image.height(),
                image,
                alt: i.alt.clone(),
            }
        }
    };

    Ok(OverlayItem {
        element: idx,
        rect,
        style,
        content,
    })
}

fn overlay_style(
    style: &ElementStyle,
    heading: bool,
    factor: f64,
    theme: &ResolvedTheme,
) -> OverlayStyle {
    let native_size = style
        .font_size
        .as_ref()
        .and_then(|s| s.value())
        .unwrap_or(if heading {
            theme.heading_font_size()
        } else {
            theme.base_font_size
        });

    let font_weight = if heading {
        HEADING_FONT_WEIGHT
    } else if style.font_weight == Some(FontWeight::Bold) {
        BOLD_FONT_WEIGHT
    } else {
        BODY_FONT_WEIGHT
    };

    OverlayStyle {
        font_family: style
            .font_family
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| theme.primary_font().to_string()),
        font_size: native_size * factor,
        line_height: style
            .line_height
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(OVERLAY_LINE_HEIGHT),
        color: style
            .color
            .clone()
            .unwrap_or_else(|| theme.primary_color().to_string()),
        background_color: style.background_color.clone(),
        text_align: style.text_align.unwrap_or_default(),
        font_weight,
        italic: style.font_style == Some(FontStyle::Italic),
    }
}

/// Decode base64 image data, accepting an optional `data:<mime>;base64,` prefix.
pub fn decode_embedded_image(content: &str) -> Result<DynamicImage, String> {
    let payload = match content.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => content,
    };
    let raw = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 image data: {e}"))?;
    image::load_from_memory(&raw).map_err(|e| format!("undecodable image: {e}"))
}
