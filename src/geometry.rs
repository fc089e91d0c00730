//! Page geometry: displayed sizes and native → displayed coordinate scaling.
//!
//! Extracted elements are positioned in the page's native coordinate space
//! (PDF points). The renderers display pages at a size derived from the
//! viewport and the zoom level, so every element rectangle goes through
//! [`scale_rect`] with the factor from [`scale_factor`] before it is painted.
//! Keeping both as pure functions means the one piece of arithmetic every
//! overlay depends on is tested in exactly one place.

use crate::content::Position;
use serde::{Deserialize, Serialize};

/// A width/height pair in either native or displayed units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Height divided by width.
    pub fn aspect(&self) -> f64 {
        self.height / self.width
    }

    /// Both dimensions finite and strictly positive.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// An axis-aligned rectangle, origin at the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<&Position> for Rect {
    fn from(p: &Position) -> Self {
        Rect::new(p.x, p.y, p.width, p.height)
    }
}

/// How much of the viewport a view's page occupies before zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingPreset {
    /// Fraction of the viewport width given to one page (one leaf in flip view).
    pub viewport_fraction: f64,
    /// Upper bound on the unzoomed page width.
    pub max_width: f64,
}

impl SizingPreset {
    /// Flip view: 48 % of the viewport per leaf, capped at 750.
    pub const FLIPBOOK: SizingPreset = SizingPreset {
        viewport_fraction: 0.48,
        max_width: 750.0,
    };

    /// Scroll view: 80 % of the viewport, capped at 1000.
    pub const SCROLL: SizingPreset = SizingPreset {
        viewport_fraction: 0.8,
        max_width: 1000.0,
    };

    /// Unzoomed page width for a viewport.
    pub fn base_width(&self, viewport_width: f64) -> f64 {
        (viewport_width * self.viewport_fraction).min(self.max_width)
    }
}

/// Displayed size of a page preserving the native aspect ratio.
///
/// `width = min(viewport * fraction, cap) * zoom`, `height = width * aspect`.
pub fn displayed_size(native: Size, viewport_width: f64, preset: SizingPreset, zoom: f64) -> Size {
    let width = preset.base_width(viewport_width) * zoom;
    Size::new(width, width * native.aspect())
}

/// Native → displayed factor for a page.
pub fn scale_factor(native_width: f64, displayed_width: f64) -> f64 {
    displayed_width / native_width
}

/// Scale a native rectangle into displayed coordinates.
pub fn scale_rect(rect: Rect, factor: f64) -> Rect {
    Rect::new(
        rect.x * factor,
        rect.y * factor,
        rect.width * factor,
        rect.height * factor,
    )
}
