//! Per-session view state: current page, zoom, page count, mode.
//!
//! Each viewing session owns one [`ViewState`] exclusively. Host UIs
//! (toolbars, keyboard shortcuts, deep links) drive the view only through
//! `current`, `num_pages` and `zoom_level` and their setters.

use crate::error::FolioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use tracing::warn;

/// The rendering modes a folio can be shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Page-turn view; only a window of pages around `current` is decoded.
    #[default]
    Flipbook,
    /// Continuous vertical scroll with the semantic overlay.
    Scroll,
    /// Themed reflowed document built from extracted content alone.
    Dynamic,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewMode::Flipbook => "flipbook",
            ViewMode::Scroll => "scroll",
            ViewMode::Dynamic => "dynamic",
        })
    }
}

/// Inclusive zoom clamp.
///
/// Valid bounds satisfy `0 < min <= 1 <= max`, both finite. Deserialisation
/// goes through [`ZoomBounds::new`]; a struct literal that breaks the rule is
/// treated as [`ZoomBounds::DEFAULT`] wherever it is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawZoomBounds")]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Deserialize)]
struct RawZoomBounds {
    min: f64,
    max: f64,
}

impl TryFrom<RawZoomBounds> for ZoomBounds {
    type Error = FolioError;

    fn try_from(raw: RawZoomBounds) -> Result<Self, Self::Error> {
        ZoomBounds::new(raw.min, raw.max)
    }
}

impl ZoomBounds {
    pub const DEFAULT: ZoomBounds = ZoomBounds { min: 0.5, max: 3.0 };

    /// Checked constructor.
    pub fn new(min: f64, max: f64) -> Result<Self, FolioError> {
        let bounds = Self { min, max };
        if bounds.is_valid() {
            Ok(bounds)
        } else {
            Err(FolioError::InvalidConfig(format!(
                "zoom bounds must satisfy 0 < min <= 1 <= max, got [{min}, {max}]"
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min > 0.0
            && self.min <= 1.0
            && self.max >= 1.0
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        let bounds = if self.is_valid() { self } else { &Self::DEFAULT };
        zoom.clamp(bounds.min, bounds.max)
    }
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Navigation and zoom state of one view.
///
/// Invariants: `current < num_pages` whenever `num_pages > 0` (otherwise
/// `current == 0`), and `zoom_level` stays inside the configured bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    current: usize,
    num_pages: usize,
    zoom_level: f64,
    mode: ViewMode,
    bounds: ZoomBounds,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(ViewMode::default(), ZoomBounds::DEFAULT)
    }
}

impl ViewState {
    /// Invalid `bounds` fall back to [`ZoomBounds::DEFAULT`].
    pub fn new(mode: ViewMode, bounds: ZoomBounds) -> Self {
        let bounds = if bounds.is_valid() {
            bounds
        } else {
            warn!(
                "Ignoring invalid zoom bounds [{}, {}]; using defaults",
                bounds.min, bounds.max
            );
            ZoomBounds::DEFAULT
        };
        Self {
            current: 0,
            num_pages: 0,
            zoom_level: bounds.clamp(1.0),
            mode,
            bounds,
        }
    }

    /// 0-based index of the current page.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    /// Record the document's page count, re-clamping `current`.
    pub fn set_num_pages(&mut self, n: usize) {
        self.num_pages = n;
        self.current = self.clamp_index(self.current);
    }

    /// Jump to a page (deep link). Out-of-range indices are clamped.
    pub fn set_current(&mut self, index: usize) -> usize {
        self.current = self.clamp_index(index);
        self.current
    }

    /// Step forward one page. Returns whether the page changed.
    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.num_pages {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Step back one page. Returns whether the page changed.
    pub fn previous(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn has_next(&self) -> bool {
        self.current + 1 < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    /// Set an absolute zoom level, clamped. Non-finite values are ignored.
    pub fn set_zoom_level(&mut self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            self.zoom_level = self.bounds.clamp(zoom);
        }
        self.zoom_level
    }

    /// Multiply the zoom level by `factor` (a toolbar step or pinch ratio).
    pub fn zoom_by(&mut self, factor: f64) -> f64 {
        if factor.is_finite() && factor > 0.0 {
            self.set_zoom_level(self.zoom_level * factor);
        }
        self.zoom_level
    }

    pub fn zoom_in(&mut self, step: f64) -> f64 {
        self.zoom_by(step)
    }

    pub fn zoom_out(&mut self, step: f64) -> f64 {
        self.zoom_by(1.0 / step)
    }

    /// Pages flip view decodes for the current position.
    pub fn render_window(&self, radius: usize) -> Range<usize> {
        render_window(self.current, self.num_pages, radius)
    }

    fn clamp_index(&self, index: usize) -> usize {
        index.min(self.num_pages.saturating_sub(1))
    }
}

/// Indices `i` with `|i - current| <= radius`, clipped to `0..num_pages`.
pub fn render_window(current: usize, num_pages: usize, radius: usize) -> Range<usize> {
    if num_pages == 0 {
        return 0..0;
    }
    let current = current.min(num_pages - 1);
    let start = current.saturating_sub(radius);
    let end = current.saturating_add(radius).saturating_add(1).min(num_pages);
    start..end
}
