//! Configuration for a viewing session.
//!
//! All viewer behaviour is controlled through [`ViewerConfig`], built via its
//! [`ViewerConfigBuilder`]. There is no global "is storage configured" switch:
//! the storage and extraction endpoints are passed explicitly to the
//! components that need them, and everything else lives here.

use crate::error::FolioError;
use crate::geometry::SizingPreset;
use crate::view::{ViewMode, ZoomBounds};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest signed-URL lifetime the builder accepts: 7 days.
pub const MAX_SIGNED_URL_EXPIRES_SECS: u64 = 7 * 24 * 60 * 60;

/// Largest flip-view render window, in pages either side of `current`.
pub const MAX_RENDER_WINDOW: usize = 16;

/// Configuration for a [`crate::viewer::DocumentViewer`].
///
/// # Example
/// ```rust
/// use flipfolio::ViewerConfig;
///
/// let config = ViewerConfig::builder()
///     .viewport_width(1440.0)
///     .render_window(1)
///     .build()
///     .unwrap();
/// assert_eq!(config.signed_url_expires_in_secs, 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Lifetime requested for signed URLs. Default: 3600.
    /// At most [`MAX_SIGNED_URL_EXPIRES_SECS`].
    pub signed_url_expires_in_secs: u64,

    /// Timeout for one signed-URL fetch in seconds. Default: 120.
    pub fetch_timeout_secs: u64,

    /// Width of the host viewport in layout units. Default: 1280.
    pub viewport_width: f64,

    /// Flip view page sizing. Default: [`SizingPreset::FLIPBOOK`].
    pub flipbook_sizing: SizingPreset,

    /// Scroll view page sizing. Default: [`SizingPreset::SCROLL`].
    pub scroll_sizing: SizingPreset,

    /// Pages either side of `current` that flip view decodes. Default: 1.
    ///
    /// Peak decode work is `2 * render_window + 1` pages whatever the
    /// document length. At most [`MAX_RENDER_WINDOW`].
    pub render_window: usize,

    /// Zoom clamp. Default: `[0.5, 3.0]`.
    pub zoom_bounds: ZoomBounds,

    /// Multiplicative factor of one zoom-in step. Default: 1.1.
    pub zoom_step: f64,

    /// Device pixels per layout unit when rasterising. Default: 1.0.
    pub device_pixel_ratio: f64,

    /// Cap on the rasterised width or height in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Mode a new viewer starts in. Default: [`ViewMode::Flipbook`].
    pub initial_mode: ViewMode,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            signed_url_expires_in_secs: 3600,
            fetch_timeout_secs: 120,
            viewport_width: 1280.0,
            flipbook_sizing: SizingPreset::FLIPBOOK,
            scroll_sizing: SizingPreset::SCROLL,
            render_window: 1,
            zoom_bounds: ZoomBounds::DEFAULT,
            zoom_step: 1.1,
            device_pixel_ratio: 1.0,
            max_rendered_pixels: 2000,
            initial_mode: ViewMode::default(),
        }
    }
}

impl ViewerConfig {
    /// Create a new builder for `ViewerConfig`.
    pub fn builder() -> ViewerConfigBuilder {
        ViewerConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn signed_url_expires_in(&self) -> Duration {
        Duration::from_secs(self.signed_url_expires_in_secs)
    }

    /// Sizing preset for a view mode. Dynamic mode reflows and uses scroll sizing.
    pub fn sizing_for(&self, mode: ViewMode) -> SizingPreset {
        match mode {
            ViewMode::Flipbook => self.flipbook_sizing,
            ViewMode::Scroll | ViewMode::Dynamic => self.scroll_sizing,
        }
    }
}

/// Builder for [`ViewerConfig`].
#[derive(Debug)]
pub struct ViewerConfigBuilder {
    config: ViewerConfig,
}

impl ViewerConfigBuilder {
    pub fn signed_url_expires_in_secs(mut self, secs: u64) -> Self {
        self.config.signed_url_expires_in_secs = secs.clamp(1, MAX_SIGNED_URL_EXPIRES_SECS);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn viewport_width(mut self, width: f64) -> Self {
        self.config.viewport_width = width;
        self
    }

    pub fn flipbook_sizing(mut self, preset: SizingPreset) -> Self {
        self.config.flipbook_sizing = preset;
        self
    }

    pub fn scroll_sizing(mut self, preset: SizingPreset) -> Self {
        self.config.scroll_sizing = preset;
        self
    }

    pub fn render_window(mut self, pages: usize) -> Self {
        self.config.render_window = pages;
        self
    }

    pub fn zoom_bounds(mut self, bounds: ZoomBounds) -> Self {
        self.config.zoom_bounds = bounds;
        self
    }

    pub fn zoom_step(mut self, factor: f64) -> Self {
        self.config.zoom_step = factor;
        self
    }

    pub fn device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.config.device_pixel_ratio = ratio.clamp(0.5, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn initial_mode(mut self, mode: ViewMode) -> Self {
        self.config.initial_mode = mode;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ViewerConfig, FolioError> {
        let c = &self.config;
        if !(c.viewport_width.is_finite() && c.viewport_width > 0.0) {
            return Err(FolioError::InvalidConfig(format!(
                "viewport width must be positive, got {}",
                c.viewport_width
            )));
        }
        for (name, preset) in [("flipbook", c.flipbook_sizing), ("scroll", c.scroll_sizing)] {
            if !(preset.viewport_fraction > 0.0 && preset.viewport_fraction <= 1.0) {
                return Err(FolioError::InvalidConfig(format!(
                    "{name} viewport fraction must be in (0, 1], got {}",
                    preset.viewport_fraction
                )));
            }
            if !(preset.max_width.is_finite() && preset.max_width > 0.0) {
                return Err(FolioError::InvalidConfig(format!(
                    "{name} max width must be positive, got {}",
                    preset.max_width
                )));
            }
        }
        ZoomBounds::new(c.zoom_bounds.min, c.zoom_bounds.max)?;
        if c.render_window > MAX_RENDER_WINDOW {
            return Err(FolioError::InvalidConfig(format!(
                "render window must be at most {MAX_RENDER_WINDOW} pages, got {}",
                c.render_window
            )));
        }
        if !(c.zoom_step.is_finite() && c.zoom_step > 1.0) {
            return Err(FolioError::InvalidConfig(format!(
                "zoom step must be > 1, got {}",
                c.zoom_step
            )));
        }
        Ok(self.config)
    }
}
