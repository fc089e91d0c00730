//! Theme resolution: extracted theme data + documented defaults → concrete styles.
//!
//! The extraction service guesses a document-wide theme (palette, fonts, a
//! layout family, a type scale). Every field is optional because the guess is
//! best-effort. [`resolve`] is total: it never fails and every field of the
//! returned [`ResolvedTheme`] is concrete, so renderers never branch on
//! missing style data.
//!
//! A field falls back to its default when it is absent, not finite, or not
//! strictly positive. Empty color and font lists also fall back.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_FONT: &str = "system-ui";
pub const DEFAULT_BASE_FONT_SIZE: f64 = 16.0;
pub const DEFAULT_HEADING_SCALE: f64 = 1.5;
pub const DEFAULT_SPACING: f64 = 1.5;
pub const DEFAULT_PARAGRAPH_SPACING: f64 = 1.4;
pub const DEFAULT_LINE_HEIGHT: f64 = 1.5;

/// Headings are set tighter than body text.
pub const HEADING_LINE_HEIGHT_RATIO: f64 = 0.9;
pub const HEADING_FONT_WEIGHT: u16 = 600;
pub const BODY_FONT_WEIGHT: u16 = 400;

/// Layout family detected for the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Two columns, wide.
    Magazine,
    /// Single centred column.
    Article,
    /// Full width, unconstrained. (default)
    #[default]
    Minimal,
}

/// Type scale as sent by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeScale {
    #[serde(default)]
    pub base_font_size: Option<f64>,
    #[serde(default)]
    pub heading_scale: Option<f64>,
    #[serde(default)]
    pub spacing: Option<f64>,
}

/// Typography hints as sent by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeTypography {
    #[serde(default)]
    pub paragraph_spacing: Option<f64>,
    #[serde(default)]
    pub line_height: Option<f64>,
    #[serde(default)]
    pub heading_font_family: Option<String>,
    #[serde(default)]
    pub body_font_family: Option<String>,
}

/// Document-wide theme; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTheme {
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub fonts: Option<Vec<String>>,
    #[serde(default)]
    pub layout: Option<LayoutKind>,
    #[serde(default)]
    pub scale: Option<ThemeScale>,
    #[serde(default)]
    pub typography: Option<ThemeTypography>,
}

/// A theme with every value concrete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTheme {
    /// Never empty.
    pub colors: Vec<String>,
    /// Never empty.
    pub fonts: Vec<String>,
    pub layout: LayoutKind,
    pub base_font_size: f64,
    pub heading_scale: f64,
    pub spacing: f64,
    pub paragraph_spacing: f64,
    pub line_height: f64,
    pub heading_font_family: Option<String>,
    pub body_font_family: Option<String>,
}

impl Default for ResolvedTheme {
    fn default() -> Self {
        resolve(None)
    }
}

/// Concrete text styling for one class of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub line_height: f64,
    pub color: String,
    pub font_weight: u16,
}

/// Maximum content width of a layout preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaxWidth {
    /// Bounded, in layout units.
    Units(f64),
    /// Full container width.
    Full,
}

/// Geometry preset derived from [`LayoutKind`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutGeometry {
    pub columns: u32,
    pub max_width: MaxWidth,
    /// Gap between columns in layout units; `None` for single column.
    pub column_gap: Option<f64>,
    pub centered: bool,
}

impl LayoutGeometry {
    pub const MAGAZINE: LayoutGeometry = LayoutGeometry {
        columns: 2,
        max_width: MaxWidth::Units(1200.0),
        column_gap: Some(2.0),
        centered: false,
    };

    pub const ARTICLE: LayoutGeometry = LayoutGeometry {
        columns: 1,
        max_width: MaxWidth::Units(800.0),
        column_gap: None,
        centered: true,
    };

    pub const MINIMAL: LayoutGeometry = LayoutGeometry {
        columns: 1,
        max_width: MaxWidth::Full,
        column_gap: None,
        centered: false,
    };

    pub fn for_kind(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::Magazine => Self::MAGAZINE,
            LayoutKind::Article => Self::ARTICLE,
            LayoutKind::Minimal => Self::MINIMAL,
        }
    }
}

impl ResolvedTheme {
    /// First palette entry.
    pub fn primary_color(&self) -> &str {
        self.colors.first().map(String::as_str).unwrap_or(DEFAULT_COLOR)
    }

    /// First font entry.
    pub fn primary_font(&self) -> &str {
        self.fonts.first().map(String::as_str).unwrap_or(DEFAULT_FONT)
    }

    pub fn heading_font_size(&self) -> f64 {
        self.base_font_size * self.heading_scale
    }

    pub fn heading_line_height(&self) -> f64 {
        self.line_height * HEADING_LINE_HEIGHT_RATIO
    }

    pub fn body_style(&self) -> TextStyle {
        TextStyle {
            font_family: self
                .body_font_family
                .clone()
                .unwrap_or_else(|| self.primary_font().to_string()),
            font_size: self.base_font_size,
            line_height: self.line_height,
            color: self.primary_color().to_string(),
            font_weight: BODY_FONT_WEIGHT,
        }
    }

    pub fn heading_style(&self) -> TextStyle {
        TextStyle {
            font_family: self
                .heading_font_family
                .clone()
                .unwrap_or_else(|| self.primary_font().to_string()),
            font_size: self.heading_font_size(),
            line_height: self.heading_line_height(),
            color: self.primary_color().to_string(),
            font_weight: HEADING_FONT_WEIGHT,
        }
    }

    pub fn layout_geometry(&self) -> LayoutGeometry {
        LayoutGeometry::for_kind(self.layout)
    }
}

/// Merge an optional extracted theme with the defaults.
pub fn resolve(theme: Option<&ExtractedTheme>) -> ResolvedTheme {
    let scale = theme.and_then(|t| t.scale.as_ref());
    let typography = theme.and_then(|t| t.typography.as_ref());

    ResolvedTheme {
        colors: non_empty(theme.and_then(|t| t.colors.as_ref()), DEFAULT_COLOR),
        fonts: non_empty(theme.and_then(|t| t.fonts.as_ref()), DEFAULT_FONT),
        layout: theme.and_then(|t| t.layout).unwrap_or_default(),
        base_font_size: positive(scale.and_then(|s| s.base_font_size), DEFAULT_BASE_FONT_SIZE),
        heading_scale: positive(scale.and_then(|s| s.heading_scale), DEFAULT_HEADING_SCALE),
        spacing: positive(scale.and_then(|s| s.spacing), DEFAULT_SPACING),
        paragraph_spacing: positive(
            typography.and_then(|t| t.paragraph_spacing),
            DEFAULT_PARAGRAPH_SPACING,
        ),
        line_height: positive(typography.and_then(|t| t.line_height), DEFAULT_LINE_HEIGHT),
        heading_font_family: non_blank(typography.and_then(|t| t.heading_font_family.as_deref())),
        body_font_family: non_blank(typography.and_then(|t| t.body_font_family.as_deref())),
    }
}

fn positive(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

fn non_empty(values: Option<&Vec<String>>, default: &str) -> Vec<String> {
    let kept: Vec<String> = values
        .map(|v| {
            v.iter()
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    if kept.is_empty() {
        vec![default.to_string()]
    } else {
        kept
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_theme_resolves_to_defaults() {
        let t = resolve(None);
        assert_eq!(t.colors, vec!["#000000".to_string()]);
        assert_eq!(t.fonts, vec!["system-ui".to_string()]);
        assert_eq!(t.layout, LayoutKind::Minimal);
        assert_eq!(t.base_font_size, 16.0);
        assert_eq!(t.heading_scale, 1.5);
        assert_eq!(t.spacing, 1.5);
        assert_eq!(t.paragraph_spacing, 1.4);
        assert_eq!(t.line_height, 1.5);
        assert_eq!(t.heading_font_family, None);
        assert_eq!(t.body_font_family, None);
        assert_eq!(t, resolve(Some(&ExtractedTheme::default())));
    }

    #[test]
    fn partial_theme_overrides_only_supplied_fields() {
        let theme = ExtractedTheme {
            colors: Some(vec!["#112233".into()]),
            scale: Some(ThemeScale {
                base_font_size: Some(12.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let t = resolve(Some(&theme));
        assert_eq!(t.primary_color(), "#112233");
        assert_eq!(t.base_font_size, 12.0);
        assert_eq!(t.heading_scale, DEFAULT_HEADING_SCALE);
        assert_eq!(t.fonts, vec![DEFAULT_FONT.to_string()]);
        assert_eq!(t.line_height, DEFAULT_LINE_HEIGHT);
    }

    #[test]
    fn zero_and_nan_fall_back() {
        let theme = ExtractedTheme {
            scale: Some(ThemeScale {
                base_font_size: Some(0.0),
                heading_scale: Some(f64::NAN),
                spacing: Some(-1.0),
            }),
            colors: Some(vec![]),
            ..Default::default()
        };
        let t = resolve(Some(&theme));
        assert_eq!(t.base_font_size, DEFAULT_BASE_FONT_SIZE);
        assert_eq!(t.heading_scale, DEFAULT_HEADING_SCALE);
        assert_eq!(t.spacing, DEFAULT_SPACING);
        assert_eq!(t.colors, vec![DEFAULT_COLOR.to_string()]);
    }

    #[test]
    fn derived_heading_values() {
        let theme = ExtractedTheme {
            scale: Some(ThemeScale {
                base_font_size: Some(10.0),
                heading_scale: Some(2.0),
                spacing: None,
            }),
            typography: Some(ThemeTypography {
                line_height: Some(2.0),
                heading_font_family: Some("Georgia".into()),
                ..Default::default()
            }),
            fonts: Some(vec!["Helvetica".into(), "Arial".into()]),
            ..Default::default()
        };
        let t = resolve(Some(&theme));
        let heading = t.heading_style();
        assert_eq!(heading.font_size, 20.0);
        assert!((heading.line_height - 1.8).abs() < 1e-12);
        assert_eq!(heading.font_family, "Georgia");
        assert_eq!(heading.font_weight, 600);

        let body = t.body_style();
        assert_eq!(body.font_family, "Helvetica");
        assert_eq!(body.font_size, 10.0);
        assert_eq!(body.line_height, 2.0);
    }

    #[test]
    fn layout_presets_are_discrete() {
        assert_eq!(LayoutGeometry::for_kind(LayoutKind::Magazine).columns, 2);
        assert_eq!(
            LayoutGeometry::for_kind(LayoutKind::Magazine).max_width,
            MaxWidth::Units(1200.0)
        );
        assert_eq!(LayoutGeometry::for_kind(LayoutKind::Magazine).column_gap, Some(2.0));
        assert!(LayoutGeometry::for_kind(LayoutKind::Article).centered);
        assert_eq!(
            LayoutGeometry::for_kind(LayoutKind::Article).max_width,
            MaxWidth::Units(800.0)
        );
        assert_eq!(LayoutGeometry::for_kind(LayoutKind::Minimal).max_width, MaxWidth::Full);
    }

    #[test]
    fn theme_deserialises_from_service_json() {
        let json = r#"{
            "layout": "magazine",
            "scale": {"baseFontSize": 11.5},
            "typography": {"lineHeight": 1.2, "bodyFontFamily": "Times"}
        }"#;
        let theme: ExtractedTheme = serde_json::from_str(json).unwrap();
        let t = resolve(Some(&theme));
        assert_eq!(t.layout, LayoutKind::Magazine);
        assert_eq!(t.base_font_size, 11.5);
        assert_eq!(t.body_style().font_family, "Times");
    }
}
