//! Extracted-content model: the semantic layout of one document.
//!
//! The extraction service parses an uploaded PDF into pages of positioned
//! elements plus a document-wide theme, and stores the result as JSON next to
//! the document (`<documentPath>.extracted.json`). This module is the typed
//! form of that JSON.
//!
//! Content is validated once, on ingestion, by [`ExtractedContent::from_json`]
//! / [`ExtractedContent::from_value`]. After that it is shared as
//! `Arc<ExtractedContent>` and never mutated: a re-extraction produces a new
//! instance.
//!
//! ## Coordinates
//!
//! Every element's [`Position`] is in the same native coordinate space as its
//! page's `width`/`height` (PDF points). Renderers scale with
//! [`crate::geometry::scale_factor`].

use crate::error::ValidationError;
use crate::geometry::Size;
use crate::theme::ExtractedTheme;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Element tags the renderers understand.
pub const KNOWN_ELEMENT_TYPES: [&str; 4] = ["paragraph", "heading", "list", "image"];

/// Root artifact describing one document's semantic layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    /// Index = page number − 1.
    pub pages: Vec<ExtractedPage>,
    #[serde(default)]
    pub theme: ExtractedTheme,
    pub metadata: ContentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    /// Must equal `pages.len()`.
    pub page_count: usize,
    #[serde(default)]
    pub created_at: String,
}

/// One page of extracted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPage {
    /// Native width in PDF points.
    pub width: f64,
    /// Native height in PDF points.
    pub height: f64,
    /// Reading order; later elements stack above earlier ones.
    #[serde(default)]
    pub elements: Vec<PageElement>,
    #[serde(default)]
    pub layout: PageLayout,
}

impl ExtractedPage {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Column structure detected on a page. Informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default)]
    pub spacing: Option<f64>,
    #[serde(default)]
    pub column_width: Option<f64>,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default)]
    pub has_footer: bool,
    #[serde(default)]
    pub margins: PageMargins,
}

fn default_columns() -> u32 {
    1
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            columns: 1,
            spacing: None,
            column_width: None,
            has_header: false,
            has_footer: false,
            margins: PageMargins::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
}

/// Element bounding box in native page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margins: Option<ElementMargins>,
}

impl Position {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            margins: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMargins {
    pub left: f64,
    pub right: f64,
    #[serde(default)]
    pub top: Option<f64>,
    #[serde(default)]
    pub bottom: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    #[serde(alias = "start")]
    Left,
    Center,
    #[serde(alias = "end")]
    Right,
    Justify,
}

/// Accepts CSS keywords and numeric weights; 600 and up is bold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "Value")]
pub enum FontWeight {
    Normal,
    Bold,
}

impl TryFrom<Value> for FontWeight {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let numeric = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "normal" | "lighter" => return Ok(FontWeight::Normal),
                "bold" | "bolder" => return Ok(FontWeight::Bold),
                other => other.parse::<f64>().ok(),
            },
            _ => None,
        };
        match numeric {
            Some(w) if w.is_finite() => Ok(if w >= 600.0 {
                FontWeight::Bold
            } else {
                FontWeight::Normal
            }),
            _ => Err(format!("unrecognised font weight {value}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
}

/// Font size as the service sends it: `"12.0px"` or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontSize {
    Points(f64),
    Css(String),
}

impl FontSize {
    /// Numeric size, parsing `px` strings. `None` if unparsable.
    pub fn value(&self) -> Option<f64> {
        let v = match self {
            FontSize::Points(v) => *v,
            FontSize::Css(s) => s.trim().trim_end_matches("px").trim().parse().ok()?,
        };
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// Per-element style hints; all optional.
///
/// A value that does not parse is dropped on its own and the element keeps
/// its other hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    #[serde(default, deserialize_with = "lenient")]
    pub font_size: Option<FontSize>,
    #[serde(default, deserialize_with = "lenient")]
    pub font_family: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, deserialize_with = "lenient")]
    pub font_style: Option<FontStyle>,
    #[serde(default, deserialize_with = "lenient")]
    pub text_align: Option<TextAlign>,
    #[serde(default, deserialize_with = "lenient")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub background_color: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub line_height: Option<f64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Paragraph or heading text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub content: String,
    pub position: Position,
    #[serde(default)]
    pub style: ElementStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListElement {
    pub list_type: ListType,
    pub items: Vec<String>,
    pub position: Position,
    #[serde(default)]
    pub style: ElementStyle,
}

/// Embedded image: `content` is base64 data, optionally as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    pub position: Position,
    #[serde(default)]
    pub style: ElementStyle,
}

/// A positioned element, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageElement {
    Paragraph(TextElement),
    Heading(TextElement),
    List(ListElement),
    Image(ImageElement),
}

impl PageElement {
    pub fn position(&self) -> &Position {
        match self {
            PageElement::Paragraph(t) | PageElement::Heading(t) => &t.position,
            PageElement::List(l) => &l.position,
            PageElement::Image(i) => &i.position,
        }
    }

    pub fn style(&self) -> &ElementStyle {
        match self {
            PageElement::Paragraph(t) | PageElement::Heading(t) => &t.style,
            PageElement::List(l) => &l.style,
            PageElement::Image(i) => &i.style,
        }
    }

    /// Wire tag of this element.
    pub fn kind(&self) -> &'static str {
        match self {
            PageElement::Paragraph(_) => "paragraph",
            PageElement::Heading(_) => "heading",
            PageElement::List(_) => "list",
            PageElement::Image(_) => "image",
        }
    }
}

impl ExtractedContent {
    /// Parse and validate raw JSON bytes.
    pub fn from_json(raw: &[u8]) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON document.
    ///
    /// Element tags are checked before typed deserialisation so an unknown
    /// tag is reported as such rather than as a generic parse error.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        check_element_tags(&value)?;
        let content: ExtractedContent =
            serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        content.validate()?;
        Ok(content)
    }

    /// Check the invariants typed deserialisation cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.metadata.page_count != self.pages.len() {
            return Err(ValidationError::PageCountMismatch {
                declared: self.metadata.page_count,
                actual: self.pages.len(),
            });
        }

        for (page_idx, page) in self.pages.iter().enumerate() {
            if !page.size().is_usable() {
                return Err(ValidationError::InvalidPageSize {
                    page: page_idx + 1,
                    width: page.width,
                    height: page.height,
                });
            }

            for (element_idx, element) in page.elements.iter().enumerate() {
                let p = element.position();
                for (field, value) in [
                    ("x", p.x),
                    ("y", p.y),
                    ("width", p.width),
                    ("height", p.height),
                ] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(ValidationError::InvalidPosition {
                            page: page_idx + 1,
                            element: element_idx,
                            field,
                            value,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 0-based page lookup.
    pub fn page(&self, index: usize) -> Option<&ExtractedPage> {
        self.pages.get(index)
    }
}

fn check_element_tags(value: &Value) -> Result<(), ValidationError> {
    let Some(pages) = value.get("pages").and_then(Value::as_array) else {
        return Ok(());
    };
    for (page_idx, page) in pages.iter().enumerate() {
        let Some(elements) = page.get("elements").and_then(Value::as_array) else {
            continue;
        };
        for (element_idx, element) in elements.iter().enumerate() {
            let tag = element.get("type").and_then(Value::as_str);
            match tag {
                Some(t) if KNOWN_ELEMENT_TYPES.contains(&t) => {}
                other => {
                    return Err(ValidationError::UnknownElementType {
                        page: page_idx + 1,
                        element: element_idx,
                        tag: other.unwrap_or("<missing>").to_string(),
                    })
                }
            }
        }
    }
    Ok(())
}
