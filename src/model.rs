//! Page, annotation and result types shared by every stage of extraction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single positioned character in PDF user space (origin bottom-left, y up).
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font: Option<String>,
}

impl Glyph {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font_size: 12.0,
            font: None,
        }
    }

    pub fn with_font(mut self, font: impl Into<String>, size: f32) -> Self {
        self.font = Some(font.into());
        self.font_size = size;
        self
    }
}

/// Axis-aligned rectangle in PDF user space. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Build a region from two opposite corners given in any order.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    pub fn upper_right_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn upper_right_y(&self) -> f32 {
        self.y + self.height
    }

    /// The same rectangle grown by `amount` on every side.
    pub fn expand(&self, amount: f32) -> Self {
        Self::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.1},{:.1},{:.1},{:.1}]",
            self.x,
            self.y,
            self.upper_right_x(),
            self.upper_right_y()
        )
    }
}

/// Text markup annotation subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    Highlight,
    Underline,
    StrikeOut,
    Squiggly,
}

impl MarkupKind {
    /// Map a PDF `/Subtype` name to a markup kind.
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype {
            "Highlight" => Some(Self::Highlight),
            "Underline" => Some(Self::Underline),
            "StrikeOut" => Some(Self::StrikeOut),
            "Squiggly" => Some(Self::Squiggly),
            _ => None,
        }
    }
}

/// Fields only text markup annotations carry.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMarkup {
    pub kind: MarkupKind,
    /// Raw `/C` components in 0.0..=1.0.
    pub color: Option<Vec<f32>>,
    pub contents: Option<String>,
    /// Flat `/QuadPoints` array, 8 numbers per quadrilateral.
    pub quad_points: Option<Vec<f32>>,
    pub rect: Region,
}

impl TextMarkup {
    pub fn highlight(rect: Region) -> Self {
        Self {
            kind: MarkupKind::Highlight,
            color: None,
            contents: None,
            quad_points: None,
            rect,
        }
    }

    pub fn with_color(mut self, components: &[f32]) -> Self {
        self.color = Some(components.to_vec());
        self
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn with_quad_points(mut self, quad_points: Vec<f32>) -> Self {
        self.quad_points = Some(quad_points);
        self
    }
}

/// An annotation as found on a page. Only markup can become a highlight.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Markup(TextMarkup),
    Other { subtype: String, rect: Region },
}

impl Annotation {
    pub fn as_markup(&self) -> Option<&TextMarkup> {
        match self {
            Annotation::Markup(markup) => Some(markup),
            Annotation::Other { .. } => None,
        }
    }
}

/// Everything the engine needs from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// Zero-based page index.
    pub index: usize,
    pub width: f32,
    pub height: f32,
    /// Lower-left corner of the media box in user space.
    pub origin: (f32, f32),
    pub annotations: Vec<Annotation>,
    pub glyphs: Vec<Glyph>,
}

impl PageContent {
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            origin: (0.0, 0.0),
            annotations: Vec::new(),
            glyphs: Vec::new(),
        }
    }

    /// US Letter page, the size most fixtures use.
    pub fn letter(index: usize) -> Self {
        Self::new(index, 612.0, 792.0)
    }

    pub fn with_origin(mut self, x: f32, y: f32) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// `region` shifted so the media box starts at (0, 0).
    pub fn to_page_space(&self, region: Region) -> Region {
        Region {
            x: region.x - self.origin.0,
            y: region.y - self.origin.1,
            ..region
        }
    }
}

/// Semantic highlight colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorCategory {
    Green,
    Yellow,
    Purple,
}

impl ColorCategory {
    pub const ALL: [ColorCategory; 3] = [Self::Green, Self::Yellow, Self::Purple];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorCategory::Green => "GREEN",
            ColorCategory::Yellow => "YELLOW",
            ColorCategory::Purple => "PURPLE",
        }
    }
}

impl fmt::Display for ColorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightResult {
    pub text: String,
    pub color: ColorCategory,
    /// 1-based page number.
    pub page: usize,
    pub region: Region,
}

/// Results per colour, each list in insertion order.
pub fn group_by_color(results: &[HighlightResult]) -> BTreeMap<ColorCategory, Vec<&HighlightResult>> {
    let mut groups: BTreeMap<ColorCategory, Vec<&HighlightResult>> = BTreeMap::new();
    for result in results {
        groups.entry(result.color).or_default().push(result);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_from_corners_normalizes_order() {
        let region = Region::from_corners(30.0, 40.0, 10.0, 20.0);
        assert_eq!(region, Region::new(10.0, 20.0, 20.0, 20.0));
        assert_eq!(region.upper_right_x(), 30.0);
        assert_eq!(region.upper_right_y(), 40.0);
    }

    #[test]
    fn region_rejects_negative_size() {
        let region = Region::new(5.0, 5.0, -3.0, -1.0);
        assert_eq!(region.width, 0.0);
        assert_eq!(region.height, 0.0);
    }

    #[test]
    fn markup_kind_from_subtype() {
        assert_eq!(MarkupKind::from_subtype("Highlight"), Some(MarkupKind::Highlight));
        assert_eq!(MarkupKind::from_subtype("Squiggly"), Some(MarkupKind::Squiggly));
        assert_eq!(MarkupKind::from_subtype("Link"), None);
    }

    #[test]
    fn grouping_keeps_insertion_order_within_color() {
        let make = |text: &str, color| HighlightResult {
            text: text.into(),
            color,
            page: 1,
            region: Region::default(),
        };
        let results = vec![
            make("a", ColorCategory::Yellow),
            make("b", ColorCategory::Green),
            make("c", ColorCategory::Yellow),
        ];
        let groups = group_by_color(&results);
        let yellow: Vec<&str> = groups[&ColorCategory::Yellow]
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(yellow, ["a", "c"]);
        assert_eq!(groups[&ColorCategory::Green].len(), 1);
        assert!(!groups.contains_key(&ColorCategory::Purple));
    }
}
