//! Recover the text under a set of regions from a page's positioned glyphs.

use std::cmp::Ordering;

use crate::geometry::{DEFAULT_TOLERANCE, contains_with_tolerance};
use crate::model::{Glyph, Region};

/// Order glyphs top-to-bottom, then left-to-right (y descending, x ascending).
pub fn reading_order(glyphs: &[Glyph]) -> Vec<&Glyph> {
    let mut sorted: Vec<&Glyph> = glyphs.iter().collect();
    sorted.sort_by(|a, b| compare_reading_order(a, b));
    sorted
}

fn compare_reading_order(a: &Glyph, b: &Glyph) -> Ordering {
    b.y.total_cmp(&a.y).then_with(|| a.x.total_cmp(&b.x))
}

/// Matches glyph anchors against regions with a fixed tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRegionResolver {
    pub tolerance: f32,
}

impl Default for TextRegionResolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl TextRegionResolver {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    /// Text under `regions`, one region per highlighted line segment.
    ///
    /// Region texts are joined with a single space in the order given. An
    /// empty string means nothing matched.
    pub fn resolve(&self, regions: &[Region], glyphs: &[Glyph]) -> String {
        self.resolve_sorted(regions, &reading_order(glyphs))
    }

    /// Same as [`resolve`](Self::resolve) for glyphs already in reading order.
    pub fn resolve_sorted(&self, regions: &[Region], sorted: &[&Glyph]) -> String {
        let mut text = String::new();
        for region in regions {
            let segment: String = sorted
                .iter()
                .filter(|glyph| contains_with_tolerance(glyph, region, self.tolerance))
                .map(|glyph| glyph.text.as_str())
                .collect();
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment);
        }
        text
    }
}
