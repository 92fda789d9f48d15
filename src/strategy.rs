//! Ordered text-resolution strategies for one markup annotation.

use std::cell::OnceCell;
use std::fmt;

use image::RgbImage;

use crate::config::ExtractorConfig;
use crate::error::{RenderError, StrategyError};
use crate::geometry::quad_points_to_regions;
use crate::model::{Glyph, PageContent, Region, TextMarkup};
use crate::ocr::OcrPipeline;
use crate::resolver::{TextRegionResolver, reading_order};

/// One way of turning an annotation into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The annotation's own `/Contents`.
    Contents,
    /// Glyphs under the quad points, or under the rectangle without them.
    GlyphMatch,
    /// Glyphs under the rectangle truncated to whole units, quads ignored.
    BoundingArea,
    /// Render, crop and recognise the rectangle.
    Ocr,
    /// Glyphs under the rectangle grown by one line height.
    NearbyText,
    /// Synthesised description of the rectangle. Never empty.
    CoordinateDescription,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Contents => "contents",
            Strategy::GlyphMatch => "glyph-match",
            Strategy::BoundingArea => "bounding-area",
            Strategy::Ocr => "ocr",
            Strategy::NearbyText => "nearby-text",
            Strategy::CoordinateDescription => "coordinate-description",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page state shared by every annotation on the page.
///
/// Glyphs are sorted once. The rendered page image is produced on first
/// use and kept, a failed render included, for the life of the context.
pub struct PageContext<'a> {
    page: &'a PageContent,
    sorted: Vec<&'a Glyph>,
    image: OnceCell<Option<RgbImage>>,
}

impl<'a> PageContext<'a> {
    pub fn new(page: &'a PageContent) -> Self {
        Self {
            page,
            sorted: reading_order(&page.glyphs),
            image: OnceCell::new(),
        }
    }

    pub fn page(&self) -> &'a PageContent {
        self.page
    }

    /// Glyphs in reading order.
    pub fn glyphs(&self) -> &[&'a Glyph] {
        &self.sorted
    }

    /// Largest font size on the page, at least 1.
    pub fn line_height(&self) -> f32 {
        self.page
            .glyphs
            .iter()
            .map(|glyph| glyph.font_size)
            .filter(|size| size.is_finite())
            .fold(1.0, f32::max)
    }

    /// The page bitmap, rendering it with `render` on first call.
    pub fn page_image<F>(&self, render: F) -> Option<&RgbImage>
    where
        F: FnOnce() -> Result<RgbImage, RenderError>,
    {
        self.image
            .get_or_init(|| match render() {
                Ok(image) => Some(image),
                Err(err) => {
                    log::warn!("page {}: {err}", self.page.number());
                    None
                }
            })
            .as_ref()
    }
}

/// Tries strategies in order and keeps the first non-empty result.
pub struct ExtractionStrategyChain {
    strategies: Vec<Strategy>,
    resolver: TextRegionResolver,
    ocr: Option<OcrPipeline>,
}

impl ExtractionStrategyChain {
    pub fn new(strategies: Vec<Strategy>, resolver: TextRegionResolver) -> Self {
        Self {
            strategies,
            resolver,
            ocr: None,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(
            config.strategy_order(),
            TextRegionResolver::new(config.tolerance),
        )
    }

    /// Attach the collaborators the OCR strategy needs. Without them that
    /// strategy always yields nothing.
    pub fn with_ocr(mut self, pipeline: OcrPipeline) -> Self {
        self.ocr = Some(pipeline);
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Text for `markup` and the strategy that produced it, or `None` when
    /// every strategy came up empty.
    pub fn resolve_text(
        &self,
        markup: &TextMarkup,
        page: &PageContext<'_>,
    ) -> Option<(Strategy, String)> {
        for &strategy in &self.strategies {
            match self.run(strategy, markup, page) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        log::debug!("page {}: resolved by {strategy}", page.page().number());
                        return Some((strategy, text.to_string()));
                    }
                }
                Err(err) => {
                    log::debug!("page {}: {strategy} failed: {err}", page.page().number());
                }
            }
        }
        None
    }

    fn run(
        &self,
        strategy: Strategy,
        markup: &TextMarkup,
        page: &PageContext<'_>,
    ) -> Result<String, StrategyError> {
        match strategy {
            Strategy::Contents => Ok(markup.contents.clone().unwrap_or_default()),
            Strategy::GlyphMatch => {
                let regions = markup_regions(markup)?;
                Ok(self.resolver.resolve_sorted(&regions, page.glyphs()))
            }
            Strategy::BoundingArea => {
                let area = truncate_region(&markup.rect);
                Ok(self.resolver.resolve_sorted(&[area], page.glyphs()))
            }
            Strategy::NearbyText => {
                let nearby = markup.rect.expand(page.line_height());
                Ok(self.resolver.resolve_sorted(&[nearby], page.glyphs()))
            }
            Strategy::Ocr => {
                let pipeline = self.ocr.as_ref().ok_or(StrategyError::OcrUnavailable)?;
                pipeline.recognize_region(&markup.rect, page)
            }
            Strategy::CoordinateDescription => Ok(describe_region(&markup.rect)),
        }
    }
}

/// One region per quad, or the bounding rectangle when there are no quads.
pub fn markup_regions(markup: &TextMarkup) -> Result<Vec<Region>, StrategyError> {
    match markup.quad_points.as_deref() {
        Some(quads) if !quads.is_empty() => quad_points_to_regions(quads)
            .ok_or(StrategyError::MalformedQuadPoints(quads.len())),
        _ => Ok(vec![markup.rect]),
    }
}

fn truncate_region(rect: &Region) -> Region {
    Region::from_corners(
        rect.x.trunc(),
        rect.y.trunc(),
        rect.upper_right_x().trunc(),
        rect.upper_right_y().trunc(),
    )
}

pub fn describe_region(rect: &Region) -> String {
    format!(
        "Highlighted area at ({:.1}, {:.1}) size {:.1} x {:.1}",
        rect.x, rect.y, rect.width, rect.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_page() -> PageContent {
        let mut page = PageContent::letter(0);
        for (i, ch) in "Review".chars().enumerate() {
            page.glyphs.push(Glyph::new(ch.to_string(), 100.0 + 6.0 * i as f32, 700.0));
        }
        page.glyphs.push(Glyph::new("x", 300.0, 700.0));
        page
    }

    fn review_quads() -> Vec<f32> {
        vec![98.0, 712.0, 134.0, 712.0, 98.0, 697.0, 134.0, 697.0]
    }

    fn chain(strategies: Vec<Strategy>) -> ExtractionStrategyChain {
        ExtractionStrategyChain::new(strategies, TextRegionResolver::default())
    }

    #[test]
    fn contents_wins_over_glyphs() {
        let page = review_page();
        let context = PageContext::new(&page);
        let markup = TextMarkup::highlight(Region::new(98.0, 697.0, 36.0, 15.0))
            .with_quad_points(review_quads())
            .with_contents("Author note");
        let chain = chain(vec![Strategy::Contents, Strategy::GlyphMatch]);
        assert_eq!(
            chain.resolve_text(&markup, &context),
            Some((Strategy::Contents, "Author note".to_string()))
        );
    }

    #[test]
    fn blank_contents_falls_through_to_glyph_match() {
        let page = review_page();
        let context = PageContext::new(&page);
        let markup = TextMarkup::highlight(Region::new(0.0, 0.0, 1.0, 1.0))
            .with_quad_points(review_quads())
            .with_contents("  \n ");
        let chain = chain(vec![Strategy::Contents, Strategy::GlyphMatch]);
        assert_eq!(
            chain.resolve_text(&markup, &context),
            Some((Strategy::GlyphMatch, "Review".to_string()))
        );
    }

    #[test]
    fn glyph_match_uses_rect_without_quads() {
        let page = review_page();
        let context = PageContext::new(&page);
        let markup = TextMarkup::highlight(Region::new(98.0, 697.0, 36.0, 15.0));
        let chain = chain(vec![Strategy::GlyphMatch]);
        assert_eq!(
            chain.resolve_text(&markup, &context).map(|(_, text)| text),
            Some("Review".to_string())
        );
    }

    #[test]
    fn malformed_quads_move_on_to_the_next_strategy() {
        let page = review_page();
        let context = PageContext::new(&page);
        let markup = TextMarkup::highlight(Region::new(98.0, 697.0, 36.0, 15.0))
            .with_quad_points(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            markup_regions(&markup),
            Err(StrategyError::MalformedQuadPoints(3))
        ));
        let chain = chain(vec![Strategy::GlyphMatch, Strategy::CoordinateDescription]);
        assert_eq!(
            chain.resolve_text(&markup, &context),
            Some((
                Strategy::CoordinateDescription,
                "Highlighted area at (98.0, 697.0) size 36.0 x 15.0".to_string()
            ))
        );
    }

    #[test]
    fn ocr_without_collaborators_yields_nothing() {
        let page = review_page();
        let context = PageContext::new(&page);
        let markup = TextMarkup::highlight(Region::new(98.0, 697.0, 36.0, 15.0));
        let only_ocr = chain(vec![Strategy::Ocr]);
        assert!(!only_ocr.has_ocr());
        assert_eq!(only_ocr.resolve_text(&markup, &context), None);
    }

    #[test]
    fn bounding_area_truncates_and_ignores_quads() {
        let mut page = PageContent::letter(0);
        page.glyphs.push(Glyph::new("a", 10.0, 10.0));
        page.glyphs.push(Glyph::new("b", 30.0, 10.0));
        let context = PageContext::new(&page);
        // Truncated to [12, 8, 27, 12]; tolerance 2 keeps "a" at x=10 inside.
        let markup = TextMarkup::highlight(Region::new(12.9, 8.5, 14.6, 3.9))
            .with_quad_points(review_quads());
        let chain = ExtractionStrategyChain::new(
            vec![Strategy::BoundingArea],
            TextRegionResolver::new(2.0),
        );
        assert_eq!(
            chain.resolve_text(&markup, &context).map(|(_, text)| text),
            Some("a".to_string())
        );
    }

    #[test]
    fn nearby_text_grows_by_the_line_height() {
        let mut page = PageContent::letter(0);
        page.glyphs.push(Glyph::new("n", 50.0, 115.0).with_font("F1", 10.0));
        let context = PageContext::new(&page);
        assert_eq!(context.line_height(), 10.0);
        let markup = TextMarkup::highlight(Region::new(45.0, 95.0, 20.0, 10.0));
        let strict = chain(vec![Strategy::GlyphMatch]);
        let nearby = chain(vec![Strategy::NearbyText]);
        assert_eq!(strict.resolve_text(&markup, &context), None);
        assert_eq!(
            nearby.resolve_text(&markup, &context),
            Some((Strategy::NearbyText, "n".to_string()))
        );
    }

    #[test]
    fn line_height_has_a_floor_of_one() {
        let page = PageContent::letter(0);
        assert_eq!(PageContext::new(&page).line_height(), 1.0);
    }

    #[test]
    fn empty_chain_resolves_nothing() {
        let page = review_page();
        let context = PageContext::new(&page);
        let markup = TextMarkup::highlight(Region::new(98.0, 697.0, 36.0, 15.0));
        assert_eq!(chain(Vec::new()).resolve_text(&markup, &context), None);
    }

    #[test]
    fn failed_render_is_remembered() {
        let page = PageContent::letter(0);
        let context = PageContext::new(&page);
        let mut calls = 0;
        assert!(context
            .page_image(|| {
                calls += 1;
                Err(RenderError::Unavailable("none".into()))
            })
            .is_none());
        assert!(context.page_image(|| Ok(RgbImage::new(1, 1))).is_none());
        assert_eq!(calls, 1);
    }
}
