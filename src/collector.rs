//! Walks pages and annotations and turns classified markup into results.

use crate::color::ColorPolicy;
use crate::config::ExtractorConfig;
use crate::model::{HighlightResult, PageContent};
use crate::source::DocumentSource;
use crate::strategy::{ExtractionStrategyChain, PageContext};

/// Counters for one document run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub pages: usize,
    pub skipped_pages: usize,
    pub markup_annotations: usize,
    pub unclassified: usize,
    pub unresolved: usize,
}

/// Results of one document together with its counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub results: Vec<HighlightResult>,
    pub stats: CollectStats,
}

pub struct HighlightCollector {
    policy: ColorPolicy,
    chain: ExtractionStrategyChain,
}

impl HighlightCollector {
    pub fn new(policy: ColorPolicy, chain: ExtractionStrategyChain) -> Self {
        Self { policy, chain }
    }

    /// Collector without OCR collaborators.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.color.clone(), ExtractionStrategyChain::from_config(config))
    }

    pub fn chain(&self) -> &ExtractionStrategyChain {
        &self.chain
    }

    /// Results for every page, in page order then annotation order.
    pub fn collect(&self, pages: &[PageContent]) -> Vec<HighlightResult> {
        let mut stats = CollectStats::default();
        let mut results = Vec::new();
        for page in pages {
            self.collect_into(page, &mut results, &mut stats);
        }
        results
    }

    /// Results for a single page.
    pub fn collect_page(&self, page: &PageContent) -> Vec<HighlightResult> {
        let mut results = Vec::new();
        self.collect_into(page, &mut results, &mut CollectStats::default());
        results
    }

    /// Pull pages from `source` one at a time. A page that fails to load is
    /// logged and skipped.
    pub fn collect_source(&self, source: &dyn DocumentSource) -> Extraction {
        let mut extraction = Extraction::default();
        let page_count = source.page_count();
        for index in 0..page_count {
            match source.page(index) {
                Ok(page) => {
                    self.collect_into(&page, &mut extraction.results, &mut extraction.stats)
                }
                Err(err) => {
                    log::warn!("skipping page {}: {err}", index + 1);
                    extraction.stats.skipped_pages += 1;
                }
            }
        }
        log::info!(
            "collected {} highlights from {} of {page_count} pages",
            extraction.results.len(),
            extraction.stats.pages
        );
        extraction
    }

    fn collect_into(
        &self,
        page: &PageContent,
        results: &mut Vec<HighlightResult>,
        stats: &mut CollectStats,
    ) {
        stats.pages += 1;
        let context = PageContext::new(page);
        for markup in page.annotations.iter().filter_map(|a| a.as_markup()) {
            stats.markup_annotations += 1;
            let Some(color) = self.policy.classify_components(markup.color.as_deref()) else {
                log::debug!(
                    "page {}: unclassified colour {:?} at {}",
                    page.number(),
                    markup.color,
                    markup.rect
                );
                stats.unclassified += 1;
                continue;
            };
            let Some((_, text)) = self.chain.resolve_text(markup, &context) else {
                stats.unresolved += 1;
                continue;
            };
            results.push(HighlightResult {
                text,
                color,
                page: page.number(),
                region: markup.rect,
            });
        }
    }
}
