//! Extract colour-coded highlight annotations, and the text under them,
//! from PDF documents.
//!
//! Each markup annotation is classified into a [`ColorCategory`]; the
//! [`ExtractionStrategyChain`] then tries its strategies in order until one
//! produces text. Pages can come from a PDF file ([`PdfSource`]) or be built
//! in memory ([`PageContent`]).

pub mod ai;
pub mod collector;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod ocr;
pub mod render;
pub mod report;
pub mod resolver;
pub mod source;
pub mod strategy;

#[cfg(feature = "python")]
mod python;

use std::path::Path;

pub use collector::{CollectStats, Extraction, HighlightCollector};
pub use color::{ColorPolicy, Rgb};
pub use config::{ExtractorConfig, Mode, OcrConfig};
pub use error::{Error, Result};
pub use model::{
    Annotation, ColorCategory, Glyph, HighlightResult, MarkupKind, PageContent, Region,
    TextMarkup, group_by_color,
};
pub use resolver::TextRegionResolver;
pub use source::{DocumentSource, PdfSource};
pub use strategy::{ExtractionStrategyChain, PageContext, Strategy};

use ai::{ResampleUpscaler, Upscaler};
use ocr::{OcrPipeline, TesseractEngine};
use render::PdftoppmRenderer;

/// Strategy chain for `config`, with the OCR collaborators attached when
/// the strategy order uses them.
///
/// Missing language data or a missing `tesseract`/`pdftoppm` executable is
/// reported here, before any page is touched.
pub fn build_chain(pdf_path: &Path, config: &ExtractorConfig) -> Result<ExtractionStrategyChain> {
    let chain = ExtractionStrategyChain::from_config(config);
    if !config.needs_ocr() {
        return Ok(chain);
    }

    let engine = TesseractEngine::new(&config.ocr)?;
    let renderer = PdftoppmRenderer::new(pdf_path);
    renderer.check_available()?;
    let pipeline = OcrPipeline::from_config(Box::new(renderer), Box::new(engine), config)
        .with_upscaler(build_upscaler(config)?);
    Ok(chain.with_ocr(pipeline))
}

fn build_upscaler(config: &ExtractorConfig) -> Result<Box<dyn Upscaler>> {
    let resample = || ResampleUpscaler::new(config.upscale_factor, config.max_dimension);
    let Some(model) = config.superres_model.as_deref() else {
        return Ok(Box::new(resample()));
    };

    #[cfg(feature = "superres")]
    {
        let engine =
            ai::SuperResolutionEngine::from_onnx(model, config.channel_order, config.max_dimension)?;
        log::info!("upscaling OCR crops with {}", model.display());
        Ok(Box::new(engine))
    }
    #[cfg(not(feature = "superres"))]
    {
        log::warn!(
            "ignoring super-resolution model {}: built without the `superres` feature",
            model.display()
        );
        Ok(Box::new(resample()))
    }
}

/// Open `path` and collect every classified highlight.
pub fn extract_file(path: impl AsRef<Path>, config: &ExtractorConfig) -> Result<Extraction> {
    let path = path.as_ref();
    let chain = build_chain(path, config)?;
    let source = PdfSource::open(path)?;
    let collector = HighlightCollector::new(config.color.clone(), chain);
    Ok(collector.collect_source(&source))
}

#[cfg(test)]
mod tests {
    use image::{Rgb as Pixel, RgbImage};

    use super::*;

    #[test]
    fn resampling_follows_the_configured_factor() {
        let config = ExtractorConfig::new().with_upscale_factor(3);
        let upscaler = build_upscaler(&config).unwrap();
        let crop = RgbImage::from_pixel(10, 4, Pixel([255, 255, 255]));
        assert_eq!(upscaler.upscale(&crop).unwrap().dimensions(), (30, 12));
    }

    #[cfg(not(feature = "superres"))]
    #[test]
    fn model_is_ignored_without_superres_support() {
        let config = ExtractorConfig::new().with_superres_model("/models/absent.onnx");
        let upscaler = build_upscaler(&config).unwrap();
        let crop = RgbImage::from_pixel(5, 5, Pixel([0, 0, 0]));
        assert_eq!(upscaler.upscale(&crop).unwrap().dimensions(), (10, 10));
    }
}
