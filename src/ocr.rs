//! OCR over rendered highlight regions.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use image::imageops;
use png::{BitDepth, ColorType, Encoder};

use crate::ai::{ResampleUpscaler, Upscaler};
use crate::config::{ExtractorConfig, OcrConfig};
use crate::error::{OcrError, StrategyError};
use crate::geometry::{DEFAULT_PADDING, pdf_rect_to_image_rect};
use crate::model::Region;
use crate::render::Renderer;
use crate::strategy::PageContext;

/// Maps a bitmap to recognised text.
pub trait OcrEngine {
    fn recognize(&self, image: &RgbImage) -> Result<String, OcrError>;
}

/// Collapse whitespace runs (newlines included) to single spaces, drop
/// control characters and trim.
pub fn normalize_ocr_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_whitespace() || !c.is_control())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Directories searched for Tesseract language data, most specific first.
pub fn tessdata_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = explicit {
        candidates.push(dir.to_path_buf());
    }
    if let Some(prefix) = env::var_os("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join("tessdata"));
    }
    candidates.push(PathBuf::from("tessdata"));
    for dir in [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ] {
        candidates.push(PathBuf::from(dir));
    }
    if cfg!(windows) {
        candidates.push(PathBuf::from(r"C:\Program Files\Tesseract-OCR\tessdata"));
        candidates.push(PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tessdata"));
    }
    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// First candidate directory holding `<language>.traineddata`.
pub fn find_tessdata(language: &str, candidates: &[PathBuf]) -> Result<PathBuf, OcrError> {
    let file_name = format!("{language}.traineddata");
    candidates
        .iter()
        .find(|dir| dir.join(&file_name).is_file())
        .cloned()
        .ok_or_else(|| OcrError::ModelNotFound {
            language: language.to_string(),
            searched: candidates.to_vec(),
        })
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, image.width(), image.height());
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    writer
        .write_image_data(image.as_raw())
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    drop(writer);
    Ok(buffer)
}

/// Runs the `tesseract` executable once per crop.
///
/// Every call is independent, so one engine can serve any number of pages.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: PathBuf,
    tessdata_dir: PathBuf,
    language: String,
    page_seg_mode: u8,
    engine_mode: u8,
}

impl TesseractEngine {
    /// Locate language data and the executable. Either missing is a setup
    /// error; nothing is recognised until both are found.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let candidates = tessdata_candidates(config.tessdata_dir.as_deref());
        let tessdata_dir = find_tessdata(&config.language, &candidates)?;
        let engine = Self::with_tessdata(tessdata_dir, config);
        engine.check_available()?;
        log::info!(
            "using tesseract language '{}' from {}",
            engine.language,
            engine.tessdata_dir.display()
        );
        Ok(engine)
    }

    /// Build an engine for a known tessdata directory without probing anything.
    pub fn with_tessdata(tessdata_dir: impl Into<PathBuf>, config: &OcrConfig) -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            tessdata_dir: tessdata_dir.into(),
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
            engine_mode: config.engine_mode,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn check_available(&self) -> Result<(), OcrError> {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|_| ())
            .map_err(|e| OcrError::EngineUnavailable(format!("{}: {e}", self.program.display())))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &RgbImage) -> Result<String, OcrError> {
        let png = encode_png(image)?;
        let mut input = tempfile::Builder::new()
            .prefix("highlight_region")
            .suffix(".png")
            .tempfile()?;
        std::io::Write::write_all(&mut input, &png)?;

        let output = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.tessdata_dir)
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg(self.engine_mode.to_string())
            .arg("--psm")
            .arg(self.page_seg_mode.to_string())
            .output()
            .map_err(|e| OcrError::EngineUnavailable(format!("{}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Render, crop, upscale and recognise one highlight.
pub struct OcrPipeline {
    renderer: Box<dyn Renderer>,
    engine: Box<dyn OcrEngine>,
    upscaler: Box<dyn Upscaler>,
    dpi: f32,
    padding: u32,
}

impl OcrPipeline {
    pub fn new(renderer: Box<dyn Renderer>, engine: Box<dyn OcrEngine>) -> Self {
        Self {
            renderer,
            engine,
            upscaler: Box::new(ResampleUpscaler::default()),
            dpi: 300.0,
            padding: DEFAULT_PADDING,
        }
    }

    /// Pipeline with the DPI, padding and upscaling from `config`.
    pub fn from_config(
        renderer: Box<dyn Renderer>,
        engine: Box<dyn OcrEngine>,
        config: &ExtractorConfig,
    ) -> Self {
        Self::new(renderer, engine)
            .with_dpi(config.dpi)
            .with_padding(config.padding)
            .with_upscaler(Box::new(ResampleUpscaler::new(
                config.upscale_factor,
                config.max_dimension,
            )))
    }

    pub fn with_upscaler(mut self, upscaler: Box<dyn Upscaler>) -> Self {
        self.upscaler = upscaler;
        self
    }

    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Normalised OCR text for `rect` on the context's page.
    pub fn recognize_region(
        &self,
        rect: &Region,
        page: &PageContext<'_>,
    ) -> Result<String, StrategyError> {
        let content = page.page();
        let image = page
            .page_image(|| self.renderer.render(content.index, self.dpi))
            .ok_or(StrategyError::NoPageImage)?;
        let pixels = pdf_rect_to_image_rect(
            &content.to_page_space(*rect),
            content.width,
            content.height,
            image.width(),
            image.height(),
            self.padding,
        );
        if pixels.is_empty() {
            return Err(StrategyError::EmptyCrop);
        }
        let crop = imageops::crop_imm(image, pixels.x, pixels.y, pixels.width, pixels.height)
            .to_image();
        let enhanced = self.upscaler.upscale(&crop)?;
        let raw = self.engine.recognize(&enhanced)?;
        Ok(normalize_ocr_text(&raw))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;

    use image::Rgb;

    use super::*;
    use crate::error::RenderError;
    use crate::model::PageContent;

    struct BlankRenderer {
        calls: Rc<Cell<usize>>,
    }

    impl Renderer for BlankRenderer {
        fn render(&self, _page_index: usize, dpi: f32) -> Result<RgbImage, RenderError> {
            self.calls.set(self.calls.get() + 1);
            let scale = dpi / 72.0;
            let (w, h) = ((612.0 * scale) as u32, (792.0 * scale) as u32);
            Ok(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, page_index: usize, _dpi: f32) -> Result<RgbImage, RenderError> {
            Err(RenderError::Failed {
                page: page_index + 1,
                reason: "broken".into(),
            })
        }
    }

    struct ScriptedOcr {
        text: &'static str,
        sizes: Rc<RefCell<Vec<(u32, u32)>>>,
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, image: &RgbImage) -> Result<String, OcrError> {
            self.sizes.borrow_mut().push(image.dimensions());
            Ok(self.text.to_string())
        }
    }

    fn pipeline(text: &'static str) -> (OcrPipeline, Rc<Cell<usize>>, Rc<RefCell<Vec<(u32, u32)>>>) {
        let calls = Rc::new(Cell::new(0));
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let pipeline = OcrPipeline::new(
            Box::new(BlankRenderer {
                calls: Rc::clone(&calls),
            }),
            Box::new(ScriptedOcr {
                text,
                sizes: Rc::clone(&sizes),
            }),
        )
        .with_dpi(72.0);
        (pipeline, calls, sizes)
    }

    #[test]
    fn normalizes_whitespace_and_control_characters() {
        assert_eq!(normalize_ocr_text("  Hello\n\nworld \u{7}\t!\r\n"), "Hello world !");
        assert_eq!(normalize_ocr_text("a\u{0}b"), "ab");
        assert_eq!(normalize_ocr_text(" \n\t "), "");
    }

    #[test]
    fn crops_pads_and_upscales_before_recognition() {
        let (pipeline, _, sizes) = pipeline(" Key\nfinding ");
        let page = PageContent::letter(0);
        let context = PageContext::new(&page);
        let text = pipeline
            .recognize_region(&Region::new(100.0, 700.0, 50.0, 20.0), &context)
            .unwrap();
        assert_eq!(text, "Key finding");
        // 50x20 at 72 dpi, padded by 5 on each side, then doubled.
        assert_eq!(sizes.borrow().as_slice(), &[(120, 60)]);
    }

    #[test]
    fn padding_and_factor_come_from_config() {
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let config = ExtractorConfig::new()
            .with_dpi(72.0)
            .with_padding(0)
            .with_upscale_factor(3);
        let pipeline = OcrPipeline::from_config(
            Box::new(BlankRenderer {
                calls: Rc::default(),
            }),
            Box::new(ScriptedOcr {
                text: "x",
                sizes: Rc::clone(&sizes),
            }),
            &config,
        );
        let page = PageContent::letter(0);
        pipeline
            .recognize_region(&Region::new(100.0, 700.0, 50.0, 20.0), &PageContext::new(&page))
            .unwrap();
        assert_eq!(sizes.borrow().as_slice(), &[(150, 60)]);
    }

    #[test]
    fn page_is_rendered_once_per_context() {
        let (pipeline, calls, _) = pipeline("x");
        let page = PageContent::letter(0);
        let context = PageContext::new(&page);
        for _ in 0..3 {
            pipeline
                .recognize_region(&Region::new(10.0, 10.0, 10.0, 10.0), &context)
                .unwrap();
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn region_off_the_page_is_an_empty_crop() {
        let (pipeline, _, sizes) = pipeline("x");
        let page = PageContent::letter(0);
        let context = PageContext::new(&page);
        let err = pipeline
            .recognize_region(&Region::new(5000.0, 5000.0, 10.0, 10.0), &context)
            .unwrap_err();
        assert!(matches!(err, StrategyError::EmptyCrop));
        assert!(sizes.borrow().is_empty());
    }

    /// Letter-sized render with a dark block at pixels 100..150 x 72..92.
    struct InkRenderer;

    impl Renderer for InkRenderer {
        fn render(&self, _page_index: usize, _dpi: f32) -> Result<RgbImage, RenderError> {
            let mut image = RgbImage::from_pixel(612, 792, Rgb([255, 255, 255]));
            for x in 100..150 {
                for y in 72..92 {
                    image.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
            Ok(image)
        }
    }

    struct InkDetector;

    impl OcrEngine for InkDetector {
        fn recognize(&self, image: &RgbImage) -> Result<String, OcrError> {
            let dark = image.pixels().any(|p| p.0[0] < 128);
            Ok(if dark { "ink" } else { "blank" }.to_string())
        }
    }

    #[test]
    fn media_box_origin_is_removed_before_cropping() {
        let pipeline = OcrPipeline::new(Box::new(InkRenderer), Box::new(InkDetector)).with_dpi(72.0);
        // Media box [0 100 612 892]: user y=800 is 700 above the page bottom.
        let page = PageContent::letter(0).with_origin(0.0, 100.0);
        let context = PageContext::new(&page);
        let text = pipeline
            .recognize_region(&Region::new(100.0, 800.0, 50.0, 20.0), &context)
            .unwrap();
        assert_eq!(text, "ink");
    }

    #[test]
    fn render_failure_means_no_page_image() {
        let pipeline = OcrPipeline::new(
            Box::new(FailingRenderer),
            Box::new(ScriptedOcr {
                text: "x",
                sizes: Rc::default(),
            }),
        );
        let page = PageContent::letter(0);
        let context = PageContext::new(&page);
        let err = pipeline
            .recognize_region(&Region::new(10.0, 10.0, 10.0, 10.0), &context)
            .unwrap_err();
        assert!(matches!(err, StrategyError::NoPageImage));
    }

    #[test]
    fn finds_language_data_in_first_matching_directory() {
        let root = tempfile::tempdir().unwrap();
        let empty = root.path().join("empty");
        let with_data = root.path().join("tessdata");
        fs::create_dir_all(&empty).unwrap();
        fs::create_dir_all(&with_data).unwrap();
        fs::write(with_data.join("eng.traineddata"), b"model").unwrap();

        let found = find_tessdata("eng", &[empty.clone(), with_data.clone()]).unwrap();
        assert_eq!(found, with_data);

        match find_tessdata("deu", &[empty.clone(), with_data.clone()]) {
            Err(OcrError::ModelNotFound { language, searched }) => {
                assert_eq!(language, "deu");
                assert_eq!(searched, vec![empty, with_data]);
            }
            other => panic!("expected ModelNotFound, got {other:?}"),
        }
    }

    #[test]
    fn explicit_tessdata_dir_is_searched_first() {
        let explicit = PathBuf::from("/custom/tessdata");
        let candidates = tessdata_candidates(Some(explicit.as_path()));
        assert_eq!(candidates.first(), Some(&explicit));
        let unique: std::collections::HashSet<_> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn missing_tesseract_binary_is_a_setup_error() {
        let root = tempfile::tempdir().unwrap();
        let engine = TesseractEngine::with_tessdata(root.path(), &OcrConfig::default())
            .with_program("/nonexistent/tesseract");
        assert!(matches!(
            engine.check_available(),
            Err(OcrError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn encodes_crop_as_png() {
        let crop = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let png = encode_png(&crop).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded, crop);
    }
}
