//! Extraction settings.

use std::path::PathBuf;
use std::str::FromStr;

use crate::ai::ChannelOrder;
use crate::color::ColorPolicy;
use crate::geometry::{DEFAULT_PADDING, DEFAULT_TOLERANCE};
use crate::strategy::Strategy;

/// Named strategy orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Annotation contents, glyph match, coordinate description.
    #[default]
    Geometric,
    /// OCR over the rendered highlight only.
    Ocr,
    /// Annotation contents, glyph match, OCR, coordinate description.
    Full,
    /// Bounding-rect area match, contents, nearby text, coordinate description.
    Area,
    /// Annotation contents, coordinate description.
    Annotation,
}

impl Mode {
    pub fn strategies(&self) -> Vec<Strategy> {
        use Strategy::*;
        match self {
            Mode::Geometric => vec![Contents, GlyphMatch, CoordinateDescription],
            Mode::Ocr => vec![Ocr],
            Mode::Full => vec![Contents, GlyphMatch, Ocr, CoordinateDescription],
            Mode::Area => vec![BoundingArea, Contents, NearbyText, CoordinateDescription],
            Mode::Annotation => vec![Contents, CoordinateDescription],
        }
    }

    pub fn needs_ocr(&self) -> bool {
        self.strategies().contains(&Strategy::Ocr)
    }

    /// Human-readable label used in reports.
    pub fn description(&self) -> &'static str {
        match self {
            Mode::Geometric => "Coordinate-based text extraction",
            Mode::Ocr => "OCR-based text extraction using Tesseract",
            Mode::Full => "Coordinate-based text extraction with OCR fallback",
            Mode::Area => "Area-based text extraction",
            Mode::Annotation => "Annotation contents",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "geometric" => Ok(Mode::Geometric),
            "ocr" => Ok(Mode::Ocr),
            "full" => Ok(Mode::Full),
            "area" => Ok(Mode::Area),
            "annotation" => Ok(Mode::Annotation),
            other => Err(format!(
                "unknown mode '{other}' (expected geometric, ocr, full, area or annotation)"
            )),
        }
    }
}

/// Tesseract settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    pub language: String,
    /// Checked before the standard install locations.
    pub tessdata_dir: Option<PathBuf>,
    /// `--psm`; 6 treats the crop as one uniform block of text.
    pub page_seg_mode: u8,
    /// `--oem`; 1 is the LSTM engine.
    pub engine_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tessdata_dir: None,
            page_seg_mode: 6,
            engine_mode: 1,
        }
    }
}

/// Everything tunable about one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    pub mode: Mode,
    /// Explicit strategy order; overrides `mode` when set.
    pub strategies: Option<Vec<Strategy>>,
    /// Glyph containment slack in user-space units.
    pub tolerance: f32,
    pub dpi: f32,
    /// Pixels added around each OCR crop.
    pub padding: u32,
    pub upscale_factor: u32,
    /// Upscaled crops are shrunk back to fit this many pixels on their longest side.
    pub max_dimension: u32,
    /// ONNX super-resolution model used instead of resampling. Needs the
    /// `superres` feature.
    pub superres_model: Option<PathBuf>,
    /// Tensor channel layout the super-resolution model expects.
    pub channel_order: ChannelOrder,
    pub color: ColorPolicy,
    pub ocr: OcrConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self {
            mode: Mode::default(),
            strategies: None,
            tolerance: DEFAULT_TOLERANCE,
            dpi: 300.0,
            padding: DEFAULT_PADDING,
            upscale_factor: 2,
            max_dimension: 4096,
            superres_model: None,
            channel_order: ChannelOrder::default(),
            color: ColorPolicy::default(),
            ocr: OcrConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
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

    pub fn with_upscale_factor(mut self, factor: u32) -> Self {
        self.upscale_factor = factor;
        self
    }

    pub fn with_superres_model(mut self, model: impl Into<PathBuf>) -> Self {
        self.superres_model = Some(model.into());
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    pub fn with_color_policy(mut self, policy: ColorPolicy) -> Self {
        self.color = policy;
        self
    }

    pub fn with_ocr(mut self, ocr: OcrConfig) -> Self {
        self.ocr = ocr;
        self
    }

    /// The strategy order this configuration runs.
    pub fn strategy_order(&self) -> Vec<Strategy> {
        self.strategies
            .clone()
            .unwrap_or_else(|| self.mode.strategies())
    }

    pub fn needs_ocr(&self) -> bool {
        self.strategy_order().contains(&Strategy::Ocr)
    }
}
