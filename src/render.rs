//! Page rasterization.

use std::path::PathBuf;
use std::process::Command;

use image::RgbImage;

use crate::error::RenderError;

/// Renders one page of a document to an RGB bitmap.
pub trait Renderer {
    fn render(&self, page_index: usize, dpi: f32) -> Result<RgbImage, RenderError>;
}

/// Rasterizes pages with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    pdf_path: PathBuf,
    program: PathBuf,
}

impl PdftoppmRenderer {
    pub fn new(pdf_path: impl Into<PathBuf>) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            program: PathBuf::from("pdftoppm"),
        }
    }

    /// Use a specific `pdftoppm` binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Fail early when the executable cannot be started.
    pub fn check_available(&self) -> Result<(), RenderError> {
        Command::new(&self.program)
            .arg("-v")
            .output()
            .map(|_| ())
            .map_err(|e| {
                RenderError::Unavailable(format!("{}: {e}", self.program.display()))
            })
    }
}

impl Renderer for PdftoppmRenderer {
    fn render(&self, page_index: usize, dpi: f32) -> Result<RgbImage, RenderError> {
        let page_number = (page_index + 1).to_string();
        let scratch = tempfile::Builder::new().prefix("pdfhighlights").tempdir()?;
        let prefix = scratch.path().join("page");

        let output = Command::new(&self.program)
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg("-r")
            .arg(format!("{}", dpi.round().max(1.0) as u32))
            .arg("-png")
            .arg("-singlefile")
            .arg(&self.pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                RenderError::Unavailable(format!("{}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                page: page_index + 1,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let png_path = prefix.with_extension("png");
        let image = image::open(&png_path)?.to_rgb8();
        log::debug!(
            "rendered page {} at {dpi} dpi: {}x{}",
            page_index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
