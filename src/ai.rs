//! Crop enhancement before OCR, and model downloads.
//!
//! Small crops recognise poorly, so every crop is enlarged before it reaches
//! the OCR engine. [`ResampleUpscaler`] does plain resampling; with the
//! `superres` feature an ONNX super-resolution model can do it instead.

use std::fs;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::RgbImage;
use image::imageops::{self, FilterType};
use reqwest::blocking::Client;
use thiserror::Error;

/// Primary error type for upscaling and model download helpers.
#[derive(Debug, Error)]
pub enum AiError {
    #[cfg(feature = "superres")]
    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected tensor shape: {0:?}")]
    InvalidTensorShape(Vec<usize>),
    #[error("failed to derive filename from URL {0}")]
    MissingFilename(String),
}

/// Enlarges an OCR crop.
pub trait Upscaler {
    fn upscale(&self, image: &RgbImage) -> Result<RgbImage, AiError>;
}

/// Integer-factor resampling, capped at a maximum dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleUpscaler {
    pub factor: u32,
    pub filter: FilterType,
    /// Longest side allowed after upscaling; 0 disables the cap.
    pub max_dimension: u32,
}

impl ResampleUpscaler {
    pub fn new(factor: u32, max_dimension: u32) -> Self {
        Self {
            factor,
            filter: FilterType::CatmullRom,
            max_dimension,
        }
    }
}

impl Default for ResampleUpscaler {
    fn default() -> Self {
        Self::new(2, 4096)
    }
}

impl Upscaler for ResampleUpscaler {
    fn upscale(&self, image: &RgbImage) -> Result<RgbImage, AiError> {
        let (width, height) = image.dimensions();
        let enlarged = if self.factor <= 1 || width == 0 || height == 0 {
            image.clone()
        } else {
            imageops::resize(
                image,
                width.saturating_mul(self.factor),
                height.saturating_mul(self.factor),
                self.filter,
            )
        };
        Ok(resize_if_needed(enlarged, self.max_dimension, self.filter))
    }
}

/// Shrink `image` so its longest side is at most `max_dimension`.
pub fn resize_if_needed(image: RgbImage, max_dimension: u32, filter: FilterType) -> RgbImage {
    if max_dimension == 0 {
        return image;
    }

    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return image;
    }

    let scale = max_dimension as f32 / longest as f32;
    let new_width = ((width as f32) * scale).round().max(1.0) as u32;
    let new_height = ((height as f32) * scale).round().max(1.0) as u32;
    imageops::resize(&image, new_width, new_height, filter)
}

/// Channel ordering used when converting between images and tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    Rgb,
    /// Expected by Real-ESRGAN style models.
    #[default]
    Bgr,
}

/// Tensor channel index of the red, green and blue components.
pub fn channel_indices(order: ChannelOrder) -> (usize, usize, usize) {
    match order {
        ChannelOrder::Rgb => (0, 1, 2),
        ChannelOrder::Bgr => (2, 1, 0),
    }
}

#[cfg(feature = "superres")]
pub use superres::SuperResolutionEngine;

#[cfg(feature = "superres")]
mod superres {
    use std::path::Path;

    use image::{ImageBuffer, Rgb, RgbImage};
    use ndarray::{Array4, Ix4};
    use ort::{GraphOptimizationLevel, Session};

    use super::{AiError, ChannelOrder, Upscaler, channel_indices, resize_if_needed};

    /// NCHW tensor with values in `[0.0, 1.0]`.
    pub(super) fn image_to_nchw_f32(image: &RgbImage, order: ChannelOrder) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        let (r_idx, g_idx, b_idx) = channel_indices(order);

        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[(0, r_idx, y, x)] = pixel[0] as f32 / 255.0;
            tensor[(0, g_idx, y, x)] = pixel[1] as f32 / 255.0;
            tensor[(0, b_idx, y, x)] = pixel[2] as f32 / 255.0;
        }

        tensor
    }

    fn clamp_channel(value: f32) -> u8 {
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    pub(super) fn nchw_f32_to_image(
        tensor: &Array4<f32>,
        order: ChannelOrder,
    ) -> Result<RgbImage, AiError> {
        let shape = tensor.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(AiError::InvalidTensorShape(shape.to_vec()));
        }

        let height = shape[2];
        let width = shape[3];
        let mut buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::new(width as u32, height as u32);
        let (r_idx, g_idx, b_idx) = channel_indices(order);

        for (x, y, pixel) in buffer.enumerate_pixels_mut() {
            let (x, y) = (x as usize, y as usize);
            *pixel = Rgb([
                clamp_channel(tensor[(0, r_idx, y, x)]),
                clamp_channel(tensor[(0, g_idx, y, x)]),
                clamp_channel(tensor[(0, b_idx, y, x)]),
            ]);
        }

        Ok(buffer)
    }

    /// ORT session running a Real-ESRGAN/SwinIR style model.
    pub struct SuperResolutionEngine {
        session: Session,
        order: ChannelOrder,
        max_dimension: u32,
    }

    impl SuperResolutionEngine {
        pub fn from_onnx(
            model_path: impl AsRef<Path>,
            order: ChannelOrder,
            max_dimension: u32,
        ) -> Result<Self, AiError> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(model_path)?;

            Ok(Self {
                session,
                order,
                max_dimension,
            })
        }

        pub fn run(&self, input: &Array4<f32>) -> Result<Array4<f32>, AiError> {
            let outputs = self.session.run(ort::inputs![input.view()]?)?;
            let tensor = outputs[0].try_extract_tensor::<f32>()?;
            let shape = tensor.shape().to_vec();
            tensor
                .to_owned()
                .into_dimensionality::<Ix4>()
                .map_err(|_| AiError::InvalidTensorShape(shape))
        }
    }

    impl Upscaler for SuperResolutionEngine {
        fn upscale(&self, image: &RgbImage) -> Result<RgbImage, AiError> {
            let tensor = image_to_nchw_f32(image, self.order);
            let output = self.run(&tensor)?;
            let upscaled = nchw_f32_to_image(&output, self.order)?;
            Ok(resize_if_needed(
                upscaled,
                self.max_dimension,
                image::imageops::FilterType::Lanczos3,
            ))
        }
    }
}

/// Base URL of the fast Tesseract LSTM models.
pub const TESSDATA_FAST_BASE: &str = "https://github.com/tesseract-ocr/tessdata_fast/raw/main";

/// Download URL of the Tesseract model for `language`.
pub fn tessdata_url(language: &str) -> String {
    format!("{TESSDATA_FAST_BASE}/{language}.traineddata")
}

/// Real-ESRGAN x4 model for the `superres` feature.
pub const REALESRGAN_X4PLUS_ONNX: &str =
    "https://github.com/xinntao/Real-ESRGAN/releases/download/v0.2.5.0/realesrgan-x4plus.onnx";

/// File name a download of `url` is stored under.
pub fn model_filename(url: &str) -> Result<&str, AiError> {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AiError::MissingFilename(url.to_owned()))
}

/// Download a model file and report progress through the callback.
pub fn download_model_with_progress<F>(
    url: &str,
    output_dir: impl AsRef<Path>,
    mut progress: Option<F>,
) -> Result<PathBuf, AiError>
where
    F: FnMut(u64, Option<u64>),
{
    let dir = output_dir.as_ref();
    fs::create_dir_all(dir)?;
    let output_path = dir.join(model_filename(url)?);

    let client = Client::builder().gzip(true).brotli(true).build()?;
    let mut response = client.get(url).send()?.error_for_status()?;
    let total_size = response.content_length();
    log::info!("downloading {url} -> {}", output_path.display());

    // Partial downloads never land under the final name.
    let partial_path = output_path.with_extension("part");
    let mut file = fs::File::create(&partial_path)?;

    let mut downloaded = 0u64;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let read = response.read(&mut buffer)?;
        if read == 0 {
            break;
        }

        file.write_all(&buffer[..read])?;
        downloaded += read as u64;

        if let Some(ref mut cb) = progress {
            cb(downloaded, total_size);
        }
    }
    file.flush()?;
    drop(file);
    fs::rename(&partial_path, &output_path)?;

    Ok(output_path)
}
