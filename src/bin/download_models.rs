use std::path::{Path, PathBuf};

use clap::Parser;
use pdfhighlights::ai::{
    AiError, REALESRGAN_X4PLUS_ONNX, download_model_with_progress, model_filename, tessdata_url,
};

#[derive(Debug, Parser)]
#[command(about = "Download Tesseract language data (and optionally an ONNX upscaler) for offline use.")]
struct Args {
    /// Languages to fetch, e.g. `eng deu`
    #[arg(short, long = "lang", default_value = "eng", num_args = 1..)]
    languages: Vec<String>,

    /// Directory to save `.traineddata` files into; point --tessdata or TESSDATA_PREFIX here.
    #[arg(short, long, default_value = "tessdata")]
    output_dir: PathBuf,

    /// Directory for ONNX models.
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,

    /// Also fetch the Real-ESRGAN x4 super-resolution model.
    #[arg(long)]
    superres: bool,

    /// Re-download files that already exist.
    #[arg(long)]
    force: bool,
}

fn main() -> Result<(), AiError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    for language in &args.languages {
        download_if_needed(&tessdata_url(language), &args.output_dir, args.force)?;
    }
    if args.superres {
        download_if_needed(REALESRGAN_X4PLUS_ONNX, &args.models_dir, args.force)?;
    }
    Ok(())
}

fn download_if_needed(url: &str, dir: &Path, force: bool) -> Result<(), AiError> {
    let target_path = dir.join(model_filename(url)?);

    if !force && target_path.exists() {
        println!("Skipping existing file: {}", target_path.display());
        return Ok(());
    }

    let mut last_percent = None;
    let saved = download_model_with_progress(
        url,
        dir,
        Some(|downloaded: u64, total: Option<u64>| {
            if let Some(total) = total.filter(|&t| t > 0) {
                let percent = downloaded * 100 / total;
                if last_percent != Some(percent) && percent % 10 == 0 {
                    log::info!("{percent}% of {total} bytes");
                    last_percent = Some(percent);
                }
            }
        }),
    )?;
    println!("Downloaded {} -> {}", url, saved.display());
    Ok(())
}
