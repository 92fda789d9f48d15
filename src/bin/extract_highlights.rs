use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use pdfhighlights::ai::ChannelOrder;
use pdfhighlights::report::{DEFAULT_OUTPUT, Report, print_summary};
use pdfhighlights::{ColorPolicy, Error, ExtractorConfig, Mode, OcrConfig, extract_file};

#[derive(Debug, Clone, ValueEnum)]
enum ModeChoice {
    /// Annotation contents, then glyphs under the quad points
    Geometric,
    /// Tesseract over the rendered highlight only
    Ocr,
    /// Geometric, with OCR before the coordinate fallback
    Full,
    /// Glyphs under the bounding rectangle, then nearby text
    Area,
    /// Annotation contents only
    Annotation,
}

#[derive(Debug, Clone, ValueEnum)]
enum ChannelOrderChoice {
    Rgb,
    Bgr,
}

#[derive(Debug, Parser)]
#[command(about = "Extract green, yellow and purple highlights and their text from a PDF.")]
struct Args {
    /// Input PDF
    pdf: PathBuf,

    /// Text resolution strategy order
    #[arg(long, value_enum, default_value_t = ModeChoice::Geometric)]
    mode: ModeChoice,

    /// JSON report path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Print the summary only
    #[arg(long)]
    no_json: bool,

    /// Directory holding <lang>.traineddata, searched before the standard locations
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Tesseract language
    #[arg(long, default_value = "eng")]
    lang: String,

    /// Render resolution for OCR
    #[arg(long, default_value_t = 300.0)]
    dpi: f32,

    /// Pixels added around each OCR crop
    #[arg(long, default_value_t = 5)]
    padding: u32,

    /// Resampling factor applied to OCR crops
    #[arg(long, default_value_t = 2)]
    upscale: u32,

    /// Glyph containment slack in PDF units
    #[arg(long, default_value_t = 2.0)]
    tolerance: f32,

    /// Reference colour match tolerance per channel
    #[arg(long, default_value_t = 80)]
    color_tolerance: u8,

    /// Optional ONNX super-resolution model for OCR crops (needs the `superres` feature)
    #[arg(long)]
    superres_model: Option<PathBuf>,

    /// Tensor channel order of the super-resolution model
    #[arg(long, value_enum, default_value_t = ChannelOrderChoice::Bgr)]
    channel_order: ChannelOrderChoice,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(&args)
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn run(args: &Args) -> Result<(), Error> {
    let mode = mode_choice_to_mode(&args.mode);
    let mut config = ExtractorConfig::new()
        .with_mode(mode)
        .with_dpi(args.dpi)
        .with_tolerance(args.tolerance)
        .with_padding(args.padding)
        .with_upscale_factor(args.upscale)
        .with_channel_order(channel_order_choice_to_channel_order(&args.channel_order))
        .with_color_policy(ColorPolicy::default().with_reference_tolerance(args.color_tolerance))
        .with_ocr(OcrConfig {
            language: args.lang.clone(),
            tessdata_dir: args.tessdata.clone(),
            ..OcrConfig::default()
        });
    if let Some(model) = &args.superres_model {
        config = config.with_superres_model(model.clone());
    }

    println!("Processing {} ({})", args.pdf.display(), mode.description());
    let extraction = extract_file(&args.pdf, &config)?;
    let stats = extraction.stats;
    if stats.skipped_pages > 0 {
        println!("Skipped {} unreadable page(s)", stats.skipped_pages);
    }

    let ocr_used = config.needs_ocr();
    print_summary(&extraction.results, ocr_used);

    if args.no_json || extraction.results.is_empty() {
        return Ok(());
    }
    let dpi = ocr_used.then_some(config.dpi);
    let report = Report::new(&extraction.results, mode.description(), dpi);
    report.save_json(&args.output)?;
    println!("JSON output saved to {}", args.output.display());
    Ok(())
}

fn mode_choice_to_mode(choice: &ModeChoice) -> Mode {
    match choice {
        ModeChoice::Geometric => Mode::Geometric,
        ModeChoice::Ocr => Mode::Ocr,
        ModeChoice::Full => Mode::Full,
        ModeChoice::Area => Mode::Area,
        ModeChoice::Annotation => Mode::Annotation,
    }
}

fn channel_order_choice_to_channel_order(choice: &ChannelOrderChoice) -> ChannelOrder {
    match choice {
        ChannelOrderChoice::Rgb => ChannelOrder::Rgb,
        ChannelOrderChoice::Bgr => ChannelOrder::Bgr,
    }
}
