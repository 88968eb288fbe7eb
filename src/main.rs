//! PDF Color Inverter CLI
//!
//! Command-line interface for inverting the colors of a PDF.

use clap::{Parser, ValueEnum};
use invert_pdf::{file_ops::invert_pdf_file, InvertMode, InvertOptions, PageRange};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Grayscale,
    TextOnly,
    Custom,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RangeArg {
    All,
    Odd,
    Even,
    Custom,
}

/// Invert the colors of a PDF while keeping it a true PDF
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PDF file path
    #[arg(short, long)]
    input: PathBuf,

    /// Output PDF file path
    #[arg(short, long)]
    output: PathBuf,

    /// Inversion mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::Full)]
    mode: ModeArg,

    /// Pages to process
    #[arg(short, long, value_enum, default_value_t = RangeArg::All)]
    range: RangeArg,

    /// Page selection for --range custom, e.g. "2-5,7" (1-based)
    #[arg(short, long)]
    pages: Option<String>,

    /// Output DPI hint for re-encoded images (150, 300 or 600)
    #[arg(short, long, default_value = "300")]
    dpi: u32,

    /// Re-encode opaque images as JPEG
    #[arg(short, long)]
    compress: bool,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let options = InvertOptions {
        mode: match args.mode {
            ModeArg::Full => InvertMode::Full,
            ModeArg::Grayscale => InvertMode::Grayscale,
            ModeArg::TextOnly => InvertMode::TextOnly,
            ModeArg::Custom => InvertMode::Custom,
        },
        range: match args.range {
            RangeArg::All => PageRange::All,
            RangeArg::Odd => PageRange::Odd,
            RangeArg::Even => PageRange::Even,
            RangeArg::Custom => PageRange::Custom(args.pages.clone().unwrap_or_default()),
        },
        compress_images: args.compress,
        output_dpi: args.dpi,
    };

    println!("PDF Color Inverter");
    println!("==================");

    let stats = invert_pdf_file(&args.input, &args.output, &options)?;

    println!(
        "\nDone! Processed {} pages: {} streams rewritten, {} images inverted, {} skipped",
        stats.pages_processed, stats.streams_rewritten, stats.images_inverted, stats.images_skipped
    );
    println!("Output saved to: {:?}", args.output);

    Ok(())
}
