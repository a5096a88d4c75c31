//! CLI entry for the unsharp mask sample.

use clap::Parser;
use helios_rs::cli::CommonArgs;
use helios_rs::samples::UnsharpMaskSample;
use helios_rs::{run_sample, Config, Result};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "unsharp_mask",
    about = "Gaussian unsharp mask, separable and single-pass",
    version
)]
struct Args {
    /// Blur radius in pixels
    #[arg(short = 'r', long, default_value_t = 5)]
    radius: u32,

    /// Sharpening strength
    #[arg(short = 'a', long, default_value_t = 0.8)]
    amount: f32,

    /// Minimum channel difference before sharpening applies
    #[arg(long, default_value_t = 1.0)]
    threshold: f32,

    /// Input PNG (seeded synthetic image when omitted)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Write the sharpened image to a PNG
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

fn run(args: &Args) -> Result<()> {
    let mut builder = Config::builder()
        .radius(args.radius)
        .amount(args.amount)
        .threshold(args.threshold);
    if let Some(path) = &args.input {
        builder = builder.image_input(path);
    }
    if let Some(path) = &args.output {
        builder = builder.image_output(path);
    }
    let config = args.common.apply(builder).build()?;

    let mut sample = UnsharpMaskSample::new();
    run_sample(&mut sample, &config)?;

    if let Some(path) = &config.image_output {
        sample.save_output(path)?;
        if !config.quiet {
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if args.common.handle_list_devices() {
        return;
    }
    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
