//! CLI entry for the sepia/mirror image filter sample.

use clap::Parser;
use helios_rs::cli::CommonArgs;
use helios_rs::samples::ImageFilterSample;
use helios_rs::{run_sample, Config, Result};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "image_filter",
    about = "Sepia tone with horizontal mirroring",
    version
)]
struct Args {
    /// Input PNG (seeded synthetic image when omitted)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Write the filtered image to a PNG
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

fn run(args: &Args) -> Result<()> {
    let mut builder = Config::builder();
    if let Some(path) = &args.input {
        builder = builder.image_input(path);
    }
    if let Some(path) = &args.output {
        builder = builder.image_output(path);
    }
    let config = args.common.apply(builder).build()?;

    let mut sample = ImageFilterSample::new();
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
