//! CLI entry for the matrix multiply sample.

use clap::Parser;
use helios_rs::cli::CommonArgs;
use helios_rs::samples::MatrixMulSample;
use helios_rs::{run_sample, Config, Result};

#[derive(Debug, Parser)]
#[command(
    name = "matrix_mul",
    about = "Tiled dense matrix multiplication",
    version
)]
struct Args {
    /// Matrix edge length
    #[arg(short = 'x', long, default_value_t = 512)]
    size: usize,

    #[command(flatten)]
    common: CommonArgs,
}

fn run(args: &Args) -> Result<()> {
    let builder = Config::builder().size(args.size);
    let config = args.common.apply(builder).build()?;

    let mut sample = MatrixMulSample::new();
    run_sample(&mut sample, &config)?;
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
