//! CLI entry for the binary search sample.

use clap::Parser;
use helios_rs::cli::CommonArgs;
use helios_rs::samples::BinarySearchSample;
use helios_rs::{run_sample, Config, Result};

#[derive(Debug, Parser)]
#[command(
    name = "binary_search",
    about = "Device-assisted N-ary search over a sorted array",
    version
)]
struct Args {
    /// Number of input elements (rounded up to a power of two)
    #[arg(short = 'x', long, default_value_t = 1 << 20)]
    size: usize,

    /// Search subdivisions per narrowing step (workgroup size)
    #[arg(short = 'l', long = "localsize", default_value_t = 256)]
    workgroup_size: u32,

    /// Key to search for (random when omitted)
    #[arg(short = 'k', long)]
    key: Option<u32>,

    #[command(flatten)]
    common: CommonArgs,
}

fn run(args: &Args) -> Result<()> {
    let mut builder = Config::builder()
        .size(args.size)
        .workgroup_size(args.workgroup_size);
    if let Some(key) = args.key {
        builder = builder.key(key);
    }
    let config = args.common.apply(builder).build()?;

    let mut sample = BinarySearchSample::new();
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
