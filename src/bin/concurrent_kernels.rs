//! CLI entry for the concurrent kernels sample.

use clap::Parser;
use helios_rs::cli::CommonArgs;
use helios_rs::samples::ConcurrentKernelSample;
use helios_rs::{run_sample, Config, Result};

#[derive(Debug, Parser)]
#[command(
    name = "concurrent_kernels",
    about = "Sequential vs. multi-stream kernel submission",
    version
)]
struct Args {
    /// Number of independent kernels
    #[arg(short = 'k', long, default_value_t = 8)]
    kernels: usize,

    /// Workgroups per dispatch
    #[arg(short = 'w', long, default_value_t = 64)]
    workgroups: u32,

    /// Workgroup size
    #[arg(short = 'l', long = "localsize", default_value_t = 256)]
    workgroup_size: u32,

    /// Submission streams for the concurrent strategy
    #[arg(short = 'u', long = "queues", default_value_t = 2)]
    streams: usize,

    #[command(flatten)]
    common: CommonArgs,
}

fn run(args: &Args) -> Result<()> {
    let builder = Config::builder()
        .kernels(args.kernels)
        .workgroups(args.workgroups)
        .workgroup_size(args.workgroup_size)
        .streams(args.streams);
    let config = args.common.apply(builder).build()?;

    let mut sample = ConcurrentKernelSample::new();
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
