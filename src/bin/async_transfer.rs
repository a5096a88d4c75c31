//! CLI entry for the transfer overlap sample.

use clap::Parser;
use helios_rs::cli::CommonArgs;
use helios_rs::samples::TransferSample;
use helios_rs::{run_sample, Config, Result};

#[derive(Debug, Parser)]
#[command(
    name = "async_transfer",
    about = "Synchronous vs. pipelined upload/dispatch/readback",
    version
)]
struct Args {
    /// Elements per kernel
    #[arg(short = 'x', long, default_value_t = 1 << 20)]
    size: usize,

    /// Number of independent kernels
    #[arg(short = 'k', long, default_value_t = 4)]
    kernels: usize,

    /// Submission streams for the pipelined strategy
    #[arg(short = 'u', long = "queues", default_value_t = 2)]
    streams: usize,

    /// Workgroup size
    #[arg(short = 'l', long = "localsize", default_value_t = 256)]
    workgroup_size: u32,

    #[command(flatten)]
    common: CommonArgs,
}

fn run(args: &Args) -> Result<()> {
    let builder = Config::builder()
        .size(args.size)
        .kernels(args.kernels)
        .streams(args.streams)
        .workgroup_size(args.workgroup_size);
    let config = args.common.apply(builder).build()?;

    let mut sample = TransferSample::new();
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
