//! Command-line options shared by the sample binaries.
//!
//! Every binary flattens [`CommonArgs`] into its own parser and adds
//! its sample-specific flags on top.

use crate::config::ConfigBuilder;
use crate::gpu::GpuContext;
use clap::Args;
use std::path::PathBuf;

/// Options every sample binary accepts.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Measured iterations
    #[arg(short, long, default_value_t = 10)]
    pub iterations: usize,

    /// Verify device output against the host reference
    #[arg(short, long)]
    pub verify: bool,

    /// Print the timing table
    #[arg(short, long)]
    pub timing: bool,

    /// Suppress routine output
    #[arg(short, long)]
    pub quiet: bool,

    /// Adapter index (see --list-devices)
    #[arg(short, long)]
    pub device: Option<usize>,

    /// List available adapters and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Seed for deterministic input generation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write run statistics to a JSON file
    #[arg(long, value_name = "PATH")]
    pub dump_stats: Option<PathBuf>,
}

impl CommonArgs {
    /// Fold the shared options into a config builder.
    pub fn apply(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        builder = builder
            .iterations(self.iterations)
            .verify(self.verify)
            .timing(self.timing)
            .quiet(self.quiet)
            .seed(self.seed);
        if let Some(device) = self.device {
            builder = builder.device(device);
        }
        if let Some(path) = &self.dump_stats {
            builder = builder.dump_stats(path);
        }
        builder
    }

    /// Print the adapter table when `--list-devices` is set. Returns
    /// true if the caller should exit without running the sample.
    pub fn handle_list_devices(&self) -> bool {
        if !self.list_devices {
            return false;
        }
        let adapters = GpuContext::adapters();
        if adapters.is_empty() {
            println!("no adapters found");
        }
        for adapter in adapters {
            println!(
                "[{}] {} ({}, {})",
                adapter.index, adapter.name, adapter.backend, adapter.device_type
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.common.iterations, 10);
        assert_eq!(cli.common.seed, 42);
        assert!(!cli.common.verify);
        assert!(!cli.common.list_devices);
        assert!(cli.common.device.is_none());
    }

    #[test]
    fn test_flags_round_trip_into_config() {
        let cli = TestCli::parse_from([
            "test",
            "-i",
            "3",
            "-v",
            "-t",
            "-q",
            "-d",
            "1",
            "--seed",
            "7",
            "--dump-stats",
            "/tmp/stats.json",
        ]);
        let config = cli.common.apply(crate::Config::builder()).build().unwrap();
        assert_eq!(config.iterations, 3);
        assert!(config.verify);
        assert!(config.timing);
        assert!(config.quiet);
        assert_eq!(config.device, Some(1));
        assert_eq!(config.seed, 7);
        assert_eq!(
            config.dump_stats.as_deref().unwrap().to_str(),
            Some("/tmp/stats.json")
        );
    }
}
