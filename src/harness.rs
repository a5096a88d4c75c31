//! Shared sample lifecycle.
//!
//! Every sample follows the same template: timed setup, warmup, a timed
//! iteration loop, optional verification against a CPU reference, and a
//! statistics table. The first error anywhere aborts the run.

use crate::config::Config;
use crate::error::Result;
use crate::gpu::GpuContext;
use crate::telemetry::export::{JsonExporter, ReportExporter, SampleReport};
use crate::telemetry::metrics::MetricsSnapshot;
use crate::telemetry::KernelMetrics;
use crate::util::Timer;
use std::sync::Arc;
use std::time::Instant;

/// Untimed iterations executed before the measured loop when more than
/// one iteration was requested.
pub const WARMUP_ITERATIONS: usize = 2;

/// One benchmark/demonstration program.
pub trait Sample {
    /// Short sample name used in reports.
    fn name(&self) -> &str;

    /// Allocate device resources and upload initial data.
    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()>;

    /// Run one measured iteration of the sample's kernel work.
    fn execute(&mut self) -> Result<()>;

    /// Clear timing state accumulated by previous `execute` calls.
    ///
    /// Called once after warmup; samples that keep their own timers
    /// reset them here. The default does nothing.
    fn reset_timers(&mut self) {}

    /// Compare device output against the CPU reference.
    fn verify(&mut self) -> Result<()>;

    /// Statistics columns for the timing table.
    fn stat_columns(&self, report: &RunReport) -> Vec<(String, String)>;
}

/// Measurements from one sample run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub setup_secs: f64,
    pub iterations: usize,
    pub total_kernel_secs: f64,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    /// Kernel time averaged over the measured iterations.
    pub fn avg_kernel_secs(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.total_kernel_secs / self.iterations as f64
    }
}

/// Drive a sample through setup, warmup, the measured loop, verification,
/// and reporting.
pub fn run_sample<S: Sample>(sample: &mut S, config: &Config) -> Result<RunReport> {
    let ctx = match config.device {
        Some(_) => Arc::new(GpuContext::new_blocking(config.device)?),
        None => GpuContext::get_or_init_blocking()?,
    };

    if !config.quiet {
        log::info!("{}: running on '{}'", sample.name(), ctx.device_name());
    }

    let mut setup_timer = Timer::new();
    setup_timer.start();
    sample.setup(&ctx, config)?;
    setup_timer.stop();

    if config.iterations > 1 {
        for _ in 0..WARMUP_ITERATIONS {
            sample.execute()?;
        }
        sample.reset_timers();
    }

    let metrics = KernelMetrics::new();
    let mut run_timer = Timer::new();
    run_timer.start();
    for _ in 0..config.iterations {
        let started = Instant::now();
        sample.execute()?;
        metrics.record_dispatch(started.elapsed().as_nanos() as u64);
    }
    run_timer.stop();

    let report = RunReport {
        setup_secs: setup_timer.elapsed_secs(),
        iterations: config.iterations,
        total_kernel_secs: run_timer.elapsed_secs(),
        metrics: metrics.snapshot(),
    };

    if config.verify {
        match sample.verify() {
            Ok(()) => {
                if !config.quiet {
                    println!("Passed!");
                }
            }
            Err(e) => {
                metrics.record_verify_failure();
                if !config.quiet {
                    println!("Failed!");
                }
                return Err(e);
            }
        }
    }

    if config.timing && !config.quiet {
        print_stats(&sample.stat_columns(&report));
    }

    if let Some(path) = &config.dump_stats {
        let exporter = JsonExporter::new(path);
        exporter.export(&SampleReport::new(
            sample.name(),
            report.setup_secs,
            report.iterations,
            report.total_kernel_secs,
            &report.metrics,
            sample.stat_columns(&report),
        ))?;
    }

    Ok(report)
}

/// Print the header/value table with columns padded to fit.
pub fn print_stats(columns: &[(String, String)]) {
    let (header, values) = format_stats(columns);
    println!("{}", header);
    println!("{}", values);
}

fn format_stats(columns: &[(String, String)]) -> (String, String) {
    let mut header = String::new();
    let mut values = String::new();

    for (name, value) in columns {
        let width = name.len().max(value.len()) + 2;
        header.push_str(&format!("{:<width$}", name, width = width));
        values.push_str(&format!("{:<width$}", value, width = width));
    }

    (header, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats_alignment() {
        let columns = vec![
            ("Elements".to_string(), "1024".to_string()),
            ("Time(s)".to_string(), "0.001234".to_string()),
        ];

        let (header, values) = format_stats(&columns);

        // Column widths match between the two rows
        assert_eq!(header.len(), values.len());
        assert!(header.starts_with("Elements"));
        assert!(values.contains("0.001234"));
        // Value wider than header widens the column
        assert_eq!(header.len(), (8 + 2) + (8 + 2));
    }

    #[test]
    fn test_avg_kernel_secs() {
        let report = RunReport {
            setup_secs: 0.5,
            iterations: 4,
            total_kernel_secs: 2.0,
            metrics: MetricsSnapshot::default(),
        };
        assert!((report.avg_kernel_secs() - 0.5).abs() < 1e-12);
    }
}
