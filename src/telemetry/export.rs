//! Export of sample run statistics to various formats.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Trait for exporting a finished sample report
pub trait ReportExporter: Send + Sync {
    /// Export one report
    fn export(&self, report: &SampleReport) -> Result<()>;
}

/// Serializable summary of one sample run
#[derive(Debug, Clone, serde::Serialize)]
pub struct SampleReport {
    pub sample: String,
    pub setup_secs: f64,
    pub iterations: usize,
    pub total_kernel_secs: f64,
    pub avg_kernel_secs: f64,
    pub dispatches: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub avg_latency_us: f64,
    pub p50_latency_us: f64,
    pub p95_latency_us: f64,
    pub p99_latency_us: f64,
    pub max_latency_us: f64,
    pub columns: Vec<(String, String)>,
}

impl SampleReport {
    /// Assemble a report from harness measurements
    pub fn new(
        sample: &str,
        setup_secs: f64,
        iterations: usize,
        total_kernel_secs: f64,
        metrics: &MetricsSnapshot,
        columns: Vec<(String, String)>,
    ) -> Self {
        Self {
            sample: sample.to_string(),
            setup_secs,
            iterations,
            total_kernel_secs,
            avg_kernel_secs: if iterations > 0 {
                total_kernel_secs / iterations as f64
            } else {
                0.0
            },
            dispatches: metrics.dispatches,
            bytes_written: metrics.bytes_written,
            bytes_read: metrics.bytes_read,
            avg_latency_us: metrics.avg_latency_ns as f64 / 1_000.0,
            p50_latency_us: metrics.p50_latency_ns as f64 / 1_000.0,
            p95_latency_us: metrics.p95_latency_ns as f64 / 1_000.0,
            p99_latency_us: metrics.p99_latency_ns as f64 / 1_000.0,
            max_latency_us: metrics.max_latency_ns as f64 / 1_000.0,
            columns,
        }
    }
}

/// Export reports to a JSON file
#[derive(Debug)]
pub struct JsonExporter {
    output_path: PathBuf,
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, report: &SampleReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| Error::Other(format!("JSON serialization failed: {}", e)))?;

        std::fs::write(&self.output_path, json)?;

        Ok(())
    }
}

/// Export reports to stdout
#[derive(Debug)]
pub struct ConsoleExporter {
    verbose: bool,
}

impl ConsoleExporter {
    /// Create a new console exporter
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ReportExporter for ConsoleExporter {
    fn export(&self, report: &SampleReport) -> Result<()> {
        println!("=== {} ===", report.sample);
        println!("Setup: {:.6}s", report.setup_secs);
        println!("Iterations: {}", report.iterations);
        println!("Total kernel time: {:.6}s", report.total_kernel_secs);
        println!("Avg kernel time: {:.6}s", report.avg_kernel_secs);

        if self.verbose {
            println!("\nLatency:");
            println!("  Average: {:.2}μs", report.avg_latency_us);
            println!("  P50: {:.2}μs", report.p50_latency_us);
            println!("  P95: {:.2}μs", report.p95_latency_us);
            println!("  P99: {:.2}μs", report.p99_latency_us);
            println!("  Max: {:.2}μs", report.max_latency_us);

            println!("\nTransfers:");
            println!(
                "  Written: {:.2}MB",
                report.bytes_written as f64 / (1024.0 * 1024.0)
            );
            println!(
                "  Read: {:.2}MB",
                report.bytes_read as f64 / (1024.0 * 1024.0)
            );
        }

        println!("===========================");

        Ok(())
    }
}

impl Default for ConsoleExporter {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_report() -> SampleReport {
        let metrics = MetricsSnapshot {
            uptime: std::time::Duration::from_secs(10),
            dispatches: 100,
            verify_failures: 0,
            bytes_written: 1024 * 1024,
            bytes_read: 2 * 1024 * 1024,
            avg_latency_ns: 1000,
            p50_latency_ns: 900,
            p95_latency_ns: 1500,
            p99_latency_ns: 2000,
            max_latency_ns: 5000,
        };
        SampleReport::new(
            "dummy",
            0.25,
            10,
            1.5,
            &metrics,
            vec![("Elements".to_string(), "1024".to_string())],
        )
    }

    #[test]
    fn test_console_exporter() {
        let exporter = ConsoleExporter::new(true);
        let report = dummy_report();

        // Should not panic
        assert!(exporter.export(&report).is_ok());
    }

    #[test]
    fn test_json_exporter() {
        use std::env::temp_dir;

        let path = temp_dir().join("helios_stats_test.json");
        let exporter = JsonExporter::new(&path);
        let report = dummy_report();

        assert!(exporter.export(&report).is_ok());
        assert!(path.exists());

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"sample\": \"dummy\""));

        // Clean up
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_avg_kernel_secs_derived() {
        let report = dummy_report();
        assert!((report.avg_kernel_secs - 0.15).abs() < 1e-12);
    }
}
