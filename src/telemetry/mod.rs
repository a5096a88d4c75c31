//! Metrics collection and export for sample runs.

pub mod export;
pub mod metrics;

pub use export::{ConsoleExporter, JsonExporter, ReportExporter, SampleReport};
pub use metrics::{KernelMetrics, MetricsSnapshot};
