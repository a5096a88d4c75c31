pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::gpu::{
    BindingKind, BufferPool, CommandStream, ComputeKernel, Event, GpuBuffer, GpuContext,
    KernelSpec,
};
pub use crate::harness::{run_sample, RunReport, Sample};
pub use crate::telemetry::{KernelMetrics, MetricsSnapshot};
pub use crate::util::Timer;
