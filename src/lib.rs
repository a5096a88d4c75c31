//! HELIOS - Host-side Enqueue, Launch and I/O Samples
//!
//! A suite of GPU compute demonstration and benchmark programs built on
//! [wgpu](https://github.com/gfx-rs/wgpu), together with the shared
//! host-side machinery they exercise: device and queue acquisition,
//! storage/uniform buffer management with pooled reuse, compute kernel
//! compilation and dispatch, submission streams with completion events,
//! and a sample lifecycle harness with timing statistics and CPU
//! reference verification.
//!
//! # Quick Start
//!
//! ```no_run
//! use helios_rs::prelude::*;
//! use helios_rs::samples::BinarySearchSample;
//!
//! let config = Config::builder()
//!     .size(1 << 20)
//!     .iterations(10)
//!     .verify(true)
//!     .timing(true)
//!     .build()
//!     .unwrap();
//!
//! let mut sample = BinarySearchSample::new();
//! let report = helios_rs::harness::run_sample(&mut sample, &config).unwrap();
//! println!("avg kernel time: {:.6}s", report.avg_kernel_secs());
//! ```
//!
//! # Samples
//!
//! - **binary_search**: N-ary parallel binary search over a sorted array
//! - **async_transfer**: synchronous vs. pipelined write/dispatch/read
//! - **concurrent_kernels**: sequential vs. multi-stream kernel scheduling
//! - **unsharp_mask**: Gaussian unsharp mask, separable and single-pass
//! - **image_filter**: sepia tone plus horizontal mirror
//! - **matrix_mul**: tiled dense matrix multiplication

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]
#![allow(dead_code)] // During development

pub mod cli;
pub mod config;
pub mod error;
pub mod gpu;
pub mod harness;
pub mod prelude;
pub mod samples;
pub mod telemetry;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use gpu::{CommandStream, ComputeKernel, Event, GpuBuffer, GpuContext};
pub use harness::{run_sample, RunReport, Sample};
