//! GPU device access, buffers, kernels, and submission streams.

pub mod buffer;
pub mod context;
pub mod kernel;
pub mod stream;

pub use buffer::{BufferPool, GpuBuffer, ReadbackBuffer};
pub use context::{AdapterEntry, GpuContext};
pub use kernel::{BindingKind, ComputeKernel, KernelSpec};
pub use stream::{CommandStream, Event};
