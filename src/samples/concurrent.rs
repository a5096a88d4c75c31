//! Concurrent kernel submission.
//!
//! Dispatches the same hash workload once per kernel, either serialized
//! on a single stream with a wait after each submission, or spread
//! round-robin across the streams with a single wait at the end.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpu::{BindingKind, CommandStream, ComputeKernel, GpuBuffer, GpuContext, KernelSpec};
use crate::harness::{RunReport, Sample};
use crate::samples::dispatch_extent;
use crate::util::Timer;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

/// Hash rounds applied per element. Enough work per invocation that
/// submission overhead does not dominate the measurement.
pub const HASH_ROUNDS: u32 = 64;

const HASH_SRC: &str = r#"
struct Params {
    salt: u32,
    count: u32,
    _p0: u32,
    _p1: u32,
}

@group(0) @binding(0) var<storage, read> input: array<u32>;
@group(0) @binding(1) var<storage, read_write> output: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(workgroup_id) wid: vec3<u32>,
        @builtin(num_workgroups) nwg: vec3<u32>,
        @builtin(local_invocation_index) lid: u32) {
    let i = (wid.y * nwg.x + wid.x) * WORKGROUP_SIZEu + lid;
    if (i < params.count) {
        var v = input[i];
        for (var r = 0u; r < ROUNDSu; r = r + 1u) {
            v = v ^ (v << 13u);
            v = v ^ (v >> 17u);
            v = v ^ (v << 5u);
            v = v * 2654435761u + params.salt;
        }
        output[i] = v;
    }
}
"#;

fn shader_source(workgroup_size: u32) -> String {
    HASH_SRC
        .replace("WORKGROUP_SIZE", &workgroup_size.to_string())
        .replace("ROUNDS", &HASH_ROUNDS.to_string())
}

/// Host reference for one element. Matches the kernel's wrapping u32
/// arithmetic exactly.
pub fn cpu_hash(value: u32, salt: u32, rounds: u32) -> u32 {
    let mut v = value;
    for _ in 0..rounds {
        v ^= v << 13;
        v ^= v >> 17;
        v ^= v << 5;
        v = v.wrapping_mul(2_654_435_761).wrapping_add(salt);
    }
    v
}

struct KernelSlot {
    salt: u32,
    expected: Vec<u32>,
    params: GpuBuffer,
    seq_out: GpuBuffer,
    conc_out: GpuBuffer,
    seq_bind: wgpu::BindGroup,
    conc_bind: wgpu::BindGroup,
}

/// Concurrent kernel sample comparing serialized and overlapped
/// submission of independent dispatches.
#[derive(Default)]
pub struct ConcurrentKernelSample {
    input: Vec<u32>,
    slots: Vec<KernelSlot>,
    streams: Vec<CommandStream>,
    kernel: Option<ComputeKernel>,
    extent: (u32, u32, u32),
    sequential_timer: Timer,
    concurrent_timer: Timer,
    runs: usize,
}

impl std::fmt::Debug for ConcurrentKernelSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentKernelSample")
            .field("kernels", &self.slots.len())
            .field("streams", &self.streams.len())
            .field("elements", &self.input.len())
            .finish()
    }
}

impl ConcurrentKernelSample {
    /// Create an unconfigured sample; `setup` builds the input and
    /// device resources.
    pub fn new() -> Self {
        Self::default()
    }

    fn kernel(&self) -> Result<&ComputeKernel> {
        self.kernel
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))
    }

    fn avg_secs(&self, timer: &Timer) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        timer.elapsed_secs() / self.runs as f64
    }
}

impl Sample for ConcurrentKernelSample {
    fn name(&self) -> &str {
        "ConcurrentKernels"
    }

    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()> {
        let count = config.workgroups * config.workgroup_size;
        self.extent = dispatch_extent(count, config.workgroup_size);

        let source = shader_source(config.workgroup_size);
        let kernel = ComputeKernel::compile(
            ctx.device(),
            &KernelSpec {
                label: "hash",
                source: &source,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        self.streams = (0..config.streams)
            .map(|i| CommandStream::new(ctx, format!("concurrent-{i}")))
            .collect();

        let mut rng = Pcg64Mcg::seed_from_u64(config.seed);
        self.input = (0..count).map(|_| rng.gen()).collect();

        let bytes = count as usize * 4;
        let in_buf = GpuBuffer::new(ctx.shared_device(), bytes);
        in_buf.write(ctx.queue(), bytemuck::cast_slice(&self.input))?;

        let mut slots = Vec::with_capacity(config.kernels);
        for k in 0..config.kernels {
            let salt = 0x9E37_79B9u32.wrapping_mul(k as u32 + 1);
            let expected: Vec<u32> = self
                .input
                .iter()
                .map(|&v| cpu_hash(v, salt, HASH_ROUNDS))
                .collect();

            let params = GpuBuffer::uniform(ctx.shared_device(), 16);
            params.write(ctx.queue(), bytemuck::cast_slice(&[salt, count, 0, 0]))?;
            let seq_out = GpuBuffer::new(ctx.shared_device(), bytes);
            let conc_out = GpuBuffer::new(ctx.shared_device(), bytes);
            let seq_bind = kernel.bind(ctx.device(), &[&in_buf, &seq_out, &params])?;
            let conc_bind = kernel.bind(ctx.device(), &[&in_buf, &conc_out, &params])?;

            slots.push(KernelSlot {
                salt,
                expected,
                params,
                seq_out,
                conc_out,
                seq_bind,
                conc_bind,
            });
        }

        // Input buffer stays bound through the groups above; dropping
        // the handle here is fine.
        self.slots = slots;
        self.kernel = Some(kernel);
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let kernel = self
            .kernel
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))?;

        // Serialized: one stream, wait after every dispatch.
        self.sequential_timer.start();
        let stream = &self.streams[0];
        for slot in &self.slots {
            let mut encoder = stream.encoder();
            kernel.encode(&mut encoder, &slot.seq_bind, self.extent);
            let event = stream.submit(encoder);
            stream.wait(&event);
        }
        self.sequential_timer.stop();

        // Overlapped: round-robin across streams, wait once at the end.
        self.concurrent_timer.start();
        let mut last = None;
        for (k, slot) in self.slots.iter().enumerate() {
            let stream = &self.streams[k % self.streams.len()];
            let mut encoder = stream.encoder();
            kernel.encode(&mut encoder, &slot.conc_bind, self.extent);
            last = Some((k % self.streams.len(), stream.submit(encoder)));
        }
        if let Some((s, event)) = last {
            self.streams[s].wait(&event);
        }
        self.concurrent_timer.stop();

        self.runs += 1;
        Ok(())
    }

    fn reset_timers(&mut self) {
        self.sequential_timer.reset();
        self.concurrent_timer.reset();
        self.runs = 0;
    }

    fn verify(&mut self) -> Result<()> {
        if self.runs == 0 {
            return Err(Error::verification("no dispatch executed"));
        }
        let stream = &self.streams[0];
        for (k, slot) in self.slots.iter().enumerate() {
            let seq: Vec<u32> = bytemuck::cast_slice(&slot.seq_out.read(stream)?).to_vec();
            if seq != slot.expected {
                return Err(Error::verification(format!(
                    "kernel {k} (salt {:#x}): sequential output mismatch",
                    slot.salt
                )));
            }
            let conc: Vec<u32> = bytemuck::cast_slice(&slot.conc_out.read(stream)?).to_vec();
            if conc != slot.expected {
                return Err(Error::verification(format!(
                    "kernel {k} (salt {:#x}): concurrent output mismatch",
                    slot.salt
                )));
            }
        }
        Ok(())
    }

    fn stat_columns(&self, _report: &RunReport) -> Vec<(String, String)> {
        let sequential = self.avg_secs(&self.sequential_timer);
        let concurrent = self.avg_secs(&self.concurrent_timer);
        vec![
            ("Kernels".to_string(), self.slots.len().to_string()),
            ("Streams".to_string(), self.streams.len().to_string()),
            (
                "Sequential Time (s)".to_string(),
                format!("{:.6}", sequential),
            ),
            (
                "Concurrent Time (s)".to_string(),
                format!("{:.6}", concurrent),
            ),
            (
                "Speedup".to_string(),
                format!("{:.2}x", sequential / concurrent.max(1e-12)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_hash_deterministic() {
        assert_eq!(cpu_hash(1, 7, 64), cpu_hash(1, 7, 64));
        assert_ne!(cpu_hash(1, 7, 64), cpu_hash(2, 7, 64));
        assert_ne!(cpu_hash(1, 7, 64), cpu_hash(1, 8, 64));
    }

    #[test]
    fn test_cpu_hash_zero_rounds_is_identity() {
        assert_eq!(cpu_hash(0xDEAD_BEEF, 42, 0), 0xDEAD_BEEF);
    }

    #[test]
    fn test_shader_source_substitution() {
        let source = shader_source(256);
        assert!(source.contains("@workgroup_size(256)"));
        assert!(source.contains("r < 64u"));
        assert!(!source.contains("ROUNDS"));
    }

    #[test]
    fn test_both_orders_match_reference() {
        let config = Config::builder()
            .workgroups(8)
            .kernels(3)
            .streams(2)
            .verify(true)
            .quiet(true)
            .build()
            .unwrap();
        let mut sample = ConcurrentKernelSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Ok(_) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
