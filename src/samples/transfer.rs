//! Upload/compute/readback overlap.
//!
//! Runs the same scale-and-wrap kernel over several independent inputs
//! with two submission strategies. The synchronous strategy waits after
//! every upload, dispatch, and readback; the pipelined strategy stages
//! everything across the streams and waits once at the end.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpu::{
    BindingKind, BufferPool, CommandStream, ComputeKernel, GpuBuffer, GpuContext, KernelSpec,
    ReadbackBuffer,
};
use crate::harness::{RunReport, Sample};
use crate::samples::dispatch_extent;
use crate::util::Timer;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

const TRANSFER_SRC: &str = r#"
struct Params {
    factor: u32,
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
        output[i] = (input[i] * params.factor) % 256u;
    }
}
"#;

fn shader_source(workgroup_size: u32) -> String {
    TRANSFER_SRC.replace("WORKGROUP_SIZE", &workgroup_size.to_string())
}

/// Host reference for one kernel's output.
pub fn cpu_transfer(input: &[u32], factor: u32) -> Vec<u32> {
    input.iter().map(|&v| (v * factor) % 256).collect()
}

struct KernelSlot {
    input: Vec<u32>,
    expected: Vec<u32>,
    in_buf: GpuBuffer,
    out_buf: GpuBuffer,
    params: GpuBuffer,
    bind_group: wgpu::BindGroup,
    readback: ReadbackBuffer,
}

/// Transfer overlap sample comparing synchronous and pipelined
/// submission over the same kernel workload.
#[derive(Default)]
pub struct TransferSample {
    slots: Vec<KernelSlot>,
    streams: Vec<CommandStream>,
    pool: Option<BufferPool>,
    kernel: Option<ComputeKernel>,
    extent: (u32, u32, u32),
    sync_timer: Timer,
    pipelined_timer: Timer,
    runs: usize,
    sync_outputs: Vec<Vec<u32>>,
    pipelined_outputs: Vec<Vec<u32>>,
}

impl std::fmt::Debug for TransferSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSample")
            .field("kernels", &self.slots.len())
            .field("streams", &self.streams.len())
            .finish()
    }
}

impl TransferSample {
    /// Create an unconfigured sample; `setup` builds the inputs and
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

impl Sample for TransferSample {
    fn name(&self) -> &str {
        "AsyncTransfer"
    }

    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()> {
        let count = config.size as u32;
        self.extent = dispatch_extent(count, config.workgroup_size);

        let source = shader_source(config.workgroup_size);
        let kernel = ComputeKernel::compile(
            ctx.device(),
            &KernelSpec {
                label: "transfer",
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
            .map(|i| CommandStream::new(ctx, format!("transfer-{i}")))
            .collect();

        // Storage buffers come from the pool; a repeated setup hands the
        // previous slots' buffers straight back out.
        let pool = self
            .pool
            .get_or_insert_with(|| BufferPool::new(ctx.shared_device()));
        for slot in self.slots.drain(..) {
            pool.release(slot.in_buf);
            pool.release(slot.out_buf);
        }

        let mut rng = Pcg64Mcg::seed_from_u64(config.seed);
        let bytes = config.size * 4;
        let mut slots = Vec::with_capacity(config.kernels);
        for k in 0..config.kernels {
            let factor = k as u32 + 1;
            let input: Vec<u32> = (0..config.size).map(|_| rng.gen_range(0..256)).collect();
            let expected = cpu_transfer(&input, factor);

            let in_buf = pool.acquire(bytes);
            let out_buf = pool.acquire(bytes);
            let params = GpuBuffer::uniform(ctx.shared_device(), 16);
            params.write(ctx.queue(), bytemuck::cast_slice(&[factor, count, 0, 0]))?;
            let bind_group = kernel.bind(ctx.device(), &[&in_buf, &out_buf, &params])?;
            let readback = ReadbackBuffer::new(ctx.shared_device(), bytes);

            slots.push(KernelSlot {
                input,
                expected,
                in_buf,
                out_buf,
                params,
                bind_group,
                readback,
            });
        }

        self.slots = slots;
        self.kernel = Some(kernel);
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let kernel = self
            .kernel
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))?;

        // Synchronous strategy: every step waits before the next starts.
        self.sync_timer.start();
        let stream = &self.streams[0];
        let mut sync_outputs = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            slot.in_buf
                .write(stream.queue(), bytemuck::cast_slice(&slot.input))?;
            let upload = stream.flush();
            stream.wait(&upload);

            let mut encoder = stream.encoder();
            kernel.encode(&mut encoder, &slot.bind_group, self.extent);
            let dispatch = stream.submit(encoder);
            stream.wait(&dispatch);

            let data = slot.out_buf.read(stream)?;
            sync_outputs.push(bytemuck::cast_slice(&data).to_vec());
        }
        self.sync_timer.stop();

        // Pipelined strategy: stage everything, wait once on the last
        // submission, then map the results.
        self.pipelined_timer.start();
        let mut last = None;
        for (k, slot) in self.slots.iter().enumerate() {
            let stream = &self.streams[k % self.streams.len()];
            slot.in_buf
                .write(stream.queue(), bytemuck::cast_slice(&slot.input))?;
            let mut encoder = stream.encoder();
            kernel.encode(&mut encoder, &slot.bind_group, self.extent);
            slot.readback.encode_copy(&mut encoder, &slot.out_buf);
            last = Some((k % self.streams.len(), stream.submit(encoder)));
        }
        if let Some((s, event)) = last {
            self.streams[s].wait(&event);
        }
        let mut pipelined_outputs = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let data = slot.readback.resolve()?;
            pipelined_outputs.push(bytemuck::cast_slice(&data).to_vec());
        }
        self.pipelined_timer.stop();

        self.sync_outputs = sync_outputs;
        self.pipelined_outputs = pipelined_outputs;
        self.runs += 1;
        Ok(())
    }

    fn reset_timers(&mut self) {
        self.sync_timer.reset();
        self.pipelined_timer.reset();
        self.runs = 0;
    }

    fn verify(&mut self) -> Result<()> {
        if self.sync_outputs.len() != self.slots.len()
            || self.pipelined_outputs.len() != self.slots.len()
        {
            return Err(Error::verification("no transfer executed"));
        }
        for (k, slot) in self.slots.iter().enumerate() {
            if self.sync_outputs[k] != slot.expected {
                return Err(Error::verification(format!(
                    "kernel {k}: synchronous output mismatch"
                )));
            }
            if self.pipelined_outputs[k] != slot.expected {
                return Err(Error::verification(format!(
                    "kernel {k}: pipelined output mismatch"
                )));
            }
        }
        Ok(())
    }

    fn stat_columns(&self, _report: &RunReport) -> Vec<(String, String)> {
        let sync = self.avg_secs(&self.sync_timer);
        let pipelined = self.avg_secs(&self.pipelined_timer);
        vec![
            (
                "Size".to_string(),
                self.slots.first().map_or(0, |s| s.input.len()).to_string(),
            ),
            ("Kernels".to_string(), self.slots.len().to_string()),
            ("Sync Time (s)".to_string(), format!("{:.6}", sync)),
            (
                "Pipelined Time (s)".to_string(),
                format!("{:.6}", pipelined),
            ),
            (
                "Speedup".to_string(),
                format!("{:.2}x", sync / pipelined.max(1e-12)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_transfer_wraps_at_256() {
        let input = vec![0, 1, 2, 255];
        assert_eq!(cpu_transfer(&input, 1), vec![0, 1, 2, 255]);
        assert_eq!(cpu_transfer(&input, 2), vec![0, 2, 4, 254]);
        assert_eq!(cpu_transfer(&input, 256), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_shader_source_substitution() {
        let source = shader_source(64);
        assert!(source.contains("@workgroup_size(64)"));
        assert!(source.contains("* 64u + lid"));
        assert!(!source.contains("WORKGROUP_SIZE"));
    }

    #[test]
    fn test_both_strategies_match_reference() {
        let config = Config::builder()
            .size(1 << 12)
            .kernels(3)
            .streams(2)
            .verify(true)
            .quiet(true)
            .build()
            .unwrap();
        let mut sample = TransferSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Ok(_) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
