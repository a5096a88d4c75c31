//! Tiled single-precision matrix multiply.
//!
//! Square matrices only. Each workgroup stages a 16x16 tile of both
//! operands in workgroup memory and accumulates across the shared
//! dimension, with edge tiles padded by zeroes.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpu::{BindingKind, CommandStream, ComputeKernel, GpuBuffer, GpuContext, KernelSpec};
use crate::harness::{RunReport, Sample};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

/// Tile edge length; the kernel uses a 16x16 workgroup.
pub const TILE: u32 = 16;

/// Largest accepted matrix dimension. Keeps the three operand buffers
/// within a modest device allocation.
const MAX_DIM: usize = 4096;

const MATMUL_SRC: &str = r#"
struct Params {
    m: u32,
    n: u32,
    k: u32,
    _pad: u32,
}

@group(0) @binding(0) var<storage, read> a: array<f32>;
@group(0) @binding(1) var<storage, read> b: array<f32>;
@group(0) @binding(2) var<storage, read_write> c: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

const TILE: u32 = 16u;
var<workgroup> tile_a: array<f32, 256>;
var<workgroup> tile_b: array<f32, 256>;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>,
        @builtin(local_invocation_id) lid: vec3<u32>) {
    let row = gid.y;
    let col = gid.x;
    var acc = 0.0;

    let tiles = (params.k + TILE - 1u) / TILE;
    for (var t = 0u; t < tiles; t = t + 1u) {
        let a_col = t * TILE + lid.x;
        let b_row = t * TILE + lid.y;
        if (row < params.m && a_col < params.k) {
            tile_a[lid.y * TILE + lid.x] = a[row * params.k + a_col];
        } else {
            tile_a[lid.y * TILE + lid.x] = 0.0;
        }
        if (b_row < params.k && col < params.n) {
            tile_b[lid.y * TILE + lid.x] = b[b_row * params.n + col];
        } else {
            tile_b[lid.y * TILE + lid.x] = 0.0;
        }
        workgroupBarrier();

        for (var i = 0u; i < TILE; i = i + 1u) {
            acc = acc + tile_a[lid.y * TILE + i] * tile_b[i * TILE + lid.x];
        }
        workgroupBarrier();
    }

    if (row < params.m && col < params.n) {
        c[row * params.n + col] = acc;
    }
}
"#;

/// Host reference: row-major `a (m x k)` times `b (k x n)`.
pub fn cpu_matrix_mul(a: &[f32], b: &[f32], m: usize, n: usize, k: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for row in 0..m {
        for col in 0..n {
            let mut acc = 0.0f64;
            for i in 0..k {
                acc += a[row * k + i] as f64 * b[i * n + col] as f64;
            }
            c[row * n + col] = acc as f32;
        }
    }
    c
}

struct DeviceState {
    stream: CommandStream,
    kernel: ComputeKernel,
    a: GpuBuffer,
    b: GpuBuffer,
    c: GpuBuffer,
    params: GpuBuffer,
    bind_group: wgpu::BindGroup,
    extent: (u32, u32, u32),
}

/// Matrix multiply sample.
#[derive(Default)]
pub struct MatrixMulSample {
    dim: usize,
    a: Vec<f32>,
    b: Vec<f32>,
    runs: usize,
    state: Option<DeviceState>,
}

impl std::fmt::Debug for MatrixMulSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixMulSample")
            .field("dim", &self.dim)
            .finish()
    }
}

impl MatrixMulSample {
    /// Create an unconfigured sample; `setup` generates the operands
    /// and device resources. The configured size is the matrix edge
    /// length.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<&DeviceState> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))
    }
}

impl Sample for MatrixMulSample {
    fn name(&self) -> &str {
        "MatrixMul"
    }

    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()> {
        if config.size > MAX_DIM {
            return Err(Error::config(format!(
                "matrix dimension {} too large (max {})",
                config.size, MAX_DIM
            )));
        }
        self.dim = config.size;
        let dim = self.dim;

        let mut rng = Pcg64Mcg::seed_from_u64(config.seed);
        self.a = (0..dim * dim).map(|_| rng.gen::<f32>()).collect();
        self.b = (0..dim * dim).map(|_| rng.gen::<f32>()).collect();

        let stream = CommandStream::new(ctx, "matrix-mul");
        let kernel = ComputeKernel::compile(
            ctx.device(),
            &KernelSpec {
                label: "matrix-mul",
                source: MATMUL_SRC,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        let bytes = dim * dim * 4;
        let a = GpuBuffer::new(ctx.shared_device(), bytes);
        a.write(ctx.queue(), bytemuck::cast_slice(&self.a))?;
        let b = GpuBuffer::new(ctx.shared_device(), bytes);
        b.write(ctx.queue(), bytemuck::cast_slice(&self.b))?;
        let c = GpuBuffer::new(ctx.shared_device(), bytes);

        let params = GpuBuffer::uniform(ctx.shared_device(), 16);
        let d = dim as u32;
        params.write(ctx.queue(), bytemuck::cast_slice(&[d, d, d, 0]))?;

        let bind_group = kernel.bind(ctx.device(), &[&a, &b, &c, &params])?;
        let groups = d.div_ceil(TILE);

        self.state = Some(DeviceState {
            stream,
            kernel,
            a,
            b,
            c,
            params,
            bind_group,
            extent: (groups, groups, 1),
        });
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let st = self.state()?;
        let mut encoder = st.stream.encoder();
        st.kernel.encode(&mut encoder, &st.bind_group, st.extent);
        let event = st.stream.submit(encoder);
        st.stream.wait(&event);
        self.runs += 1;
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        if self.runs == 0 {
            return Err(Error::verification("no dispatch executed"));
        }
        let st = self.state()?;
        let got: Vec<f32> = bytemuck::cast_slice(&st.c.read(&st.stream)?).to_vec();
        let expected = cpu_matrix_mul(&self.a, &self.b, self.dim, self.dim, self.dim);

        for (i, (&g, &e)) in got.iter().zip(expected.iter()).enumerate() {
            let tolerance = 1e-3f32 * e.abs().max(1.0);
            if (g - e).abs() > tolerance {
                return Err(Error::verification(format!(
                    "element ({}, {}): device {} vs host {}",
                    i / self.dim,
                    i % self.dim,
                    g,
                    e
                )));
            }
        }
        Ok(())
    }

    fn stat_columns(&self, report: &RunReport) -> Vec<(String, String)> {
        let avg = report.avg_kernel_secs();
        let flops = 2.0 * (self.dim as f64).powi(3);
        vec![
            (
                "Dimensions".to_string(),
                format!("{}x{}", self.dim, self.dim),
            ),
            (
                "Setup Time (s)".to_string(),
                format!("{:.6}", report.setup_secs),
            ),
            ("Avg. Kernel Time (s)".to_string(), format!("{:.6}", avg)),
            (
                "GFLOPS".to_string(),
                format!("{:.2}", flops / avg.max(1e-12) / 1e9),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_matrix_mul_identity() {
        let dim = 3;
        let mut identity = vec![0.0f32; dim * dim];
        for i in 0..dim {
            identity[i * dim + i] = 1.0;
        }
        let a: Vec<f32> = (0..dim * dim).map(|v| v as f32).collect();
        assert_eq!(cpu_matrix_mul(&a, &identity, dim, dim, dim), a);
        assert_eq!(cpu_matrix_mul(&identity, &a, dim, dim, dim), a);
    }

    #[test]
    fn test_cpu_matrix_mul_known_product() {
        // [1 2; 3 4] * [5 6; 7 8] = [19 22; 43 50]
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![5.0, 6.0, 7.0, 8.0];
        let c = cpu_matrix_mul(&a, &b, 2, 2, 2);
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_rejects_oversized_dimension() {
        let config = Config::builder().size(MAX_DIM + 1).quiet(true).build().unwrap();
        let mut sample = MatrixMulSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Err(Error::Config(_)) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_device_product_matches_host() {
        let config = Config::builder()
            .size(96)
            .verify(true)
            .quiet(true)
            .build()
            .unwrap();
        let mut sample = MatrixMulSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Ok(_) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
