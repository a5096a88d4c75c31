//! Device-assisted search over a sorted array.
//!
//! The device narrows the candidate range instead of walking it: each
//! invocation owns one segment of the current range and flags the
//! segment whose endpoints bracket the key. Narrowing repeats until the
//! range fits in a single workgroup, then the host scans the remainder.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpu::{BindingKind, CommandStream, ComputeKernel, GpuBuffer, GpuContext, KernelSpec};
use crate::harness::{RunReport, Sample};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::sync::Arc;

const SEARCH_SRC: &str = r#"
struct Params {
    key: u32,
    lower: u32,
    seg_len: u32,
    _pad: u32,
}

@group(0) @binding(0) var<storage, read> data: array<u32>;
@group(0) @binding(1) var<storage, read_write> result: array<u32, 4>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(local_invocation_index) lid: u32) {
    let lo = params.lower + lid * params.seg_len;
    let hi = lo + params.seg_len - 1u;
    if (data[lo] <= params.key && params.key <= data[hi]) {
        result[0] = lo;
        result[1] = hi;
        result[3] = 1u;
    }
}
"#;

fn shader_source(workgroup_size: u32) -> String {
    SEARCH_SRC.replace("WORKGROUP_SIZE", &workgroup_size.to_string())
}

/// Sorted input of `n` elements built from cumulative random increments.
/// Zero increments produce duplicate runs, which the search must handle.
pub fn generate_sorted_input(n: usize, seed: u64) -> Vec<u32> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n);
    let mut current: u32 = rng.gen_range(0..10);
    for _ in 0..n {
        values.push(current);
        current += rng.gen_range(0..10);
    }
    values
}

/// Host reference: index of the first element equal to `key`, if any.
pub fn cpu_binary_search(data: &[u32], key: u32) -> Option<usize> {
    let mut lo = 0usize;
    let mut hi = data.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if data[mid] < key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo < data.len() && data[lo] == key {
        Some(lo)
    } else {
        None
    }
}

struct DeviceState {
    stream: CommandStream,
    kernel: ComputeKernel,
    data: GpuBuffer,
    result: GpuBuffer,
    params: GpuBuffer,
    bind_group: wgpu::BindGroup,
}

/// N-ary search sample. See the module docs for the narrowing scheme.
#[derive(Default)]
pub struct BinarySearchSample {
    input: Vec<u32>,
    key: u32,
    subdivisions: u32,
    found: Option<usize>,
    searched: bool,
    state: Option<DeviceState>,
}

impl std::fmt::Debug for BinarySearchSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinarySearchSample")
            .field("elements", &self.input.len())
            .field("key", &self.key)
            .finish()
    }
}

impl BinarySearchSample {
    /// Create an unconfigured sample; `setup` builds the input and
    /// device resources.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<&DeviceState> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))
    }
}

impl Sample for BinarySearchSample {
    fn name(&self) -> &str {
        "BinarySearch"
    }

    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()> {
        self.subdivisions = config.workgroup_size;

        // Segment lengths stay integral when the element count is a
        // power of two, matching the subdivision count.
        let n = config.size.next_power_of_two();
        if n != config.size {
            log::debug!("BinarySearch: padding {} elements to {}", config.size, n);
        }

        self.input = generate_sorted_input(n, config.seed);
        self.key = match config.key {
            Some(key) => key,
            None => {
                let mut rng = Pcg64Mcg::seed_from_u64(config.seed ^ 0x5EED);
                rng.gen_range(0..=*self.input.last().unwrap_or(&0))
            }
        };

        let stream = CommandStream::new(ctx, "binary-search");
        let source = shader_source(self.subdivisions);
        let kernel = ComputeKernel::compile(
            ctx.device(),
            &KernelSpec {
                label: "binary-search",
                source: &source,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        let data = GpuBuffer::new(ctx.shared_device(), n * 4);
        data.write(ctx.queue(), bytemuck::cast_slice(&self.input))?;
        let result = GpuBuffer::new(ctx.shared_device(), 16);
        let params = GpuBuffer::uniform(ctx.shared_device(), 16);

        let bind_group = kernel.bind(ctx.device(), &[&data, &result, &params])?;

        self.state = Some(DeviceState {
            stream,
            kernel,
            data,
            result,
            params,
            bind_group,
        });
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let st = self
            .state
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))?;
        let n = self.input.len();
        let key = self.key;
        self.searched = true;

        // Keys outside the value range cannot be present.
        if key < self.input[0] || key > self.input[n - 1] {
            self.found = None;
            return Ok(());
        }

        let mut lower = 0usize;
        let mut remaining = n;
        while remaining > self.subdivisions as usize {
            let seg_len = remaining / self.subdivisions as usize;
            let params = [key, lower as u32, seg_len as u32, 0u32];
            st.params
                .write(st.stream.queue(), bytemuck::cast_slice(&params))?;
            st.result
                .write(st.stream.queue(), bytemuck::cast_slice(&[0u32; 4]))?;

            let mut encoder = st.stream.encoder();
            st.kernel.encode(&mut encoder, &st.bind_group, (1, 1, 1));
            let event = st.stream.submit(encoder);
            st.stream.wait(&event);

            let quad: Vec<u32> = bytemuck::cast_slice(&st.result.read(&st.stream)?).to_vec();
            if quad[3] == 0 {
                // No segment brackets the key, so it is absent.
                self.found = None;
                return Ok(());
            }
            lower = quad[0] as usize;
            remaining = seg_len;
        }

        self.found = self.input[lower..lower + remaining]
            .iter()
            .position(|&v| v == key)
            .map(|offset| lower + offset);
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        if !self.searched {
            return Err(Error::verification("no search executed"));
        }
        let expected = cpu_binary_search(&self.input, self.key);
        match (self.found, expected) {
            (None, None) => Ok(()),
            // Duplicates allow the device to land on a different index
            // than the host, as long as the value matches.
            (Some(idx), Some(_)) if self.input[idx] == self.key => Ok(()),
            (got, want) => Err(Error::verification(format!(
                "key {}: device found {:?}, host found {:?}",
                self.key, got, want
            ))),
        }
    }

    fn stat_columns(&self, report: &RunReport) -> Vec<(String, String)> {
        let avg = report.avg_kernel_secs();
        vec![
            ("Elements".to_string(), self.input.len().to_string()),
            (
                "Setup Time (s)".to_string(),
                format!("{:.6}", report.setup_secs),
            ),
            ("Avg. Kernel Time (s)".to_string(), format!("{:.6}", avg)),
            (
                "Elements/s".to_string(),
                format!("{:.3e}", self.input.len() as f64 / avg.max(1e-12)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_input_is_sorted_and_deterministic() {
        let a = generate_sorted_input(1024, 7);
        let b = generate_sorted_input(1024, 7);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_cpu_search_finds_present_keys() {
        let data = vec![1, 3, 3, 3, 7, 9, 12, 40];
        assert_eq!(cpu_binary_search(&data, 1), Some(0));
        assert_eq!(cpu_binary_search(&data, 40), Some(7));
        // First of a duplicate run
        assert_eq!(cpu_binary_search(&data, 3), Some(1));
    }

    #[test]
    fn test_cpu_search_rejects_absent_keys() {
        let data = vec![1, 3, 7, 9];
        assert_eq!(cpu_binary_search(&data, 0), None);
        assert_eq!(cpu_binary_search(&data, 5), None);
        assert_eq!(cpu_binary_search(&data, 10), None);
        assert_eq!(cpu_binary_search(&[], 1), None);
    }

    #[test]
    fn test_shader_source_substitution() {
        let source = shader_source(128);
        assert!(source.contains("@workgroup_size(128)"));
        assert!(!source.contains("WORKGROUP_SIZE"));
    }

    #[test]
    fn test_device_search_matches_host() {
        let config = Config::builder()
            .size(1 << 14)
            .verify(true)
            .quiet(true)
            .build()
            .unwrap();
        let mut sample = BinarySearchSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Ok(_) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
