//! Unsharp mask sharpening, two ways.
//!
//! Both variants blur with the same Gaussian and then push each channel
//! away from its blurred value when the difference clears the
//! threshold. The two-pass variant separates the blur into a horizontal
//! pass writing float intermediates and a vertical pass that also
//! applies the sharpen; the single-pass variant walks the full 2D
//! window per pixel.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpu::{BindingKind, CommandStream, ComputeKernel, GpuBuffer, GpuContext, KernelSpec};
use crate::harness::{RunReport, Sample};
use crate::samples::image_io::{self, RgbaImage};
use crate::util::Timer;
use std::path::Path;
use std::sync::Arc;

/// Edge length of the synthetic input used when no image is supplied.
const SYNTH_DIM: u32 = 512;

const PARAMS_DECL: &str = r#"
struct Params {
    width: u32,
    height: u32,
    radius: i32,
    _pad: u32,
    amount: f32,
    threshold: f32,
    _pad1: f32,
    _pad2: f32,
}
"#;

const COMMON_FNS: &str = r#"
fn unpack(p: u32) -> vec4<f32> {
    return vec4<f32>(
        f32(p & 0xFFu),
        f32((p >> 8u) & 0xFFu),
        f32((p >> 16u) & 0xFFu),
        f32((p >> 24u) & 0xFFu),
    );
}

fn pack(c: vec4<f32>) -> u32 {
    let v = clamp(c, vec4<f32>(0.0), vec4<f32>(255.0));
    return u32(v.x + 0.5) | (u32(v.y + 0.5) << 8u)
        | (u32(v.z + 0.5) << 16u) | (u32(v.w + 0.5) << 24u);
}

fn pixel_at(x: i32, y: i32) -> vec4<f32> {
    let cx = clamp(x, 0, i32(params.width) - 1);
    let cy = clamp(y, 0, i32(params.height) - 1);
    return unpack(src[u32(cy) * params.width + u32(cx)]);
}

fn sharpen(o: f32, b: f32) -> f32 {
    let diff = o - b;
    if (abs(diff) > params.threshold) {
        return clamp(o + params.amount * diff, 0.0, 255.0);
    }
    return o;
}
"#;

const BLUR_H_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read> weights: array<f32>;
@group(0) @binding(2) var<storage, read_write> blurred: array<vec4<f32>>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }
    var acc = vec4<f32>(0.0);
    for (var d = -params.radius; d <= params.radius; d = d + 1) {
        let w = weights[u32(d + params.radius)];
        acc = acc + w * pixel_at(i32(gid.x) + d, i32(gid.y));
    }
    blurred[gid.y * params.width + gid.x] = acc;
}
"#;

const BLUR_V_SHARPEN_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read> blurred: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> weights: array<f32>;
@group(0) @binding(3) var<storage, read_write> dst: array<u32>;
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }
    var acc = vec4<f32>(0.0);
    for (var d = -params.radius; d <= params.radius; d = d + 1) {
        let cy = clamp(i32(gid.y) + d, 0, i32(params.height) - 1);
        let w = weights[u32(d + params.radius)];
        acc = acc + w * blurred[u32(cy) * params.width + gid.x];
    }
    let orig = unpack(src[gid.y * params.width + gid.x]);
    dst[gid.y * params.width + gid.x] = pack(vec4<f32>(
        sharpen(orig.x, acc.x),
        sharpen(orig.y, acc.y),
        sharpen(orig.z, acc.z),
        orig.w,
    ));
}
"#;

const SINGLE_PASS_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read> weights: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<u32>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }
    var acc = vec4<f32>(0.0);
    var idx = 0u;
    for (var dy = -params.radius; dy <= params.radius; dy = dy + 1) {
        for (var dx = -params.radius; dx <= params.radius; dx = dx + 1) {
            acc = acc + weights[idx] * pixel_at(i32(gid.x) + dx, i32(gid.y) + dy);
            idx = idx + 1u;
        }
    }
    let orig = unpack(src[gid.y * params.width + gid.x]);
    dst[gid.y * params.width + gid.x] = pack(vec4<f32>(
        sharpen(orig.x, acc.x),
        sharpen(orig.y, acc.y),
        sharpen(orig.z, acc.z),
        orig.w,
    ));
}
"#;

fn assemble(body: &str) -> String {
    format!("{PARAMS_DECL}{COMMON_FNS}{body}")
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MaskParams {
    width: u32,
    height: u32,
    radius: i32,
    _pad0: u32,
    amount: f32,
    threshold: f32,
    _pad1: [f32; 2],
}

/// Normalized 1D Gaussian with `sigma = radius / 2`.
pub fn gaussian_1d(radius: u32) -> Vec<f32> {
    let sigma = radius as f32 / 2.0;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-(radius as i32)..=radius as i32)
        .map(|d| (-((d * d) as f32) / denom).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Normalized 2D Gaussian as the outer product of the 1D weights,
/// row-major over a `(2r + 1)` square window.
pub fn gaussian_2d(radius: u32) -> Vec<f32> {
    let line = gaussian_1d(radius);
    let mut weights = Vec::with_capacity(line.len() * line.len());
    for &wy in &line {
        for &wx in &line {
            weights.push(wy * wx);
        }
    }
    weights
}

fn sharpen(o: f32, b: f32, amount: f32, threshold: f32) -> f32 {
    let diff = o - b;
    if diff.abs() > threshold {
        (o + amount * diff).clamp(0.0, 255.0)
    } else {
        o
    }
}

/// Host reference using the separable blur.
pub fn cpu_unsharp_mask(image: &RgbaImage, radius: u32, amount: f32, threshold: f32) -> Vec<u8> {
    let (w, h) = (image.width as usize, image.height as usize);
    let weights = gaussian_1d(radius);
    let r = radius as i32;

    let mut blurred_h = vec![[0.0f32; 4]; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for d in -r..=r {
                let cx = (x as i32 + d).clamp(0, w as i32 - 1) as usize;
                let wgt = weights[(d + r) as usize];
                let i = (y * w + cx) * 4;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += wgt * image.pixels[i + c] as f32;
                }
            }
            blurred_h[y * w + x] = acc;
        }
    }

    let mut out = vec![0u8; image.byte_len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for d in -r..=r {
                let cy = (y as i32 + d).clamp(0, h as i32 - 1) as usize;
                let wgt = weights[(d + r) as usize];
                let px = blurred_h[cy * w + x];
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += wgt * px[c];
                }
            }
            let i = (y * w + x) * 4;
            for c in 0..3 {
                let o = image.pixels[i + c] as f32;
                out[i + c] = (sharpen(o, acc[c], amount, threshold) + 0.5) as u8;
            }
            out[i + 3] = image.pixels[i + 3];
        }
    }
    out
}

struct DeviceState {
    stream: CommandStream,
    blur_h: ComputeKernel,
    blur_v_sharpen: ComputeKernel,
    single_pass: ComputeKernel,
    dst_two_pass: GpuBuffer,
    dst_single: GpuBuffer,
    bind_h: wgpu::BindGroup,
    bind_v: wgpu::BindGroup,
    bind_single: wgpu::BindGroup,
    extent: (u32, u32, u32),
}

/// Unsharp mask sample comparing the separable and single-pass blurs.
#[derive(Default)]
pub struct UnsharpMaskSample {
    image: Option<RgbaImage>,
    radius: u32,
    amount: f32,
    threshold: f32,
    two_pass_timer: Timer,
    single_pass_timer: Timer,
    runs: usize,
    state: Option<DeviceState>,
}

impl std::fmt::Debug for UnsharpMaskSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsharpMaskSample")
            .field("radius", &self.radius)
            .field("amount", &self.amount)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl UnsharpMaskSample {
    /// Create an unconfigured sample; `setup` loads or generates the
    /// input image and builds device resources.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<&DeviceState> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))
    }

    fn image(&self) -> Result<&RgbaImage> {
        self.image
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))
    }

    fn avg_secs(&self, timer: &Timer) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        timer.elapsed_secs() / self.runs as f64
    }

    /// Read the two-pass result back and write it as a PNG.
    pub fn save_output(&self, path: &Path) -> Result<()> {
        let st = self.state()?;
        let image = self.image()?;
        let pixels = st.dst_two_pass.read(&st.stream)?;
        image_io::save_rgba(
            path,
            &RgbaImage {
                width: image.width,
                height: image.height,
                pixels,
            },
        )
    }
}

impl Sample for UnsharpMaskSample {
    fn name(&self) -> &str {
        "UnsharpMask"
    }

    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()> {
        let image = match &config.image_input {
            Some(path) => image_io::load_rgba(path)?,
            None => image_io::synth_rgba(SYNTH_DIM, SYNTH_DIM, config.seed),
        };
        self.radius = config.radius;
        self.amount = config.amount;
        self.threshold = config.threshold;
        log::debug!(
            "UnsharpMask: {}x{} input, radius {}",
            image.width,
            image.height,
            self.radius
        );

        let stream = CommandStream::new(ctx, "unsharp-mask");
        let device = ctx.device();

        let blur_h_src = assemble(BLUR_H_BODY);
        let blur_h = ComputeKernel::compile(
            device,
            &KernelSpec {
                label: "blur-h",
                source: &blur_h_src,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        let blur_v_src = assemble(BLUR_V_SHARPEN_BODY);
        let blur_v_sharpen = ComputeKernel::compile(
            device,
            &KernelSpec {
                label: "blur-v-sharpen",
                source: &blur_v_src,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::StorageReadOnly,
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        let single_src = assemble(SINGLE_PASS_BODY);
        let single_pass = ComputeKernel::compile(
            device,
            &KernelSpec {
                label: "unsharp-single",
                source: &single_src,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        let pixel_bytes = image.byte_len();
        let src = GpuBuffer::new(ctx.shared_device(), pixel_bytes);
        src.write(ctx.queue(), &image.pixels)?;
        // Intermediate keeps full float precision between the passes.
        let blurred = GpuBuffer::new(ctx.shared_device(), image.pixel_count() * 16);
        let dst_two_pass = GpuBuffer::new(ctx.shared_device(), pixel_bytes);
        let dst_single = GpuBuffer::new(ctx.shared_device(), pixel_bytes);

        let line = gaussian_1d(self.radius);
        let weights_1d = GpuBuffer::new(ctx.shared_device(), line.len() * 4);
        weights_1d.write(ctx.queue(), bytemuck::cast_slice(&line))?;
        let square = gaussian_2d(self.radius);
        let weights_2d = GpuBuffer::new(ctx.shared_device(), square.len() * 4);
        weights_2d.write(ctx.queue(), bytemuck::cast_slice(&square))?;

        let params = GpuBuffer::uniform(ctx.shared_device(), std::mem::size_of::<MaskParams>());
        params.write(
            ctx.queue(),
            bytemuck::bytes_of(&MaskParams {
                width: image.width,
                height: image.height,
                radius: self.radius as i32,
                _pad0: 0,
                amount: self.amount,
                threshold: self.threshold,
                _pad1: [0.0; 2],
            }),
        )?;

        let bind_h = blur_h.bind(device, &[&src, &weights_1d, &blurred, &params])?;
        let bind_v = blur_v_sharpen.bind(
            device,
            &[&src, &blurred, &weights_1d, &dst_two_pass, &params],
        )?;
        let bind_single = single_pass.bind(device, &[&src, &weights_2d, &dst_single, &params])?;

        let extent = (image.width.div_ceil(16), image.height.div_ceil(16), 1);
        self.image = Some(image);
        self.state = Some(DeviceState {
            stream,
            blur_h,
            blur_v_sharpen,
            single_pass,
            dst_two_pass,
            dst_single,
            bind_h,
            bind_v,
            bind_single,
            extent,
        });
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let st = self
            .state
            .as_ref()
            .ok_or_else(|| Error::gpu("sample not set up"))?;

        self.two_pass_timer.start();
        let mut encoder = st.stream.encoder();
        st.blur_h.encode(&mut encoder, &st.bind_h, st.extent);
        st.blur_v_sharpen.encode(&mut encoder, &st.bind_v, st.extent);
        let event = st.stream.submit(encoder);
        st.stream.wait(&event);
        self.two_pass_timer.stop();

        self.single_pass_timer.start();
        let mut encoder = st.stream.encoder();
        st.single_pass.encode(&mut encoder, &st.bind_single, st.extent);
        let event = st.stream.submit(encoder);
        st.stream.wait(&event);
        self.single_pass_timer.stop();

        self.runs += 1;
        Ok(())
    }

    fn reset_timers(&mut self) {
        self.two_pass_timer.reset();
        self.single_pass_timer.reset();
        self.runs = 0;
    }

    fn verify(&mut self) -> Result<()> {
        if self.runs == 0 {
            return Err(Error::verification("no dispatch executed"));
        }
        let st = self.state()?;
        let image = self.image()?;
        let expected = cpu_unsharp_mask(image, self.radius, self.amount, self.threshold);

        let two_pass = st.dst_two_pass.read(&st.stream)?;
        compare_channels("two-pass", &two_pass, &expected)?;
        let single = st.dst_single.read(&st.stream)?;
        compare_channels("single-pass", &single, &expected)?;
        Ok(())
    }

    fn stat_columns(&self, _report: &RunReport) -> Vec<(String, String)> {
        let (w, h) = self
            .image
            .as_ref()
            .map_or((0, 0), |i| (i.width, i.height));
        vec![
            ("Width".to_string(), w.to_string()),
            ("Height".to_string(), h.to_string()),
            ("Radius".to_string(), self.radius.to_string()),
            (
                "Two-pass Time (s)".to_string(),
                format!("{:.6}", self.avg_secs(&self.two_pass_timer)),
            ),
            (
                "Single-pass Time (s)".to_string(),
                format!("{:.6}", self.avg_secs(&self.single_pass_timer)),
            ),
        ]
    }
}

// Rounding differs between host and device, and a float diff landing on
// the threshold can flip the sharpen branch; both stay within two steps.
fn compare_channels(variant: &str, got: &[u8], expected: &[u8]) -> Result<()> {
    for (i, (&g, &e)) in got.iter().zip(expected.iter()).enumerate() {
        if (g as i16 - e as i16).abs() > 2 {
            return Err(Error::verification(format!(
                "{variant}: pixel {} channel {}: device {} vs host {}",
                i / 4,
                i % 4,
                g,
                e
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_1d_normalized_and_symmetric() {
        for radius in [1, 3, 8, 25] {
            let w = gaussian_1d(radius);
            assert_eq!(w.len(), (2 * radius + 1) as usize);
            let sum: f32 = w.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            let n = w.len();
            for i in 0..n / 2 {
                assert!((w[i] - w[n - 1 - i]).abs() < 1e-6);
            }
            // Center weight dominates
            assert!(w[n / 2] >= w[0]);
        }
    }

    #[test]
    fn test_gaussian_2d_normalized() {
        let w = gaussian_2d(4);
        assert_eq!(w.len(), 9 * 9);
        let sum: f32 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_flat_image_passes_through() {
        // Blurring a constant image changes nothing, so the sharpen
        // threshold never trips.
        let image = RgbaImage {
            width: 8,
            height: 8,
            pixels: vec![128; 8 * 8 * 4],
        };
        let out = cpu_unsharp_mask(&image, 3, 2.0, 1.0);
        assert_eq!(out, image.pixels);
    }

    #[test]
    fn test_edge_gets_sharpened() {
        // Vertical step edge: the boundary columns should move away
        // from the blur.
        let mut pixels = Vec::new();
        for _y in 0..8 {
            for x in 0..8 {
                let v = if x < 4 { 64 } else { 192 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let image = RgbaImage {
            width: 8,
            height: 8,
            pixels,
        };
        let out = cpu_unsharp_mask(&image, 2, 1.0, 1.0);

        // Column 3 (dark side of the edge) overshoots darker
        let dark_edge = out[(3 * 4) as usize];
        assert!(dark_edge < 64, "expected overshoot below 64, got {dark_edge}");
        // Column 4 (bright side) overshoots brighter
        let bright_edge = out[(4 * 4) as usize];
        assert!(bright_edge > 192);
    }

    #[test]
    fn test_sharpen_threshold_gates_small_diffs() {
        assert_eq!(sharpen(100.0, 100.5, 2.0, 1.0), 100.0);
        assert_eq!(sharpen(100.0, 90.0, 0.5, 1.0), 105.0);
        assert_eq!(sharpen(250.0, 200.0, 2.0, 1.0), 255.0);
    }

    #[test]
    fn test_device_variants_match_host() {
        let config = Config::builder()
            .radius(3)
            .verify(true)
            .quiet(true)
            .build()
            .unwrap();
        let mut sample = UnsharpMaskSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Ok(_) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
