//! Sepia tone with horizontal mirroring.
//!
//! Pixels travel as packed RGBA u32 words. Each invocation tones one
//! source pixel and writes it to the mirrored column of the output.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gpu::{BindingKind, CommandStream, ComputeKernel, GpuBuffer, GpuContext, KernelSpec};
use crate::harness::{RunReport, Sample};
use crate::samples::image_io::{self, RgbaImage};
use std::path::Path;
use std::sync::Arc;

/// Edge length of the synthetic input used when no image is supplied.
const SYNTH_DIM: u32 = 512;

const SEPIA_SRC: &str = r#"
struct Params {
    width: u32,
    height: u32,
    _p0: u32,
    _p1: u32,
}

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

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

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }
    let c = unpack(src[gid.y * params.width + gid.x]);
    let r = min(0.393 * c.x + 0.769 * c.y + 0.189 * c.z, 255.0);
    let g = min(0.349 * c.x + 0.686 * c.y + 0.168 * c.z, 255.0);
    let b = min(0.272 * c.x + 0.534 * c.y + 0.131 * c.z, 255.0);
    let mirrored = params.width - 1u - gid.x;
    dst[gid.y * params.width + mirrored] = pack(vec4<f32>(r, g, b, c.w));
}
"#;

/// Host reference: sepia tone plus horizontal mirror, RGBA bytes.
pub fn cpu_sepia_mirror(image: &RgbaImage) -> Vec<u8> {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = vec![0u8; image.byte_len()];
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            let (r, g, b) = (
                image.pixels[i] as f32,
                image.pixels[i + 1] as f32,
                image.pixels[i + 2] as f32,
            );
            let o = (y * w + (w - 1 - x)) * 4;
            out[o] = ((0.393 * r + 0.769 * g + 0.189 * b).min(255.0) + 0.5) as u8;
            out[o + 1] = ((0.349 * r + 0.686 * g + 0.168 * b).min(255.0) + 0.5) as u8;
            out[o + 2] = ((0.272 * r + 0.534 * g + 0.131 * b).min(255.0) + 0.5) as u8;
            out[o + 3] = image.pixels[i + 3];
        }
    }
    out
}

struct DeviceState {
    stream: CommandStream,
    kernel: ComputeKernel,
    src: GpuBuffer,
    dst: GpuBuffer,
    params: GpuBuffer,
    bind_group: wgpu::BindGroup,
    extent: (u32, u32, u32),
}

/// Sepia/mirror sample. Input comes from `config.image_input` or a
/// seeded synthetic image.
#[derive(Default)]
pub struct ImageFilterSample {
    image: Option<RgbaImage>,
    runs: usize,
    state: Option<DeviceState>,
}

impl std::fmt::Debug for ImageFilterSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ImageFilterSample");
        if let Some(image) = &self.image {
            s.field("width", &image.width).field("height", &image.height);
        }
        s.finish()
    }
}

impl ImageFilterSample {
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

    /// Read the filtered image back and write it as a PNG.
    pub fn save_output(&self, path: &Path) -> Result<()> {
        let st = self.state()?;
        let image = self.image()?;
        let pixels = st.dst.read(&st.stream)?;
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

impl Sample for ImageFilterSample {
    fn name(&self) -> &str {
        "ImageFilter"
    }

    fn setup(&mut self, ctx: &Arc<GpuContext>, config: &Config) -> Result<()> {
        let image = match &config.image_input {
            Some(path) => image_io::load_rgba(path)?,
            None => image_io::synth_rgba(SYNTH_DIM, SYNTH_DIM, config.seed),
        };
        log::debug!("ImageFilter: {}x{} input", image.width, image.height);

        let stream = CommandStream::new(ctx, "image-filter");
        let kernel = ComputeKernel::compile(
            ctx.device(),
            &KernelSpec {
                label: "sepia-mirror",
                source: SEPIA_SRC,
                entry: "main",
                bindings: &[
                    BindingKind::StorageReadOnly,
                    BindingKind::Storage,
                    BindingKind::Uniform,
                ],
            },
        )?;

        let bytes = image.byte_len();
        let src = GpuBuffer::new(ctx.shared_device(), bytes);
        src.write(ctx.queue(), &image.pixels)?;
        let dst = GpuBuffer::new(ctx.shared_device(), bytes);
        let params = GpuBuffer::uniform(ctx.shared_device(), 16);
        params.write(
            ctx.queue(),
            bytemuck::cast_slice(&[image.width, image.height, 0, 0]),
        )?;

        let bind_group = kernel.bind(ctx.device(), &[&src, &dst, &params])?;
        let extent = (image.width.div_ceil(16), image.height.div_ceil(16), 1);

        self.image = Some(image);
        self.state = Some(DeviceState {
            stream,
            kernel,
            src,
            dst,
            params,
            bind_group,
            extent,
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
        let image = self.image()?;
        let got = st.dst.read(&st.stream)?;
        let expected = cpu_sepia_mirror(image);

        // Float rounding may differ by one step per channel.
        for (i, (&g, &e)) in got.iter().zip(expected.iter()).enumerate() {
            if (g as i16 - e as i16).abs() > 1 {
                return Err(Error::verification(format!(
                    "pixel {} channel {}: device {} vs host {}",
                    i / 4,
                    i % 4,
                    g,
                    e
                )));
            }
        }
        Ok(())
    }

    fn stat_columns(&self, report: &RunReport) -> Vec<(String, String)> {
        let avg = report.avg_kernel_secs();
        let (w, h) = self
            .image
            .as_ref()
            .map_or((0, 0), |i| (i.width, i.height));
        let mpixels = (w as f64 * h as f64) / 1e6;
        vec![
            ("Width".to_string(), w.to_string()),
            ("Height".to_string(), h.to_string()),
            (
                "Setup Time (s)".to_string(),
                format!("{:.6}", report.setup_secs),
            ),
            ("Avg. Kernel Time (s)".to_string(), format!("{:.6}", avg)),
            (
                "MPixels/s".to_string(),
                format!("{:.2}", mpixels / avg.max(1e-12)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_sepia_mirrors_columns() {
        // Two pixels: pure red and pure blue
        let image = RgbaImage {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        let out = cpu_sepia_mirror(&image);

        // Red lands in the right column after mirroring
        let toned_red = &out[4..8];
        assert_eq!(toned_red[0], (0.393f32 * 255.0 + 0.5) as u8);
        assert_eq!(toned_red[1], (0.349f32 * 255.0 + 0.5) as u8);
        assert_eq!(toned_red[2], (0.272f32 * 255.0 + 0.5) as u8);
        assert_eq!(toned_red[3], 255);

        // Blue lands in the left column
        let toned_blue = &out[0..4];
        assert_eq!(toned_blue[0], (0.189f32 * 255.0 + 0.5) as u8);
    }

    #[test]
    fn test_cpu_sepia_clamps_white() {
        let image = RgbaImage {
            width: 1,
            height: 1,
            pixels: vec![255, 255, 255, 255],
        };
        let out = cpu_sepia_mirror(&image);
        // 0.393 + 0.769 + 0.189 > 1, so red saturates
        assert_eq!(out[0], 255);
    }

    #[test]
    fn test_device_filter_matches_host() {
        let config = Config::builder().verify(true).quiet(true).build().unwrap();
        let mut sample = ImageFilterSample::new();
        match crate::harness::run_sample(&mut sample, &config) {
            Ok(_) => {}
            // Requires a GPU, so it may be skipped in CI
            Err(Error::Gpu(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
