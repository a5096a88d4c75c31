//! PNG loading/saving and synthetic input for the image samples.

use crate::error::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 8-bit RGBA image with row-major pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, RGBA order.
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length of the pixel data.
    pub fn byte_len(&self) -> usize {
        self.pixel_count() * 4
    }
}

/// Load a PNG as RGBA8. RGB images gain an opaque alpha channel;
/// other color types and bit depths are rejected.
pub fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(file);
    let mut reader = decoder
        .read_info()
        .map_err(|e| Error::image(format!("{}: {}", path.display(), e)))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| Error::image(format!("{}: {}", path.display(), e)))?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(Error::image(format!(
            "{}: unsupported bit depth {:?}",
            path.display(),
            info.bit_depth
        )));
    }

    let pixels = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => rgb_to_rgba(&buf),
        other => {
            return Err(Error::image(format!(
                "{}: unsupported color type {:?}",
                path.display(),
                other
            )))
        }
    };

    Ok(RgbaImage {
        width: info.width,
        height: info.height,
        pixels,
    })
}

/// Write an RGBA8 image as a PNG.
pub fn save_rgba(path: &Path, image: &RgbaImage) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| Error::image(format!("{}: {}", path.display(), e)))?;
    writer
        .write_image_data(&image.pixels)
        .map_err(|e| Error::image(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// Deterministic synthetic image: channel gradients with seeded noise,
/// so blur and sharpen kernels have edges to work on.
pub fn synth_rgba(width: u32, height: u32, seed: u64) -> RgbaImage {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let noise: i32 = rng.gen_range(-16..=16);
            let r = ((x * 255 / width.max(1)) as i32 + noise).clamp(0, 255) as u8;
            let g = ((y * 255 / height.max(1)) as i32 + noise).clamp(0, 255) as u8;
            let b = (((x + y) * 255 / (width + height).max(1)) as i32 - noise).clamp(0, 255) as u8;
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }
    RgbaImage {
        width,
        height,
        pixels,
    }
}

fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(px);
        rgba.push(255);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synth_is_deterministic() {
        let a = synth_rgba(32, 16, 9);
        let b = synth_rgba(32, 16, 9);
        assert_eq!(a, b);
        assert_eq!(a.byte_len(), 32 * 16 * 4);
        // Alpha is opaque everywhere
        assert!(a.pixels.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_rgb_expansion() {
        let rgba = rgb_to_rgba(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rgba, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_png_round_trip() {
        let path = std::env::temp_dir().join("helios_image_io_test.png");
        let image = synth_rgba(24, 17, 3);

        save_rgba(&path, &image).unwrap();
        let loaded = load_rgba(&path).unwrap();
        assert_eq!(loaded, image);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_rgba(Path::new("/nonexistent/helios.png"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
