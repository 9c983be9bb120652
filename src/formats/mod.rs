//! On-disk artifact formats: Wavefront OBJ geometry, PNG rasters and
//! heightmap import.

pub mod heightmap;
pub mod obj;

use crate::result::ConversionResult;
use image::{Rgba, RgbaImage};
use std::{fs, path::Path};

/// Encodes a bottom-up grid of RGBA weights (row 0 = z = 0) into 8-bit
/// top-down pixel storage. This is the single place where the vertical flip
/// between the terrain's texture space and PNG row order happens.
pub(crate) fn encode_bottom_up(pixels: &[[f32; 4]], resolution: u32) -> RgbaImage {
    let mut image = RgbaImage::new(resolution, resolution);

    for (y, row) in pixels.chunks_exact(resolution as usize).enumerate() {
        for (x, &[r, g, b, a]) in row.iter().enumerate() {
            let pixel = Rgba([quantize(r), quantize(g), quantize(b), quantize(a)]);
            image.put_pixel(x as u32, resolution - 1 - y as u32, pixel);
        }
    }

    image
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Saves an image as PNG, creating the target directory if necessary.
pub(crate) fn save_png(image: &RgbaImage, path: &Path) -> ConversionResult<()> {
    if let Some(directory) = path.parent() {
        fs::create_dir_all(directory)?;
    }

    image.save(path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_row_of_texture_space_lands_at_the_image_bottom() {
        let mut pixels = vec![[0.0, 0.0, 0.0, 1.0]; 4];
        pixels[0] = [1.0, 0.0, 0.0, 1.0]; // logical (0, 0)

        let image = encode_bottom_up(&pixels, 2);

        assert_eq!(*image.get_pixel(0, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn quantization_rounds_and_clamps() {
        assert_eq!(quantize(0.5), 128);
        assert_eq!(quantize(-1.0), 0);
        assert_eq!(quantize(2.0), 255);
    }
}
