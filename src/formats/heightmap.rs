//! Heightfield import from grayscale raster files.
//!
//! Supports 16-bit PNG, single-band TIFF and headerless 16-bit RAW sources
//! (the little-endian square layout heightfields are commonly exchanged in).
//! Sample values are normalized to `[0, 1]`; the physical max height is
//! applied later by the samplers.

use crate::{
    heightfield::Heightfield,
    result::{ConversionError, ConversionResult},
};
use ndarray::Array2;
use std::{fs, fs::File, io::BufReader, path::Path};
use tiff::decoder::{Decoder, DecodingResult};

pub fn load_heightfield(path: &Path) -> ConversionResult<Heightfield> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "tif" | "tiff" => load_tiff(path),
        "raw" | "r16" => load_raw(path),
        _ => load_image_rs(path),
    }
}

fn load_image_rs(path: &Path) -> ConversionResult<Heightfield> {
    let image = image::open(path)?.into_luma16();
    let (width, height) = image.dimensions();

    let samples: Vec<f32> = image
        .as_raw()
        .iter()
        .map(|&value| value as f32 / u16::MAX as f32)
        .collect();

    grid_from_samples(width, height, samples)
}

fn load_tiff(path: &Path) -> ConversionResult<Heightfield> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (width, height) = decoder.dimensions()?;

    let samples = match decoder.read_image()? {
        DecodingResult::U8(data) => data.iter().map(|&v| v as f32 / u8::MAX as f32).collect(),
        DecodingResult::U16(data) => data.iter().map(|&v| v as f32 / u16::MAX as f32).collect(),
        DecodingResult::F32(data) => data.iter().map(|&v| v.clamp(0.0, 1.0)).collect(),
        _ => {
            return Err(ConversionError::UnsupportedHeightmap(format!(
                "tiff sample format of {}",
                path.display()
            )));
        }
    };

    grid_from_samples(width, height, samples)
}

fn load_raw(path: &Path) -> ConversionResult<Heightfield> {
    let bytes = fs::read(path)?;

    if bytes.len() % 2 != 0 {
        return Err(ConversionError::UnsupportedHeightmap(format!(
            "odd byte count in {}",
            path.display()
        )));
    }

    let samples: Vec<u16> = bytemuck::pod_collect_to_vec(&bytes);

    let side = (samples.len() as f64).sqrt() as u32;
    if (side * side) as usize != samples.len() {
        return Err(ConversionError::UnsupportedHeightmap(format!(
            "raw heightmap is not square: {}",
            path.display()
        )));
    }

    let samples = samples
        .into_iter()
        .map(|value| value as f32 / u16::MAX as f32)
        .collect();

    grid_from_samples(side, side, samples)
}

fn grid_from_samples(width: u32, height: u32, samples: Vec<f32>) -> ConversionResult<Heightfield> {
    let heights = Array2::from_shape_vec((height as usize, width as usize), samples)
        .map_err(|_| ConversionError::InvalidInput)?;

    Heightfield::new(heights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn png_heights_normalize_to_unit_range() {
        let path = std::env::temp_dir().join("terrain_to_mesh_heightmap.png");

        let image: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(4, 4, |x, y| Luma([((x + y * 4) * 4369) as u16]));
        image.save(&path).unwrap();

        let field = load_heightfield(&path).unwrap();

        assert_eq!(field.samples(), 4);
        assert_eq!(field.get(0, 0), 0.0);
        assert!((field.get(3, 3) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn raw_heights_read_little_endian_squares() {
        let path = std::env::temp_dir().join("terrain_to_mesh_heightmap.r16");

        let samples: Vec<u16> = (0..9).map(|index| index * 8191).collect();
        let bytes: Vec<u8> = samples
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        fs::write(&path, bytes).unwrap();

        let field = load_heightfield(&path).unwrap();

        assert_eq!(field.samples(), 3);
        assert_eq!(field.get(1, 0), 8191.0 / u16::MAX as f32);
    }

    #[test]
    fn non_square_raw_data_is_rejected() {
        let path = std::env::temp_dir().join("terrain_to_mesh_heightmap_bad.raw");
        fs::write(&path, [0u8; 12]).unwrap();

        assert!(matches!(
            load_heightfield(&path),
            Err(ConversionError::UnsupportedHeightmap(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_heightfield(Path::new("/nonexistent/height.png")).is_err());
    }
}
