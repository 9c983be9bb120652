//! Spatial subdivision of a terrain into an N x N grid of chunks.
//!
//! Splitting partitions the heightfield, the alphamaps and any baked texture
//! into independent sub-regions. Every chunk owns `chunk_resolution + 1`
//! height samples per side and the UV sub-rectangle
//! `[x/N, (x+1)/N] x [z/N, (z+1)/N]` of the combined texture space.

use crate::{heightfield::Heightfield, result::ConversionResult};
use glam::{Vec2, Vec3};
use image::{imageops, RgbaImage};
use itertools::iproduct;

/// The layout of an N x N terrain split.
#[derive(Clone, Copy, Debug)]
pub struct SplitSpec {
    split_count: u32,
}

impl SplitSpec {
    /// Creates a split layout. The count is rounded up to the next power of
    /// two, matching the supported chunk grids.
    pub fn new(split_count: u32) -> Self {
        Self {
            split_count: split_count.max(2).next_power_of_two(),
        }
    }

    pub fn split_count(&self) -> u32 {
        self.split_count
    }

    /// All chunk coordinates in row-major order, `(x, z)`.
    pub fn chunks(&self) -> impl Iterator<Item = (u32, u32)> {
        let count = self.split_count;
        iproduct!(0..count, 0..count).map(|(z, x)| (x, z))
    }

    /// Height samples per chunk side, excluding the closing sample row.
    ///
    /// Integer division: when the heightmap resolution does not divide evenly
    /// by the split count, the trailing rows/columns of samples are dropped.
    pub fn chunk_resolution(&self, heightmap_resolution: u32) -> u32 {
        heightmap_resolution / self.split_count
    }

    /// World-space extent of one chunk, `(width, depth)`.
    pub fn chunk_extent(&self, terrain_size: Vec3) -> Vec2 {
        Vec2::new(terrain_size.x, terrain_size.z) / self.split_count as f32
    }

    /// World-space origin of chunk `(x, z)` relative to the terrain origin.
    pub fn chunk_origin(&self, chunk_x: u32, chunk_z: u32, terrain_size: Vec3) -> Vec3 {
        let extent = self.chunk_extent(terrain_size);

        Vec3::new(chunk_x as f32 * extent.x, 0.0, chunk_z as f32 * extent.y)
    }

    /// The chunk's UV sub-rectangle of the combined texture space, as
    /// `(min, max)`.
    pub fn uv_bounds(&self, chunk_x: u32, chunk_z: u32) -> (Vec2, Vec2) {
        let scale = 1.0 / self.split_count as f32;
        let min = Vec2::new(chunk_x as f32, chunk_z as f32) * scale;

        (min, min + Vec2::splat(scale))
    }
}

/// Extracts the height sub-grid of chunk `(x, z)`: `chunk_resolution + 1`
/// samples per side, shared border samples with the neighboring chunks.
pub fn split_heightfield_region(
    heightfield: &Heightfield,
    spec: &SplitSpec,
    chunk_x: u32,
    chunk_z: u32,
) -> ConversionResult<Heightfield> {
    let chunk_resolution = spec.chunk_resolution(heightfield.resolution() as u32 + 1) as usize;

    heightfield.region(
        chunk_x as usize * chunk_resolution,
        chunk_z as usize * chunk_resolution,
        chunk_resolution + 1,
    )
}

/// Cuts the pixel region of chunk `(x, z)` out of a baked full-terrain
/// texture. The chunk z axis runs from the bottom row of texture space, so
/// the image row range is flipped against the top-down pixel storage.
pub fn extract_chunk_texture(
    texture: &RgbaImage,
    chunk_resolution: u32,
    chunk_x: u32,
    chunk_z: u32,
) -> RgbaImage {
    let x = chunk_x * chunk_resolution;
    let y = texture.height() - (chunk_z + 1) * chunk_resolution;

    imageops::crop_imm(texture, x, y, chunk_resolution, chunk_resolution).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use ndarray::Array2;

    #[test]
    fn split_count_normalizes_to_a_power_of_two() {
        assert_eq!(SplitSpec::new(2).split_count(), 2);
        assert_eq!(SplitSpec::new(3).split_count(), 4);
        assert_eq!(SplitSpec::new(8).split_count(), 8);
    }

    #[test]
    fn chunk_one_one_of_two_covers_the_upper_uv_quadrant() {
        let spec = SplitSpec::new(2);
        let (min, max) = spec.uv_bounds(1, 1);

        assert_eq!(min, Vec2::new(0.5, 0.5));
        assert_eq!(max, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn chunk_origins_tile_the_terrain() {
        let spec = SplitSpec::new(2);
        let size = Vec3::new(100.0, 20.0, 60.0);

        assert_eq!(spec.chunk_origin(0, 0, size), Vec3::ZERO);
        assert_eq!(spec.chunk_origin(1, 1, size), Vec3::new(50.0, 0.0, 30.0));
        assert_eq!(spec.chunk_extent(size), Vec2::new(50.0, 30.0));
    }

    #[test]
    fn chunk_resolution_truncates_uneven_divisions() {
        let spec = SplitSpec::new(4);

        assert_eq!(spec.chunk_resolution(64), 16);
        // 65 / 4 drops the trailing sample row
        assert_eq!(spec.chunk_resolution(65), 16);
    }

    #[test]
    fn heightfield_chunks_share_border_samples() {
        let heights = Array2::from_shape_fn((9, 9), |(z, x)| (x + z * 9) as f32 / 81.0);
        let field = Heightfield::new(heights).unwrap();
        let spec = SplitSpec::new(2);

        let left = split_heightfield_region(&field, &spec, 0, 0).unwrap();
        let right = split_heightfield_region(&field, &spec, 1, 0).unwrap();

        assert_eq!(left.samples(), 5);
        assert_eq!(right.samples(), 5);

        // the last column of the left chunk is the first column of the right
        for z in 0..5 {
            assert_eq!(left.get(4, z), right.get(0, z));
        }
    }

    #[test]
    fn texture_chunks_map_bottom_up() {
        let mut texture = RgbaImage::new(4, 4);
        // mark the bottom-left pixel of texture space (top-down row 3)
        texture.put_pixel(0, 3, Rgba([255, 0, 0, 255]));

        let chunk = extract_chunk_texture(&texture, 2, 0, 0);

        assert_eq!(chunk.dimensions(), (2, 2));
        assert_eq!(*chunk.get_pixel(0, 1), Rgba([255, 0, 0, 255]));
    }
}
