//! The terrain data provider consumed by the conversion pipeline.
//!
//! A [`Terrain`] owns the source heightfield, the physical size, the painted
//! surface layers and their blend-weight stack. The pipeline reads from it,
//! never writes; every generation request works on its own output buffers.

use crate::{
    heightfield::Heightfield,
    result::{ConversionError, ConversionResult},
};
use glam::{Vec2, Vec3};
use image::RgbaImage;
use ndarray::{s, Array3};

/// One painted surface layer of a terrain.
#[derive(Clone, Debug)]
pub struct TerrainLayer {
    pub name: String,
    pub diffuse: Option<RgbaImage>,
    pub normal: Option<RgbaImage>,
    /// World-space size of one texture tile.
    pub tile_size: Vec2,
    pub tile_offset: Vec2,
    pub normal_scale: f32,
}

impl TerrainLayer {
    /// How often the layer texture repeats across the terrain, rounded to
    /// whole tiles per axis.
    pub fn uv_scale(&self, terrain_size: Vec3) -> Vec2 {
        Vec2::new(
            (terrain_size.x / self.tile_size.x).round(),
            (terrain_size.z / self.tile_size.y).round(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct Terrain {
    pub name: String,
    pub heightfield: Heightfield,
    /// Physical extents: x = width, y = max height, z = depth.
    pub size: Vec3,
    pub layers: Vec<TerrainLayer>,
    /// Blend weights `[row (z), column (x), layer]` in `[0, 1]`.
    pub alphamaps: Array3<f32>,
}

impl Terrain {
    /// Height samples per heightfield side.
    pub fn heightmap_resolution(&self) -> u32 {
        self.heightfield.samples() as u32
    }

    /// World height of the grid sample at `(x, z)`.
    pub fn height_at(&self, x: usize, z: usize) -> f32 {
        self.heightfield.get(x, z) * self.size.y
    }

    /// Bilinearly interpolated world height at normalized `(u, v)`.
    pub fn interpolated_height(&self, u: f32, v: f32) -> f32 {
        self.heightfield.sample(u, v) * self.size.y
    }

    /// World height of the nearest grid sample together with the
    /// interpolated surface normal, the lookup used by LOD tessellation.
    pub fn height_and_normal(&self, u: f32, v: f32) -> (f32, Vec3) {
        let height = self.heightfield.sample_nearest(u, v) * self.size.y;

        (height, self.interpolated_normal(u, v))
    }

    /// Surface normal at normalized `(u, v)`, bilinearly blended between the
    /// central-difference gradient normals of the four surrounding samples.
    pub fn interpolated_normal(&self, u: f32, v: f32) -> Vec3 {
        let r = self.heightfield.resolution();

        let fx = (u * r as f32).clamp(0.0, r as f32);
        let fz = (v * r as f32).clamp(0.0, r as f32);

        let x1 = fx.floor() as usize;
        let z1 = fz.floor() as usize;
        let x2 = (x1 + 1).min(r);
        let z2 = (z1 + 1).min(r);

        let tx = fx - x1 as f32;
        let tz = fz - z1 as f32;

        let bottom = self
            .vertex_normal(x1, z1)
            .lerp(self.vertex_normal(x2, z1), tx);
        let top = self
            .vertex_normal(x1, z2)
            .lerp(self.vertex_normal(x2, z2), tx);

        bottom.lerp(top, tz).normalize_or(Vec3::Y)
    }

    fn vertex_normal(&self, x: usize, z: usize) -> Vec3 {
        let r = self.heightfield.resolution();
        let cell = Vec2::new(self.size.x, self.size.z) / r as f32;

        let x0 = x.saturating_sub(1);
        let x1 = (x + 1).min(r);
        let z0 = z.saturating_sub(1);
        let z1 = (z + 1).min(r);

        let dx = (self.height_at(x1, z) - self.height_at(x0, z)) / ((x1 - x0) as f32 * cell.x);
        let dz = (self.height_at(x, z1) - self.height_at(x, z0)) / ((z1 - z0) as f32 * cell.y);

        Vec3::new(-dx, 1.0, -dz).normalize_or(Vec3::Y)
    }

    pub fn alphamap_resolution(&self) -> u32 {
        self.alphamaps.dim().0 as u32
    }

    pub fn layer_count(&self) -> usize {
        self.alphamaps.dim().2
    }

    /// Copies a rectangular region of the blend-weight stack, `[row, column,
    /// layer]` starting at sample `(origin_x, origin_z)`.
    pub fn alpha_region(
        &self,
        origin_x: usize,
        origin_z: usize,
        width: usize,
        height: usize,
    ) -> ConversionResult<Array3<f32>> {
        let (rows, cols, _) = self.alphamaps.dim();

        if origin_x + width > cols || origin_z + height > rows {
            return Err(ConversionError::InvalidInput);
        }

        Ok(self
            .alphamaps
            .slice(s![origin_z..origin_z + height, origin_x..origin_x + width, ..])
            .to_owned())
    }

}
