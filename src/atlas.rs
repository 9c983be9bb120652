//! Texture atlas packing of terrain layer textures.
//!
//! All layer textures are resized to one tile size and arranged on a fixed
//! column grid, producing a composite image plus its grid geometry for
//! downstream indexed sampling. Tiles flagged as normal maps are
//! renormalized after the resize, since resampling interpolates encoded
//! normals off the unit sphere.

use crate::{
    config::GenerationConfig,
    formats,
    result::ConversionResult,
    terrain::{Terrain, TerrainLayer},
};
use glam::UVec2;
use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use log::{info, warn};
use std::{collections::HashMap, path::PathBuf};

/// The widest supported atlas grid.
pub const MAX_ATLAS_COLUMNS: u32 = 4;

/// Grid geometry of a packed atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasLayout {
    pub tile_size: u32,
    pub columns: u32,
    pub rows: u32,
}

impl AtlasLayout {
    pub fn new(count: usize, tile_size: u32) -> Self {
        let columns = MAX_ATLAS_COLUMNS.min(count as u32).max(1);
        let rows = (count as u32).div_ceil(columns).max(1);

        Self {
            tile_size,
            columns,
            rows,
        }
    }

    /// Grid cell of tile `index` in bottom-up storage. The rows are flipped
    /// so that tile 0 reads top-left in conventional image orientation.
    pub fn cell(&self, index: usize) -> UVec2 {
        let index = index as u32;

        UVec2::new(index % self.columns, self.rows - 1 - index / self.columns)
    }

    /// Pixel origin of tile `index` in bottom-up storage.
    pub fn pixel_origin(&self, index: usize) -> UVec2 {
        self.cell(index) * self.tile_size
    }

    pub fn atlas_size(&self) -> UVec2 {
        UVec2::new(self.columns, self.rows) * self.tile_size
    }
}

/// Packs the given tiles into an atlas. Missing entries become fully
/// transparent placeholder tiles.
pub fn build_atlas(
    tiles: &[Option<&RgbaImage>],
    tile_size: u32,
    is_normal_map: bool,
) -> (RgbaImage, AtlasLayout) {
    let layout = AtlasLayout::new(tiles.len(), tile_size);
    let size = layout.atlas_size();

    let mut atlas = RgbaImage::new(size.x, size.y);

    for (index, tile) in tiles.iter().enumerate() {
        let resized = match tile {
            Some(tile) => resize_tile(tile, tile_size, is_normal_map),
            None => RgbaImage::from_pixel(tile_size, tile_size, Rgba([0, 0, 0, 0])),
        };

        let origin = layout.pixel_origin(index);
        // bottom-up origin into top-down pixel storage
        let y = size.y - origin.y - tile_size;

        imageops::replace(&mut atlas, &resized, origin.x as i64, y as i64);
    }

    (atlas, layout)
}

/// Resizes a tile to `tile_size` square.
///
/// Color tiles are resampled on their sRGB-encoded values, normal tiles on
/// their linearly-encoded vectors followed by the mandatory renormalization.
fn resize_tile(tile: &RgbaImage, tile_size: u32, is_normal_map: bool) -> RgbaImage {
    let mut resized = imageops::resize(tile, tile_size, tile_size, FilterType::Triangle);

    if is_normal_map {
        renormalize(&mut resized);
    }

    resized
}

/// Reconstructs unit tangent-space normals from resampled pixels.
///
/// The source encodes x in alpha and y in red; the output carries the full
/// vector in RGB with an opaque alpha.
fn renormalize(tile: &mut RgbaImage) {
    for pixel in tile.pixels_mut() {
        let x = pixel[3] as f32 / 255.0 * 2.0 - 1.0;
        let y = pixel[0] as f32 / 255.0 * 2.0 - 1.0;
        let z = (1.0 - (x * x + y * y).clamp(0.0, 1.0)).sqrt();

        *pixel = Rgba([
            encode(x),
            encode(y),
            encode(z),
            255,
        ]);
    }
}

fn encode(component: f32) -> u8 {
    ((component * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Collects the unique paint layers of several terrains, deduplicated by
/// name in first-seen order.
pub fn collect_unique_layers(terrains: &[&Terrain]) -> Vec<TerrainLayer> {
    let mut layers: Vec<TerrainLayer> = Vec::new();

    for terrain in terrains {
        for layer in &terrain.layers {
            if !layers.iter().any(|collected| collected.name == layer.name) {
                layers.push(layer.clone());
            }
        }
    }

    info!("collected {} unique terrain layers", layers.len());

    layers
}

/// Maps layer names to their atlas tile index. Layers without a name or
/// without a diffuse texture are skipped.
pub fn layer_index_map(layers: &[TerrainLayer]) -> HashMap<String, usize> {
    let mut map = HashMap::new();

    for (index, layer) in layers.iter().enumerate() {
        if !layer.name.is_empty() && layer.diffuse.is_some() && !map.contains_key(&layer.name) {
            map.insert(layer.name.clone(), index);
        }
    }

    map
}

/// Packs the albedo and normal atlases of the collected layers and writes
/// them as `{base_name}{albedo_suffix}.png` / `{base_name}{normal_suffix}.png`.
pub fn generate_texture_atlases(
    layers: &[TerrainLayer],
    config: &GenerationConfig,
) -> ConversionResult<Vec<(PathBuf, AtlasLayout)>> {
    if layers.is_empty() {
        warn!("no textures available for atlas generation");
        return Ok(Vec::new());
    }

    let albedo_tiles: Vec<Option<&RgbaImage>> =
        layers.iter().map(|layer| layer.diffuse.as_ref()).collect();
    let normal_tiles: Vec<Option<&RgbaImage>> =
        layers.iter().map(|layer| layer.normal.as_ref()).collect();

    let mut outputs = Vec::new();

    for (tiles, suffix, is_normal_map) in [
        (albedo_tiles, &config.albedo_suffix, false),
        (normal_tiles, &config.normal_suffix, true),
    ] {
        let (atlas, layout) = build_atlas(&tiles, config.texture_size, is_normal_map);

        let path = config
            .save_path
            .join(format!("{}{}.png", config.base_name, suffix));
        formats::save_png(&atlas, &path)?;

        info!(
            "atlas saved: {} ({}x{}, {} tiles)",
            path.display(),
            layout.atlas_size().x,
            layout.atlas_size().y,
            tiles.len()
        );

        outputs.push((path, layout));
    }

    Ok(outputs)
}
