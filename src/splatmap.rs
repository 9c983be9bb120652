//! Packing of per-layer blend weights into RGBA splatmap images.
//!
//! Four layers share one image: layer `start + 0..4` land in the R/G/B/A
//! channels. Channels without a backing layer read 0, except the alpha
//! channel which reads 1 — a missing fourth layer is encoded opaque, distinct
//! from the zero weight of the missing color channels. Terrains with more
//! layers produce `ceil(layer_count / 4)` images.

use crate::{
    config::GenerationConfig,
    formats,
    result::{ConversionError, ConversionResult},
    split::SplitSpec,
    terrain::Terrain,
};
use image::RgbaImage;
use itertools::iproduct;
use log::{error, info, warn};
use ndarray::Array3;
use std::path::PathBuf;

/// The smallest splatmap a chunk may receive.
pub const MIN_SPLATMAP_RESOLUTION: u32 = 2;

/// How many images are needed for `layer_count` layers.
pub fn splatmap_count(layer_count: usize) -> usize {
    layer_count.div_ceil(4)
}

/// Merges up to four weight layers starting at `start_layer` into one RGBA
/// image.
pub fn pack_layers(
    alphamaps: &Array3<f32>,
    resolution: u32,
    layer_count: usize,
    start_layer: usize,
) -> RgbaImage {
    let mut pixels = Vec::with_capacity((resolution * resolution) as usize);

    for (y, x) in iproduct!(0..resolution as usize, 0..resolution as usize) {
        let channel = |offset: usize, missing: f32| {
            if start_layer + offset < layer_count {
                alphamaps[[y, x, start_layer + offset]]
            } else {
                missing
            }
        };

        pixels.push([
            channel(0, 0.0),
            channel(1, 0.0),
            channel(2, 0.0),
            channel(3, 1.0),
        ]);
    }

    formats::encode_bottom_up(&pixels, resolution)
}

/// Generates the full-terrain splatmaps, one image per four layers, named
/// `{prefix}{terrain}_splatmap{i}.png`.
pub fn generate_splatmaps(
    terrain: &Terrain,
    config: &GenerationConfig,
) -> ConversionResult<Vec<PathBuf>> {
    let resolution = config.splatmap_resolution(terrain.alphamap_resolution());
    let layer_count = terrain.layer_count();

    if resolution == 0 || layer_count == 0 {
        error!("no alphamap data on terrain '{}'", terrain.name);
        return Err(ConversionError::InvalidInput);
    }

    info!(
        "generating splatmaps for terrain '{}' with resolution {} and {} layers",
        terrain.name, resolution, layer_count
    );

    let alphamaps = terrain.alpha_region(0, 0, resolution as usize, resolution as usize)?;

    let mut paths = Vec::new();

    for index in 0..splatmap_count(layer_count) {
        let splatmap = pack_layers(&alphamaps, resolution, layer_count, index * 4);

        let path = config.save_path.join(format!(
            "{}{}_splatmap{index}.png",
            config.file_prefix, terrain.name
        ));
        formats::save_png(&splatmap, &path)?;

        paths.push(path);
    }

    Ok(paths)
}

/// Generates one splatmap set per chunk of the split, named
/// `{prefix}{terrain}_{x}_{z}_splatmap{i}.png`.
///
/// Aborts before writing anything when the per-chunk resolution would drop
/// below [`MIN_SPLATMAP_RESOLUTION`].
pub fn generate_split_splatmaps(
    terrain: &Terrain,
    spec: &SplitSpec,
    config: &GenerationConfig,
) -> ConversionResult<Vec<PathBuf>> {
    let full_resolution = terrain.alphamap_resolution();
    let layer_count = terrain.layer_count();
    let split_count = spec.split_count();

    let target_resolution =
        config.splatmap_resolution(full_resolution) / split_count;

    if target_resolution < MIN_SPLATMAP_RESOLUTION {
        error!(
            "splatmap resolution too small: {target_resolution}x{target_resolution} per chunk; \
             increase the splatmap size or reduce the split count"
        );
        return Err(ConversionError::ResolutionTooSmall {
            resolution: target_resolution,
        });
    }

    if layer_count == 0 {
        warn!("terrain '{}' has no paint layers", terrain.name);
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();

    for (chunk_x, chunk_z) in spec.chunks() {
        let alphamaps = terrain.alpha_region(
            (chunk_x * full_resolution / split_count) as usize,
            (chunk_z * full_resolution / split_count) as usize,
            target_resolution as usize,
            target_resolution as usize,
        )?;

        for index in 0..splatmap_count(layer_count) {
            let splatmap = pack_layers(&alphamaps, target_resolution, layer_count, index * 4);

            let path = config.save_path.join(format!(
                "{}{}_{chunk_x}_{chunk_z}_splatmap{index}.png",
                config.file_prefix, terrain.name
            ));
            formats::save_png(&splatmap, &path)?;

            paths.push(path);
        }
    }

    Ok(paths)
}
