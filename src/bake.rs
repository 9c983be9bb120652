//! Deferred baking of composite terrain textures.
//!
//! Baking a LOD texture renders a flat-shaded composite of all terrain
//! layers, weighted by the blend-weight stack. The operation is modeled as a
//! single-shot request: issuing returns a handle immediately, the composite
//! is produced when the baker is ticked, and the pixel payload (or a failure)
//! arrives through the handle's completion channel. Consumers must not
//! configure anything depending on the output before that completion.
//!
//! This also hosts the bounded retry gate used when a consumer needs a baked
//! texture file that may not have been materialized yet.

use crate::{
    material::MAX_MATERIAL_LAYERS,
    result::{ConversionError, ConversionResult},
    terrain::{Terrain, TerrainLayer},
};
use async_channel::{Receiver, Sender};
use glam::{Vec2, Vec3};
use image::RgbaImage;
use log::{error, warn};
use ndarray::Array3;
use slab::Slab;
use std::path::Path;

/// How often a consumer re-probes a texture file before giving up.
pub const MAX_TEXTURE_RETRIES: u32 = 10;

/// Re-probes `path` until it exists, waiting between attempts, at most
/// [`MAX_TEXTURE_RETRIES`] times. Exhausting the budget is a hard failure.
///
/// The existence probe and the wait hook are injected so callers can drive
/// the gate without real filesystem timing.
pub fn wait_for_file(
    path: &Path,
    probe: impl Fn(&Path) -> bool,
    mut wait: impl FnMut(u32),
) -> ConversionResult<()> {
    for attempt in 0..MAX_TEXTURE_RETRIES {
        if probe(path) {
            return Ok(());
        }

        warn!(
            "waiting for texture {} (retry {}/{MAX_TEXTURE_RETRIES})",
            path.display(),
            attempt + 1
        );
        wait(attempt);
    }

    error!("texture generation failed: {}", path.display());

    Err(ConversionError::RetriesExhausted {
        path: path.to_path_buf(),
        retries: MAX_TEXTURE_RETRIES,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakeKind {
    Albedo,
    Normal,
}

/// Everything one composite needs, detached from the source terrain so the
/// request stays valid until the baker gets around to it.
#[derive(Clone, Debug)]
pub struct CompositeInput {
    pub kind: BakeKind,
    pub resolution: u32,
    pub terrain_size: Vec3,
    pub layers: Vec<TerrainLayer>,
    pub alphamaps: Array3<f32>,
}

impl CompositeInput {
    pub fn from_terrain(terrain: &Terrain, kind: BakeKind, resolution: u32) -> Self {
        Self {
            kind,
            resolution,
            terrain_size: terrain.size,
            layers: terrain.layers.clone(),
            alphamaps: terrain.alphamaps.clone(),
        }
    }
}

struct PendingBake {
    input: CompositeInput,
    sender: Sender<ConversionResult<RgbaImage>>,
}

/// Completion side of one bake request.
pub struct BakeHandle {
    receiver: Receiver<ConversionResult<RgbaImage>>,
}

impl BakeHandle {
    /// The baked image if the request has completed.
    pub fn try_output(&self) -> Option<ConversionResult<RgbaImage>> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the completion. Only returns after the baker processed the
    /// request; a dropped baker reports the abandonment as a failure.
    pub fn output(&self) -> ConversionResult<RgbaImage> {
        self.receiver
            .recv_blocking()
            .unwrap_or_else(|_| Err(ConversionError::BakeFailed("bake request abandoned".into())))
    }
}

/// Schedules bake requests and completes them cooperatively on [`tick`].
///
/// [`tick`]: TextureBaker::tick
#[derive(Default)]
pub struct TextureBaker {
    pending: Slab<PendingBake>,
}

impl TextureBaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Registers a bake request and returns its completion handle.
    pub fn issue(&mut self, input: CompositeInput) -> BakeHandle {
        let (sender, receiver) = async_channel::bounded(1);

        self.pending.insert(PendingBake { input, sender });

        BakeHandle { receiver }
    }

    /// Processes every pending request and delivers the results. Returns the
    /// number of completed bakes.
    pub fn tick(&mut self) -> usize {
        let mut completed = 0;

        for job in self.pending.drain() {
            let result = composite(&job.input);

            // the consumer may have dropped its handle, nothing to deliver
            let _ = job.sender.try_send(result);
            completed += 1;
        }

        completed
    }
}

fn composite(input: &CompositeInput) -> ConversionResult<RgbaImage> {
    if input.resolution == 0 || input.alphamaps.is_empty() {
        return Err(ConversionError::BakeFailed("no alphamap data".into()));
    }

    if input.layers.is_empty() {
        error!("no terrain layers found");
        return Err(ConversionError::BakeFailed("no terrain layers".into()));
    }

    let resolution = input.resolution;
    let layer_count = input.layers.len().min(MAX_MATERIAL_LAYERS);

    let mut pixels = Vec::with_capacity((resolution * resolution) as usize);

    for y in 0..resolution {
        let v = (y as f32 + 0.5) / resolution as f32;

        for x in 0..resolution {
            let u = (x as f32 + 0.5) / resolution as f32;

            let pixel = match input.kind {
                BakeKind::Albedo => shade_albedo(input, layer_count, u, v),
                BakeKind::Normal => shade_normal(input, layer_count, u, v),
            };

            pixels.push(pixel);
        }
    }

    Ok(crate::formats::encode_bottom_up(&pixels, resolution))
}

fn shade_albedo(input: &CompositeInput, layer_count: usize, u: f32, v: f32) -> [f32; 4] {
    let mut color = [0.0; 3];

    for (index, layer) in input.layers[..layer_count].iter().enumerate() {
        let Some(diffuse) = &layer.diffuse else {
            continue;
        };

        let weight = sample_weights(&input.alphamaps, u, v, index);
        if weight == 0.0 {
            continue;
        }

        let scale = layer.uv_scale(input.terrain_size);
        let sample = sample_repeat(diffuse, Vec2::new(u, v) * scale);

        for channel in 0..3 {
            color[channel] += weight * sample[channel];
        }
    }

    [color[0], color[1], color[2], 1.0]
}

fn shade_normal(input: &CompositeInput, layer_count: usize, u: f32, v: f32) -> [f32; 4] {
    let mut accumulated = Vec3::ZERO;

    for (index, layer) in input.layers[..layer_count].iter().enumerate() {
        let Some(normal_map) = &layer.normal else {
            continue;
        };

        let weight = sample_weights(&input.alphamaps, u, v, index);
        if weight == 0.0 {
            continue;
        }

        let scale = layer.uv_scale(input.terrain_size);
        let sample = sample_repeat(normal_map, Vec2::new(u, v) * scale);

        let mut normal = Vec3::new(
            sample[0] * 2.0 - 1.0,
            sample[1] * 2.0 - 1.0,
            sample[2] * 2.0 - 1.0,
        );
        normal.x *= layer.normal_scale;
        normal.y *= layer.normal_scale;

        accumulated += weight * normal;
    }

    let normal = accumulated.normalize_or(Vec3::Z);

    [
        normal.x * 0.5 + 0.5,
        normal.y * 0.5 + 0.5,
        normal.z * 0.5 + 0.5,
        1.0,
    ]
}

/// Bilinear blend-weight lookup with border clamping.
fn sample_weights(alphamaps: &Array3<f32>, u: f32, v: f32, layer: usize) -> f32 {
    let (rows, cols, layers) = alphamaps.dim();

    if layer >= layers {
        return 0.0;
    }

    let fx = (u * (cols - 1) as f32).clamp(0.0, (cols - 1) as f32);
    let fz = (v * (rows - 1) as f32).clamp(0.0, (rows - 1) as f32);

    let x1 = fx.floor() as usize;
    let z1 = fz.floor() as usize;
    let x2 = (x1 + 1).min(cols - 1);
    let z2 = (z1 + 1).min(rows - 1);

    let tx = fx - x1 as f32;
    let tz = fz - z1 as f32;

    let bottom = alphamaps[[z1, x1, layer]] * (1.0 - tx) + alphamaps[[z1, x2, layer]] * tx;
    let top = alphamaps[[z2, x1, layer]] * (1.0 - tx) + alphamaps[[z2, x2, layer]] * tx;

    bottom * (1.0 - tz) + top * tz
}

/// Bilinear texture lookup with repeat wrapping, v = 0 at the bottom row.
fn sample_repeat(texture: &RgbaImage, uv: Vec2) -> [f32; 4] {
    let (width, height) = texture.dimensions();

    let fx = uv.x.rem_euclid(1.0) * width as f32 - 0.5;
    let fy = (1.0 - uv.y.rem_euclid(1.0)) * height as f32 - 0.5;

    let x1 = fx.floor() as i64;
    let y1 = fy.floor() as i64;
    let tx = fx - x1 as f32;
    let ty = fy - y1 as f32;

    let fetch = |x: i64, y: i64| -> [f32; 4] {
        let x = x.rem_euclid(width as i64) as u32;
        let y = y.rem_euclid(height as i64) as u32;
        let pixel = texture.get_pixel(x, y);

        [
            pixel[0] as f32 / 255.0,
            pixel[1] as f32 / 255.0,
            pixel[2] as f32 / 255.0,
            pixel[3] as f32 / 255.0,
        ]
    };

    let p11 = fetch(x1, y1);
    let p21 = fetch(x1 + 1, y1);
    let p12 = fetch(x1, y1 + 1);
    let p22 = fetch(x1 + 1, y1 + 1);

    std::array::from_fn(|channel| {
        let bottom = p11[channel] * (1.0 - tx) + p21[channel] * tx;
        let top = p12[channel] * (1.0 - tx) + p22[channel] * tx;

        bottom * (1.0 - ty) + top * ty
    })
}
