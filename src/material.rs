//! The string-keyed material property surface consumed by the downstream
//! renderer.
//!
//! Property keys follow the shader binding names of the terrain material
//! exactly; a material is persisted as a RON artifact next to the geometry it
//! belongs to.

use crate::{
    bake,
    config::GenerationConfig,
    result::ConversionResult,
    terrain::TerrainLayer,
};
use anyhow::Result;
use derive_more::From;
use glam::{Vec3, Vec4};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

/// The number of layer slots the terrain material exposes.
pub const MAX_MATERIAL_LAYERS: usize = 8;

#[derive(Serialize, Deserialize, From, Clone, Debug, PartialEq)]
pub enum MaterialValue {
    Float(f32),
    Vector(Vec4),
    Texture(PathBuf),
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Material {
    pub name: String,
    pub shader: String,
    properties: BTreeMap<String, MaterialValue>,
    keywords: BTreeSet<String>,
}

impl Material {
    pub fn new(name: &str, shader: &str) -> Self {
        Self {
            name: name.to_string(),
            shader: shader.to_string(),
            properties: BTreeMap::new(),
            keywords: BTreeSet::new(),
        }
    }

    pub fn set_float(&mut self, key: &str, value: f32) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn set_vector(&mut self, key: &str, value: Vec4) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn set_texture(&mut self, key: &str, path: PathBuf) {
        self.properties.insert(key.to_string(), path.into());
    }

    pub fn get(&self, key: &str) -> Option<&MaterialValue> {
        self.properties.get(key)
    }

    pub fn enable_keyword(&mut self, keyword: &str) {
        self.keywords.insert(keyword.to_string());
    }

    pub fn disable_keyword(&mut self, keyword: &str) {
        self.keywords.remove(keyword);
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    /// Writes the material as `{save_path}/{name}.mat.ron` and returns the
    /// file path.
    pub fn save_file(&self, save_path: &Path) -> Result<PathBuf> {
        fs::create_dir_all(save_path)?;
        let path = save_path.join(format!("{}.mat.ron", self.name));

        let contents = ron::ser::to_string_pretty(self, Default::default())?;
        fs::write(&path, contents)?;

        info!("material created at: {}", path.display());

        Ok(path)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }
}

/// Binds the terrain's splatmaps as `_T2M_SplatMap_{i}`. A missing splatmap
/// file is reported and skipped, the material stays usable.
pub fn assign_splatmaps(
    material: &mut Material,
    save_path: &Path,
    base_name: &str,
    splatmap_count: usize,
) {
    for index in 0..splatmap_count {
        let path = save_path.join(format!("{base_name}_splatmap{index}.png"));

        if path.exists() {
            material.set_texture(&format!("_T2M_SplatMap_{index}"), path);
        } else {
            warn!("splatmap texture not found: {}", path.display());
        }
    }
}

/// Binds the albedo and normal atlases as `_ArrayAlbedo` / `_ArrayNormal`.
pub fn assign_texture_arrays(material: &mut Material, config: &GenerationConfig) {
    for (suffix, key) in [
        (&config.albedo_suffix, "_ArrayAlbedo"),
        (&config.normal_suffix, "_ArrayNormal"),
    ] {
        let path = config
            .save_path
            .join(format!("{}{}.png", config.base_name, suffix));

        if path.exists() {
            material.set_texture(key, path);
        } else {
            warn!("texture array not found: {}", path.display());
        }
    }
}

/// Fills the eight layer slots with normal scales and atlas indices. Layers
/// without an atlas entry and empty slots bind the index -1.
pub fn configure_terrain_layers(
    material: &mut Material,
    layers: &[TerrainLayer],
    layer_index_map: &HashMap<String, usize>,
    normal_strength: f32,
) {
    material.set_float("_NormalStrength", normal_strength);

    if layers.len() > MAX_MATERIAL_LAYERS {
        warn!(
            "terrain has {} layers; only the first {MAX_MATERIAL_LAYERS} are bound",
            layers.len()
        );
    }

    for slot in 0..MAX_MATERIAL_LAYERS {
        let scale_key = format!("_T2M_Layer_{slot}_NormalScale");
        let index_key = format!("_TerrainLayer{slot}");

        match layers.get(slot) {
            Some(layer) => {
                material.set_float(&scale_key, layer.normal_scale);

                match layer_index_map.get(&layer.name) {
                    Some(&index) => material.set_float(&index_key, index as f32),
                    None => {
                        warn!("layer '{}' not found in the texture atlas", layer.name);
                        material.set_float(&index_key, -1.0);
                    }
                }
            }
            None => {
                material.set_float(&scale_key, 1.0);
                material.set_float(&index_key, -1.0);
            }
        }
    }
}

/// Binds the per-layer UV scale/offset vectors `_T2M_Layer_{i}_uvScaleOffset`.
/// The tiling scale shrinks with the split count so chunk-local UVs keep the
/// world-space tiling.
pub fn assign_uv_scale_offset(
    material: &mut Material,
    layers: &[TerrainLayer],
    terrain_size: Vec3,
    split_count: u32,
) {
    for (slot, layer) in layers.iter().enumerate() {
        if slot >= MAX_MATERIAL_LAYERS {
            warn!("supported layer count exceeded; only the first {MAX_MATERIAL_LAYERS} are bound");
            break;
        }

        let scale = layer.uv_scale(terrain_size) / split_count as f32;

        material.set_vector(
            &format!("_T2M_Layer_{slot}_uvScaleOffset"),
            Vec4::new(scale.x, scale.y, layer.tile_offset.x, layer.tile_offset.y),
        );
    }
}

/// Configures a LOD material from its baked textures.
///
/// The base map may still be materializing when this runs, so its existence
/// is probed through the bounded retry gate; running out of retries fails
/// the configuration. Normal and smoothness maps are optional.
pub fn configure_lod_material(
    material: &mut Material,
    save_path: &Path,
    texture_name: &str,
    lod_normal_texture: bool,
    probe: impl Fn(&Path) -> bool,
    wait: impl FnMut(u32),
) -> ConversionResult<()> {
    let base_path = save_path.join(format!("{texture_name}_AL.png"));
    let normal_path = save_path.join(format!("{texture_name}_NO.png"));
    let metallic_path = save_path.join(format!("{texture_name}_MS.png"));

    bake::wait_for_file(&base_path, &probe, wait)?;

    material.set_texture("_BaseMap", base_path);
    material.set_float("_Smoothness", 1.0);

    if lod_normal_texture {
        if probe(&normal_path) {
            material.set_texture("_BumpMap", normal_path);
        } else {
            warn!("normal texture not found: {}", normal_path.display());
        }
    }

    if probe(&metallic_path) {
        material.set_float("_SmoothnessTextureChannel", 0.0);
        material.enable_keyword("_METALLICSPECGLOSSMAP");
        material.disable_keyword("_SMOOTHNESS_TEXTURE_ALBEDO_CHANNEL_A");
    } else {
        material.set_float("_SmoothnessTextureChannel", 1.0);
        material.enable_keyword("_SMOOTHNESS_TEXTURE_ALBEDO_CHANNEL_A");
        material.disable_keyword("_METALLICSPECGLOSSMAP");
    }

    Ok(())
}
