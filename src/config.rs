//! The immutable configuration of one generation request.
//!
//! Everything the pipeline entry points need — output paths, naming, split
//! and LOD settings — travels in a [`GenerationConfig`] value; the pipeline
//! itself is a pure function of the terrain inputs and this configuration.

use crate::tessellate;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GenerationConfig {
    pub save_path: PathBuf,

    /// Prefix of full-detail mesh/material/splatmap artifacts.
    pub file_prefix: String,
    /// Base name of the atlas artifacts.
    pub base_name: String,
    pub albedo_suffix: String,
    pub normal_suffix: String,

    /// Tessellation resolution; derived from the heightmap when absent.
    pub mesh_resolution: Option<u32>,
    /// Caps the splatmap resolution; native alphamap resolution when absent.
    pub splatmap_size: Option<u32>,
    /// Side length of one atlas tile.
    pub texture_size: u32,

    pub split: bool,
    pub split_count: u32,
    /// Whether split chunks share one material and texture space.
    pub same_material: bool,

    pub shader: String,
    pub lod_shader: String,

    /// Prefix of LOD artifacts.
    pub lod_prefix: String,
    pub lod_level: u32,
    pub lod_texture: bool,
    pub lod_normal_texture: bool,
    pub lod_texture_size: u32,
    pub lod_mesh_split: bool,
    pub lod_texture_split: bool,

    pub y_offset: f32,
    pub skirt: bool,
    pub skirt_depth: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("generated"),
            file_prefix: "terrain_".to_string(),
            base_name: "TerrainTextureArray".to_string(),
            albedo_suffix: "_Albedo".to_string(),
            normal_suffix: "_Normal".to_string(),
            mesh_resolution: None,
            splatmap_size: None,
            texture_size: 512,
            split: false,
            split_count: 2,
            same_material: true,
            shader: "Shader Graphs/TerrainMeshSplatmap".to_string(),
            lod_shader: "Universal Render Pipeline/Lit".to_string(),
            lod_prefix: "LOD1_".to_string(),
            lod_level: 3,
            lod_texture: true,
            lod_normal_texture: true,
            lod_texture_size: 128,
            lod_mesh_split: false,
            lod_texture_split: true,
            y_offset: 0.0,
            skirt: true,
            skirt_depth: 20.0,
        }
    }
}

impl GenerationConfig {
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    pub fn save_file(&self, path: &Path) -> Result<()> {
        if let Some(directory) = path.parent() {
            fs::create_dir_all(directory)?;
        }

        let contents = ron::ser::to_string_pretty(self, Default::default())?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// The tessellation resolution for a terrain with the given heightmap
    /// sample count: the configured override, or the sample count rounded to
    /// the next power of two and halved (65x65 samples tessellate at 64).
    pub fn mesh_resolution_for(&self, heightmap_resolution: u32) -> u32 {
        self.mesh_resolution
            .unwrap_or_else(|| tessellate::base_resolution(heightmap_resolution))
    }

    /// The splatmap resolution: the native alphamap resolution, optionally
    /// capped by the configured size.
    pub fn splatmap_resolution(&self, native_resolution: u32) -> u32 {
        match self.splatmap_size {
            Some(size) => size.min(native_resolution),
            None => native_resolution,
        }
    }

    /// Artifact name of a full-detail terrain: `{prefix}{terrain}`.
    pub fn artifact_name(&self, terrain_name: &str) -> String {
        format!("{}{terrain_name}", self.file_prefix)
    }

    /// Artifact name of a LOD terrain: `{lodPrefix}{terrain}`.
    pub fn lod_artifact_name(&self, terrain_name: &str) -> String {
        format!("{}{terrain_name}", self.lod_prefix)
    }

    /// Appends the `_x_z` chunk suffix to an artifact name.
    pub fn chunk_name(name: &str, chunk_x: u32, chunk_z: u32) -> String {
        format!("{name}_{chunk_x}_{chunk_z}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_round_trip_preserves_the_request() {
        let path = std::env::temp_dir().join("terrain_to_mesh_config.ron");

        let mut config = GenerationConfig::default();
        config.split = true;
        config.split_count = 4;
        config.lod_level = 2;
        config.splatmap_size = Some(256);

        config.save_file(&path).unwrap();
        let loaded = GenerationConfig::load_file(&path).unwrap();

        assert!(loaded.split);
        assert_eq!(loaded.split_count, 4);
        assert_eq!(loaded.lod_level, 2);
        assert_eq!(loaded.splatmap_size, Some(256));
        assert_eq!(loaded.file_prefix, "terrain_");
    }

    #[test]
    fn mesh_resolution_defaults_to_the_halved_power_of_two() {
        let config = GenerationConfig::default();

        assert_eq!(config.mesh_resolution_for(65), 64);
        assert_eq!(config.mesh_resolution_for(513), 512);
        assert_eq!(
            GenerationConfig {
                mesh_resolution: Some(128),
                ..Default::default()
            }
            .mesh_resolution_for(65),
            128
        );
    }

    #[test]
    fn splatmap_resolution_caps_at_the_native_size() {
        let config = GenerationConfig {
            splatmap_size: Some(512),
            ..Default::default()
        };

        assert_eq!(config.splatmap_resolution(1024), 512);
        assert_eq!(config.splatmap_resolution(256), 256);
        assert_eq!(GenerationConfig::default().splatmap_resolution(1024), 1024);
    }

    #[test]
    fn chunk_names_carry_the_coordinate_suffix() {
        let config = GenerationConfig::default();

        assert_eq!(config.artifact_name("hills"), "terrain_hills");
        assert_eq!(
            GenerationConfig::chunk_name(&config.lod_artifact_name("hills"), 1, 3),
            "LOD1_hills_1_3"
        );
    }
}
