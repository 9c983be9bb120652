//! The generation entry points tying tessellation, packing, baking and
//! export together.
//!
//! Every entry point is a pure function of the terrain inputs and a
//! [`GenerationConfig`]; the durable artifacts are the files written along
//! the way. The pipeline is not transactional: artifacts of completed steps
//! stay on disk when a later step fails.

use crate::{
    atlas,
    bake::{BakeKind, CompositeInput, TextureBaker},
    config::GenerationConfig,
    formats::{self, obj::save_mesh_as_obj},
    material::{self, Material},
    result::{ConversionError, ConversionResult},
    splatmap,
    split::{self, SplitSpec},
    terrain::Terrain,
    tessellate::{self, tessellate, tessellate_with_skirt},
};
use glam::{Vec2, Vec3};
use log::{info, warn};
use std::{collections::HashMap, path::Path, path::PathBuf};

/// One generated mesh with its material binding and world placement.
#[derive(Clone, Debug)]
pub struct MeshArtifact {
    pub name: String,
    pub mesh_path: PathBuf,
    pub material_path: Option<PathBuf>,
    /// Offset of the artifact relative to the terrain origin.
    pub world_origin: Vec3,
}

/// Generates the texture atlases for the unique layers of all terrains.
pub fn generate_atlases(
    terrains: &[&Terrain],
    config: &GenerationConfig,
) -> ConversionResult<Vec<(PathBuf, atlas::AtlasLayout)>> {
    let layers = atlas::collect_unique_layers(terrains);

    atlas::generate_texture_atlases(&layers, config)
}

/// The full-detail conversion: splatmaps plus meshes and materials for every
/// terrain, split into chunks when configured for a single terrain.
pub fn generate_meshes(
    terrains: &[&Terrain],
    config: &GenerationConfig,
) -> ConversionResult<Vec<MeshArtifact>> {
    let layers = atlas::collect_unique_layers(terrains);
    let layer_index_map = atlas::layer_index_map(&layers);

    let split = terrains.len() == 1 && config.split;

    let mut artifacts = Vec::new();

    for terrain in terrains {
        if split && !config.same_material {
            splatmap::generate_split_splatmaps(
                terrain,
                &SplitSpec::new(config.split_count),
                config,
            )?;
        } else {
            splatmap::generate_splatmaps(terrain, config)?;
        }

        if split {
            artifacts.extend(generate_split_meshes(terrain, config, &layer_index_map)?);
        } else {
            artifacts.push(generate_single_mesh(terrain, config, &layer_index_map)?);
        }

        info!(
            "mesh and material created for terrain '{}' at: {}",
            terrain.name,
            config.save_path.display()
        );
    }

    Ok(artifacts)
}

/// Tessellates one terrain at full detail and emits its mesh and material.
pub fn generate_single_mesh(
    terrain: &Terrain,
    config: &GenerationConfig,
    layer_index_map: &HashMap<String, usize>,
) -> ConversionResult<MeshArtifact> {
    let resolution = config.mesh_resolution_for(terrain.heightmap_resolution());
    let name = config.artifact_name(&terrain.name);

    let mesh = tessellate(resolution, terrain.size, |u, v| {
        terrain.interpolated_height(u, v)
    });

    let mesh_path = save_mesh_as_obj(&mesh, &config.save_path, &name)?;

    let mut material = Material::new(&name, &config.shader);
    bind_terrain_material(&mut material, terrain, config, layer_index_map, &name, 1);
    let material_path = material.save_file(&config.save_path).ok();

    Ok(MeshArtifact {
        name,
        mesh_path,
        material_path,
        world_origin: Vec3::ZERO,
    })
}

/// Splits one terrain into chunk meshes. With a shared material the chunk
/// UVs are rebased onto the combined texture space; otherwise every chunk
/// gets its own material over its own splatmaps.
pub fn generate_split_meshes(
    terrain: &Terrain,
    config: &GenerationConfig,
    layer_index_map: &HashMap<String, usize>,
) -> ConversionResult<Vec<MeshArtifact>> {
    let spec = SplitSpec::new(config.split_count);
    let extent = spec.chunk_extent(terrain.size);
    let chunk_resolution = spec.chunk_resolution(terrain.heightmap_resolution());
    let chunk_size = Vec3::new(extent.x, terrain.size.y, extent.y);

    let base_name = config.artifact_name(&terrain.name);

    let shared_material_path = if config.same_material {
        let mut material = Material::new(&base_name, &config.shader);
        bind_terrain_material(&mut material, terrain, config, layer_index_map, &base_name, 1);
        material.save_file(&config.save_path).ok()
    } else {
        None
    };

    let mut artifacts = Vec::new();

    for (chunk_x, chunk_z) in spec.chunks() {
        let heights = split::split_heightfield_region(&terrain.heightfield, &spec, chunk_x, chunk_z)?;

        let mut mesh = tessellate(chunk_resolution, chunk_size, |u, v| {
            heights.sample(u, v) * terrain.size.y
        });

        if config.same_material {
            mesh.remap_uv_for_chunk(chunk_x, chunk_z, spec.split_count());
        }

        let chunk_name = GenerationConfig::chunk_name(&base_name, chunk_x, chunk_z);
        let mesh_path = save_mesh_as_obj(&mesh, &config.save_path, &chunk_name)?;

        let material_path = match &shared_material_path {
            Some(path) => Some(path.clone()),
            None => {
                let mut material = Material::new(&chunk_name, &config.shader);
                bind_terrain_material(
                    &mut material,
                    terrain,
                    config,
                    layer_index_map,
                    &chunk_name,
                    spec.split_count(),
                );
                material.save_file(&config.save_path).ok()
            }
        };

        info!("chunk created: {chunk_name}");

        artifacts.push(MeshArtifact {
            name: chunk_name,
            mesh_path,
            material_path,
            world_origin: spec.chunk_origin(chunk_x, chunk_z, terrain.size),
        });
    }

    Ok(artifacts)
}

fn bind_terrain_material(
    material: &mut Material,
    terrain: &Terrain,
    config: &GenerationConfig,
    layer_index_map: &HashMap<String, usize>,
    splatmap_base_name: &str,
    split_count: u32,
) {
    material::assign_splatmaps(
        material,
        &config.save_path,
        splatmap_base_name,
        splatmap::splatmap_count(terrain.layer_count()),
    );
    material::assign_texture_arrays(material, config);
    material::configure_terrain_layers(material, &terrain.layers, layer_index_map, 1.0);
    material::assign_uv_scale_offset(material, &terrain.layers, terrain.size, split_count);
}

/// The LOD conversion: baked textures and skirted low-resolution meshes,
/// split into chunks when configured for a single terrain.
pub fn generate_lod(
    terrains: &[&Terrain],
    config: &GenerationConfig,
    baker: &mut TextureBaker,
) -> ConversionResult<Vec<MeshArtifact>> {
    if terrains.is_empty() {
        warn!("no terrains available for LOD generation");
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();

    for terrain in terrains {
        let split = terrains.len() == 1 && config.lod_mesh_split;

        if config.lod_texture {
            if split && config.lod_texture_split {
                generate_lod_split_textures(terrain, config, baker)?;
            } else {
                generate_lod_textures(terrain, config, baker)?;
            }
        }

        if split {
            artifacts.extend(generate_lod_split_meshes(terrain, config)?);
        } else {
            artifacts.push(generate_lod_mesh(terrain, config)?);
        }
    }

    info!("LOD generation completed for all terrains");

    Ok(artifacts)
}

/// Tessellates the skirted LOD mesh of one terrain and wires its material.
pub fn generate_lod_mesh(
    terrain: &Terrain,
    config: &GenerationConfig,
) -> ConversionResult<MeshArtifact> {
    let base_resolution = config.mesh_resolution_for(terrain.heightmap_resolution());
    let resolution = tessellate::lod_resolution(base_resolution, config.lod_level);
    let name = config.lod_artifact_name(&terrain.name);

    let mesh = tessellate_with_skirt(
        resolution,
        terrain.size,
        config.y_offset,
        config.skirt.then_some(config.skirt_depth),
        |u, v| terrain.height_and_normal(u, v),
    );

    let mesh_path = save_mesh_as_obj(&mesh, &config.save_path, &name)?;
    let material_path = lod_material(config, &name, &name)?;

    info!("LOD {} created for terrain: {}", config.lod_level, terrain.name);

    Ok(MeshArtifact {
        name,
        mesh_path,
        material_path,
        world_origin: Vec3::ZERO,
    })
}

/// Splits one terrain into skirted LOD chunk meshes.
pub fn generate_lod_split_meshes(
    terrain: &Terrain,
    config: &GenerationConfig,
) -> ConversionResult<Vec<MeshArtifact>> {
    let spec = SplitSpec::new(config.split_count);
    let extent = spec.chunk_extent(terrain.size);
    let chunk_resolution = spec.chunk_resolution(terrain.heightmap_resolution());
    let chunk_size = Vec3::new(extent.x, terrain.size.y, extent.y);

    let base_name = config.lod_artifact_name(&terrain.name);

    // one material for all chunks unless every chunk got its own texture set
    let shared_material_path = if !(config.lod_texture && config.lod_texture_split) {
        lod_material(config, &base_name, &base_name)?
    } else {
        None
    };

    let mut artifacts = Vec::new();

    for (chunk_x, chunk_z) in spec.chunks() {
        let heights = split::split_heightfield_region(&terrain.heightfield, &spec, chunk_x, chunk_z)?;
        let resolution = tessellate::lod_resolution(chunk_resolution, config.lod_level);

        let (uv_min, uv_max) = spec.uv_bounds(chunk_x, chunk_z);
        let uv_extent = uv_max - uv_min;

        let mut mesh = tessellate_with_skirt(
            resolution,
            chunk_size,
            config.y_offset,
            config.skirt.then_some(config.skirt_depth),
            |u, v| {
                let world_uv = uv_min + Vec2::new(u, v) * uv_extent;

                (
                    heights.sample(u, v) * terrain.size.y,
                    terrain.interpolated_normal(world_uv.x, world_uv.y),
                )
            },
        );

        if !(config.lod_texture && config.lod_texture_split) {
            mesh.remap_uv_for_chunk(chunk_x, chunk_z, spec.split_count());
        }

        let chunk_name = GenerationConfig::chunk_name(&base_name, chunk_x, chunk_z);
        let mesh_path = save_mesh_as_obj(&mesh, &config.save_path, &chunk_name)?;

        let material_path = if config.lod_texture && config.lod_texture_split {
            lod_material(config, &chunk_name, &chunk_name)?
        } else {
            shared_material_path.clone()
        };

        info!("LOD chunk created: {chunk_name}");

        artifacts.push(MeshArtifact {
            name: chunk_name,
            mesh_path,
            material_path,
            world_origin: spec.chunk_origin(chunk_x, chunk_z, terrain.size),
        });
    }

    Ok(artifacts)
}

/// Creates or reuses the material of a LOD artifact.
///
/// With LOD textures enabled a fresh material is configured from the baked
/// texture files; otherwise the full-detail terrain material is reused and a
/// missing one only costs the binding.
fn lod_material(
    config: &GenerationConfig,
    material_name: &str,
    texture_name: &str,
) -> ConversionResult<Option<PathBuf>> {
    if config.lod_texture {
        let mut material = Material::new(material_name, &config.lod_shader);

        material::configure_lod_material(
            &mut material,
            &config.save_path,
            texture_name,
            config.lod_normal_texture,
            Path::exists,
            |_| {},
        )?;

        Ok(material.save_file(&config.save_path).ok())
    } else {
        let stripped = material_name.replacen(&config.lod_prefix, "", 1);
        let path = config
            .save_path
            .join(format!("{}{}.mat.ron", config.file_prefix, stripped));

        if path.exists() {
            Ok(Some(path))
        } else {
            warn!("material not found: {}", path.display());
            Ok(None)
        }
    }
}

/// Bakes the composite LOD textures of one terrain and writes them as
/// `{lodPrefix}{terrain}_AL.png` / `_NO.png`.
pub fn generate_lod_textures(
    terrain: &Terrain,
    config: &GenerationConfig,
    baker: &mut TextureBaker,
) -> ConversionResult<Vec<PathBuf>> {
    let name = config.lod_artifact_name(&terrain.name);
    let (albedo, normal) = bake_composites(terrain, config.lod_texture_size, config, baker)?;

    let mut paths = Vec::new();

    let albedo_path = config.save_path.join(format!("{name}_AL.png"));
    formats::save_png(&albedo, &albedo_path)?;
    paths.push(albedo_path);

    if let Some(normal) = normal {
        let normal_path = config.save_path.join(format!("{name}_NO.png"));
        formats::save_png(&normal, &normal_path)?;
        paths.push(normal_path);
    }

    info!("LOD texture generation completed for: {}", terrain.name);

    Ok(paths)
}

/// Bakes the full-terrain composites once and cuts them into per-chunk
/// textures `{lodPrefix}{terrain}_{x}_{z}_AL.png` / `_NO.png`.
pub fn generate_lod_split_textures(
    terrain: &Terrain,
    config: &GenerationConfig,
    baker: &mut TextureBaker,
) -> ConversionResult<Vec<PathBuf>> {
    let spec = SplitSpec::new(config.split_count);
    let chunk_resolution = config.lod_texture_size / spec.split_count();

    if chunk_resolution == 0 {
        return Err(ConversionError::ResolutionTooSmall { resolution: 0 });
    }

    let base_name = config.lod_artifact_name(&terrain.name);
    let (albedo, normal) = bake_composites(terrain, config.lod_texture_size, config, baker)?;

    let mut paths = Vec::new();

    for (chunk_x, chunk_z) in spec.chunks() {
        let albedo_chunk = split::extract_chunk_texture(&albedo, chunk_resolution, chunk_x, chunk_z);
        let albedo_path = config
            .save_path
            .join(format!("{base_name}_{chunk_x}_{chunk_z}_AL.png"));
        formats::save_png(&albedo_chunk, &albedo_path)?;
        paths.push(albedo_path);

        if let Some(normal) = &normal {
            let normal_chunk =
                split::extract_chunk_texture(normal, chunk_resolution, chunk_x, chunk_z);
            let normal_path = config
                .save_path
                .join(format!("{base_name}_{chunk_x}_{chunk_z}_NO.png"));
            formats::save_png(&normal_chunk, &normal_path)?;
            paths.push(normal_path);
        }
    }

    Ok(paths)
}

/// Issues the albedo (and optionally normal) bake requests, drives the baker
/// and collects the completed composites.
fn bake_composites(
    terrain: &Terrain,
    resolution: u32,
    config: &GenerationConfig,
    baker: &mut TextureBaker,
) -> ConversionResult<(image::RgbaImage, Option<image::RgbaImage>)> {
    let albedo_handle = baker.issue(CompositeInput::from_terrain(
        terrain,
        BakeKind::Albedo,
        resolution,
    ));
    let normal_handle = config.lod_normal_texture.then(|| {
        baker.issue(CompositeInput::from_terrain(
            terrain,
            BakeKind::Normal,
            resolution,
        ))
    });

    while baker.pending_count() > 0 {
        baker.tick();
    }

    let albedo = albedo_handle.output()?;
    let normal = normal_handle.map(|handle| handle.output()).transpose()?;

    Ok((albedo, normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::tests::test_terrain;
    use crate::terrain::TerrainLayer;
    use image::{Rgba, RgbaImage};
    use std::fs;

    fn textured_terrain() -> Terrain {
        let mut terrain = test_terrain(2);
        terrain.layers = vec![
            TerrainLayer {
                name: "grass".to_string(),
                diffuse: Some(RgbaImage::from_pixel(4, 4, Rgba([60, 120, 30, 255]))),
                normal: Some(RgbaImage::from_pixel(4, 4, Rgba([128, 128, 255, 255]))),
                tile_size: Vec2::splat(25.0),
                tile_offset: Vec2::ZERO,
                normal_scale: 1.0,
            },
            TerrainLayer {
                name: "rock".to_string(),
                diffuse: Some(RgbaImage::from_pixel(4, 4, Rgba([90, 80, 70, 255]))),
                normal: None,
                tile_size: Vec2::splat(10.0),
                tile_offset: Vec2::ZERO,
                normal_scale: 0.5,
            },
        ];
        terrain
    }

    fn config_in(test: &str) -> GenerationConfig {
        let _ = env_logger::builder().is_test(true).try_init();

        let save_path = std::env::temp_dir().join(format!("terrain_to_mesh_pipeline_{test}"));
        let _ = fs::remove_dir_all(&save_path);

        GenerationConfig {
            save_path,
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn single_terrain_produces_mesh_material_and_splatmap() {
        let terrain = textured_terrain();
        let config = config_in("single");

        let artifacts = generate_meshes(&[&terrain], &config).unwrap();

        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].mesh_path.exists());
        assert!(artifacts[0].material_path.as_ref().unwrap().exists());
        assert!(config.save_path.join("terrain_hills_splatmap0.png").exists());
        assert_eq!(artifacts[0].world_origin, Vec3::ZERO);
    }

    #[test]
    fn split_with_shared_material_remaps_chunk_uvs() {
        let terrain = textured_terrain();
        let config = GenerationConfig {
            split: true,
            split_count: 2,
            same_material: true,
            ..config_in("split_shared")
        };

        let artifacts = generate_meshes(&[&terrain], &config).unwrap();

        assert_eq!(artifacts.len(), 4);
        // all chunks reference the one shared material
        let shared = artifacts[0].material_path.clone().unwrap();
        assert!(artifacts
            .iter()
            .all(|artifact| artifact.material_path.as_deref() == Some(shared.as_path())));
        assert_eq!(
            artifacts[3].world_origin,
            Vec3::new(50.0, 0.0, 50.0)
        );
        assert!(config.save_path.join("terrain_hills_1_0.obj").exists());
    }

    #[test]
    fn split_with_separate_materials_writes_chunk_splatmaps() {
        let terrain = textured_terrain();
        let config = GenerationConfig {
            split: true,
            split_count: 2,
            same_material: false,
            ..config_in("split_separate")
        };

        let artifacts = generate_meshes(&[&terrain], &config).unwrap();

        assert_eq!(artifacts.len(), 4);
        assert!(config
            .save_path
            .join("terrain_hills_0_1_splatmap0.png")
            .exists());
        assert!(config
            .save_path
            .join("terrain_hills_0_1.mat.ron")
            .exists());
    }

    #[test]
    fn lod_generation_bakes_textures_then_meshes() {
        let terrain = textured_terrain();
        let config = config_in("lod");
        let mut baker = TextureBaker::new();

        let artifacts = generate_lod(&[&terrain], &config, &mut baker).unwrap();

        assert_eq!(artifacts.len(), 1);
        assert!(config.save_path.join("LOD1_hills_AL.png").exists());
        assert!(config.save_path.join("LOD1_hills_NO.png").exists());
        assert!(config.save_path.join("LOD1_hills.obj").exists());

        let material =
            Material::load_file(&config.save_path.join("LOD1_hills.mat.ron")).unwrap();
        assert!(material.get("_BaseMap").is_some());
        assert!(material.get("_BumpMap").is_some());
    }

    #[test]
    fn lod_split_generates_chunk_textures_and_meshes() {
        let terrain = textured_terrain();
        let config = GenerationConfig {
            lod_mesh_split: true,
            lod_texture_split: true,
            split_count: 2,
            lod_texture_size: 64,
            ..config_in("lod_split")
        };
        let mut baker = TextureBaker::new();

        let artifacts = generate_lod(&[&terrain], &config, &mut baker).unwrap();

        assert_eq!(artifacts.len(), 4);
        for (x, z) in [(0, 0), (1, 1)] {
            assert!(config
                .save_path
                .join(format!("LOD1_hills_{x}_{z}_AL.png"))
                .exists());
            assert!(config
                .save_path
                .join(format!("LOD1_hills_{x}_{z}.obj"))
                .exists());
        }
    }

    #[test]
    fn lod_without_textures_reuses_the_terrain_material() {
        let terrain = textured_terrain();
        let config = GenerationConfig {
            lod_texture: false,
            ..config_in("lod_reuse")
        };

        // full-detail pass first, its material is the one to reuse
        generate_meshes(&[&terrain], &config).unwrap();

        let mut baker = TextureBaker::new();
        let artifacts = generate_lod(&[&terrain], &config, &mut baker).unwrap();

        assert_eq!(
            artifacts[0].material_path,
            Some(config.save_path.join("terrain_hills.mat.ron"))
        );
    }

    #[test]
    fn atlases_cover_albedo_and_normal() {
        let terrain = textured_terrain();
        let config = GenerationConfig {
            texture_size: 8,
            ..config_in("atlas")
        };

        let outputs = generate_atlases(&[&terrain], &config).unwrap();

        assert_eq!(outputs.len(), 2);
        assert!(config
            .save_path
            .join("TerrainTextureArray_Albedo.png")
            .exists());
        assert!(config
            .save_path
            .join("TerrainTextureArray_Normal.png")
            .exists());
        assert_eq!(outputs[0].1.columns, 2);
        assert_eq!(outputs[0].1.rows, 1);
    }
}
