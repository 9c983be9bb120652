//! This crate converts heightfield terrains into renderable triangle meshes,
//! splatmaps and texture atlases, including level-of-detail variants.
//!
//! # Background
//! A painted heightfield terrain carries several kinds of data that a mesh
//! renderer cannot consume directly: the height grid itself, a stack of
//! per-layer blend weights and the layer textures. Conversion therefore runs
//! three largely independent pipelines:
//!
//! ## Geometry
//! The [`tessellate`] module turns the height grid into a regular grid mesh,
//! optionally subdivided into an N x N chunk grid by the [`split`] module
//! and reduced for distant views by the LOD tessellator, which extrudes a
//! skirt around each tile to hide the cracks between neighboring tiles of
//! different resolutions. Finished meshes leave as Wavefront OBJ files.
//!
//! ## Rasters
//! The [`splatmap`] module packs four blend-weight layers per RGBA image,
//! and the [`atlas`] module arranges the layer textures on a fixed-column
//! grid for indexed sampling. LOD tiles get a flat-shaded composite of all
//! layers, baked by the [`bake`] module through a deferred single-shot
//! request.
//!
//! ## Materials
//! The [`material`] module emits the string-keyed property surface the
//! downstream terrain shader expects, bound to the generated rasters by file
//! path.
//!
//! The [`pipeline`] entry points wire all of this together; one immutable
//! [`config::GenerationConfig`] describes a whole generation request.

pub mod atlas;
pub mod bake;
pub mod config;
pub mod formats;
pub mod heightfield;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod result;
pub mod splatmap;
pub mod split;
pub mod terrain;
pub mod tessellate;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        atlas::{build_atlas, AtlasLayout},
        bake::{BakeHandle, BakeKind, CompositeInput, TextureBaker},
        config::GenerationConfig,
        formats::{heightmap::load_heightfield, obj::save_mesh_as_obj},
        heightfield::Heightfield,
        material::{Material, MaterialValue},
        mesh::Mesh,
        pipeline::{generate_atlases, generate_lod, generate_meshes, MeshArtifact},
        result::{ConversionError, ConversionResult},
        splatmap::pack_layers,
        split::SplitSpec,
        terrain::{Terrain, TerrainLayer},
        tessellate::{tessellate, tessellate_with_skirt},
    };
}
