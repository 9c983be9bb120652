//! The mesh data model shared by all generation paths.
//!
//! Vertices live on a regular grid with the index convention
//! `i = x + z * (resolution + 1)`; the skirt and split logic depend on this
//! layout and reference boundary rows/columns through it.

use crate::result::{ConversionError, ConversionResult};
use glam::{Vec2, Vec3};
use log::error;

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Option<Vec<Vec3>>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks the structural invariants: equal-length attribute streams and
    /// every triangle index in range.
    pub fn validate(&self) -> ConversionResult<()> {
        let count = self.positions.len();

        let attributes_match = self.uvs.len() == count
            && self.normals.as_ref().is_none_or(|normals| normals.len() == count);

        let indices_valid = self.indices.len() % 3 == 0
            && self.indices.iter().all(|&index| (index as usize) < count);

        if attributes_match && indices_valid {
            Ok(())
        } else {
            error!(
                "invalid mesh: {} vertices, {} uvs, {} indices",
                count,
                self.uvs.len(),
                self.indices.len()
            );
            Err(ConversionError::InvalidInput)
        }
    }

    /// Recomputes vertex normals from the face geometry, area-weighted.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for triangle in self.indices.chunks_exact(3) {
            let a = self.positions[triangle[0] as usize];
            let b = self.positions[triangle[1] as usize];
            let c = self.positions[triangle[2] as usize];

            // cross product length weighs large faces stronger
            let face_normal = (b - a).cross(c - a);

            for &index in triangle {
                normals[index as usize] += face_normal;
            }
        }

        for normal in &mut normals {
            *normal = normal.normalize_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    /// Rebases every UV from the local `[0, 1]` range onto the chunk's
    /// sub-rectangle of the shared texture space.
    ///
    /// Only meaningful when all chunks sample one shared material; chunks with
    /// per-chunk textures keep their local UVs.
    pub fn remap_uv_for_chunk(&mut self, chunk_x: u32, chunk_z: u32, split_count: u32) {
        let scale = 1.0 / split_count as f32;
        let offset = Vec2::new(chunk_x as f32, chunk_z as f32) * scale;

        for uv in &mut self.uvs {
            *uv = offset + *uv * scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
            ],
            normals: None,
            indices: vec![0, 2, 3, 0, 3, 1],
        }
    }

    #[test]
    fn flat_grid_normals_point_up() {
        let mut mesh = quad();
        mesh.recalculate_normals();

        for normal in mesh.normals.unwrap() {
            assert!((normal - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut mesh = quad();
        mesh.indices[0] = 4;

        assert!(mesh.validate().is_err());
    }

    #[test]
    fn mismatched_uv_stream_is_rejected() {
        let mut mesh = quad();
        mesh.uvs.pop();

        assert!(mesh.validate().is_err());
    }

    #[test]
    fn chunk_uv_remap_covers_the_sub_rectangle() {
        let mut mesh = quad();
        mesh.remap_uv_for_chunk(1, 1, 2);

        // chunk (1, 1) of a 2x2 split maps onto [0.5, 1] x [0.5, 1]
        assert_eq!(mesh.uvs[0], Vec2::new(0.5, 0.5));
        assert_eq!(mesh.uvs[3], Vec2::new(1.0, 1.0));
    }
}
