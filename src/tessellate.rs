//! Grid tessellation of heightfields, with the optional skirt geometry used
//! by LOD tiles.
//!
//! Both tessellators lay `(resolution + 1)²` vertices over a regular grid
//! spanning `size.x` by `size.z` world units and split every quad along the
//! same diagonal. The skirt variant additionally duplicates the four boundary
//! rows/columns, pushes the copies down and stitches them to the border, so
//! that neighboring tiles of different resolutions do not show cracks.

use crate::mesh::Mesh;
use glam::{Vec2, Vec3};

/// Derives the tessellation resolution for a LOD level from the base
/// resolution by power-of-two halving, never dropping below a single quad.
pub fn lod_resolution(base_resolution: u32, lod_level: u32) -> u32 {
    (base_resolution >> lod_level).max(1)
}

/// Derives the base tessellation resolution from a heightmap sample count,
/// e.g. 65x65 samples tessellate as a 64x64 quad grid.
pub fn base_resolution(heightmap_samples: u32) -> u32 {
    heightmap_samples.next_power_of_two() / 2
}

/// Builds a regular grid mesh with heights from `sample_height`.
///
/// The sampler receives normalized `(u, v)` coordinates and returns the world
/// height at that point. Normals are recomputed from the face geometry.
pub fn tessellate<S>(resolution: u32, size: Vec3, mut sample_height: S) -> Mesh
where
    S: FnMut(f32, f32) -> f32,
{
    let stride = resolution + 1;

    let mut mesh = Mesh {
        positions: Vec::with_capacity((stride * stride) as usize),
        uvs: Vec::with_capacity((stride * stride) as usize),
        normals: None,
        indices: Vec::with_capacity((resolution * resolution * 6) as usize),
    };

    for z in 0..=resolution {
        for x in 0..=resolution {
            let u = x as f32 / resolution as f32;
            let v = z as f32 / resolution as f32;

            mesh.positions
                .push(Vec3::new(u * size.x, sample_height(u, v), v * size.z));
            mesh.uvs.push(Vec2::new(u, v));
        }
    }

    push_grid_triangles(&mut mesh.indices, resolution);

    mesh.recalculate_normals();

    mesh
}

/// Builds a LOD grid mesh with heights and normals from the sampler, a
/// uniform `y_offset` applied to every vertex, and an optional skirt of
/// `skirt_depth` world units.
pub fn tessellate_with_skirt<S>(
    resolution: u32,
    size: Vec3,
    y_offset: f32,
    skirt_depth: Option<f32>,
    mut sample: S,
) -> Mesh
where
    S: FnMut(f32, f32) -> (f32, Vec3),
{
    let stride = resolution + 1;

    let base_vertices = (stride * stride) as usize;
    let skirt_vertices = if skirt_depth.is_some() {
        4 * stride as usize
    } else {
        0
    };

    let base_indices = (resolution * resolution * 6) as usize;
    let skirt_indices = if skirt_depth.is_some() {
        (resolution * 4 * 6) as usize
    } else {
        0
    };

    let mut mesh = Mesh {
        positions: Vec::with_capacity(base_vertices + skirt_vertices),
        uvs: Vec::with_capacity(base_vertices + skirt_vertices),
        normals: Some(Vec::with_capacity(base_vertices + skirt_vertices)),
        indices: Vec::with_capacity(base_indices + skirt_indices),
    };

    for z in 0..=resolution {
        for x in 0..=resolution {
            let u = x as f32 / resolution as f32;
            let v = z as f32 / resolution as f32;

            let (height, normal) = sample(u, v);

            mesh.positions
                .push(Vec3::new(u * size.x, height + y_offset, v * size.z));
            mesh.uvs.push(Vec2::new(u, v));
            mesh.normals.as_mut().unwrap().push(normal);
        }
    }

    push_grid_triangles(&mut mesh.indices, resolution);

    if let Some(depth) = skirt_depth {
        extrude_skirt(&mut mesh, resolution, depth);
    }

    mesh
}

fn push_grid_triangles(indices: &mut Vec<u32>, resolution: u32) {
    let stride = resolution + 1;

    for z in 0..resolution {
        for x in 0..resolution {
            let vertex = x + z * stride;

            indices.extend_from_slice(&[vertex, vertex + stride, vertex + stride + 1]);
            indices.extend_from_slice(&[vertex, vertex + stride + 1, vertex + 1]);
        }
    }
}

/// Appends the four skirt strips in the order left, bottom, right, top.
///
/// Each strip duplicates its `resolution + 1` boundary vertices, moves the
/// copies down by `depth` and connects them to the original edge with two
/// triangles per segment. The triangle orientation differs per strip so that
/// every skirt face points away from the tile.
fn extrude_skirt(mesh: &mut Mesh, resolution: u32, depth: f32) {
    let stride = resolution + 1;
    let normals = mesh.normals.as_mut().unwrap();

    let mut duplicate = |mesh_positions: &mut Vec<Vec3>,
                         mesh_uvs: &mut Vec<Vec2>,
                         original: u32| {
        let mut position = mesh_positions[original as usize];
        position.y -= depth;

        mesh_positions.push(position);
        mesh_uvs.push(mesh_uvs[original as usize]);
        normals.push(normals[original as usize]);
    };

    // left edge
    let left_start = stride * stride;
    for z in 0..=resolution {
        let original = z * stride;
        let new = left_start + z;

        duplicate(&mut mesh.positions, &mut mesh.uvs, original);

        if z < resolution {
            mesh.indices.extend_from_slice(&[original, new, new + 1]);
            mesh.indices
                .extend_from_slice(&[original, new + 1, original + stride]);
        }
    }

    // bottom edge
    let bottom_start = left_start + stride;
    for x in 0..=resolution {
        let original = x;
        let new = bottom_start + x;

        duplicate(&mut mesh.positions, &mut mesh.uvs, original);

        if x < resolution {
            mesh.indices.extend_from_slice(&[original, original + 1, new]);
            mesh.indices.extend_from_slice(&[original + 1, new + 1, new]);
        }
    }

    // right edge
    let right_start = bottom_start + stride;
    for z in 0..=resolution {
        let original = z * stride + resolution;
        let new = right_start + z;

        duplicate(&mut mesh.positions, &mut mesh.uvs, original);

        if z < resolution {
            mesh.indices.extend_from_slice(&[original, new + 1, new]);
            mesh.indices
                .extend_from_slice(&[original, original + stride, new + 1]);
        }
    }

    // top edge
    let top_start = right_start + stride;
    for x in 0..=resolution {
        let original = resolution * stride + x;
        let new = top_start + x;

        duplicate(&mut mesh.positions, &mut mesh.uvs, original);

        if x < resolution {
            mesh.indices.extend_from_slice(&[original, new, new + 1]);
            mesh.indices
                .extend_from_slice(&[original, new + 1, original + 1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::Heightfield;
    use ndarray::Array2;
    use rand::Rng;

    #[test]
    fn vertex_and_index_budget() {
        for resolution in [1, 2, 7, 16] {
            let mesh = tessellate(resolution, Vec3::new(100.0, 30.0, 100.0), |u, v| u + v);

            let stride = (resolution + 1) as usize;
            assert_eq!(mesh.vertex_count(), stride * stride);
            assert_eq!(mesh.indices.len(), (resolution * resolution * 6) as usize);
            assert!(mesh.validate().is_ok());
        }
    }

    #[test]
    fn uvs_span_the_unit_square() {
        let mesh = tessellate(4, Vec3::new(10.0, 1.0, 10.0), |_, _| 0.0);

        assert_eq!(mesh.uvs[0], Vec2::new(0.0, 0.0));
        assert_eq!(*mesh.uvs.last().unwrap(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn quad_diagonal_split_matches_the_grid_convention() {
        let mesh = tessellate(2, Vec3::ONE, |_, _| 0.0);

        // quad (0, 0): (v, v + R + 1, v + R + 2) and (v, v + R + 2, v + 1)
        assert_eq!(&mesh.indices[0..6], &[0, 3, 4, 0, 4, 1]);
    }

    #[test]
    fn skirt_budget_enabled_and_disabled() {
        for resolution in [1, 4, 8] {
            let with_skirt = tessellate_with_skirt(
                resolution,
                Vec3::new(50.0, 10.0, 50.0),
                0.0,
                Some(5.0),
                |_, _| (1.0, Vec3::Y),
            );
            let without_skirt = tessellate_with_skirt(
                resolution,
                Vec3::new(50.0, 10.0, 50.0),
                0.0,
                None,
                |_, _| (1.0, Vec3::Y),
            );

            let stride = (resolution + 1) as usize;

            assert_eq!(with_skirt.vertex_count(), stride * stride + 4 * stride);
            assert_eq!(
                with_skirt.indices.len(),
                (resolution * resolution * 6 + 24 * resolution) as usize
            );
            assert!(with_skirt.validate().is_ok());

            assert_eq!(without_skirt.vertex_count(), stride * stride);
            assert_eq!(
                without_skirt.indices.len(),
                (resolution * resolution * 6) as usize
            );
        }
    }

    #[test]
    fn skirt_vertices_copy_the_boundary_minus_depth() {
        let resolution = 4;
        let depth = 7.5;
        let offset = 2.0;

        let mesh = tessellate_with_skirt(
            resolution,
            Vec3::new(10.0, 5.0, 10.0),
            offset,
            Some(depth),
            |u, v| (u + v, Vec3::new(0.3, 0.9, 0.1)),
        );

        let stride = resolution + 1;
        let left_start = (stride * stride) as usize;

        for z in 0..=resolution as usize {
            let original = z * stride as usize;
            let new = left_start + z;

            assert_eq!(mesh.positions[new].x, mesh.positions[original].x);
            assert_eq!(mesh.positions[new].z, mesh.positions[original].z);
            assert_eq!(mesh.positions[new].y, mesh.positions[original].y - depth);
            assert_eq!(mesh.uvs[new], mesh.uvs[original]);
            assert_eq!(
                mesh.normals.as_ref().unwrap()[new],
                mesh.normals.as_ref().unwrap()[original]
            );
        }
    }

    #[test]
    fn lod_resolution_halves_to_at_least_one() {
        assert_eq!(lod_resolution(64, 0), 64);
        assert_eq!(lod_resolution(64, 3), 8);
        assert_eq!(lod_resolution(64, 8), 1);
    }

    #[test]
    fn base_resolution_rounds_65_samples_to_64() {
        assert_eq!(base_resolution(65), 64);
        assert_eq!(base_resolution(513), 512);
    }

    #[test]
    fn skirted_lod_scenario_65_samples_lod_3() {
        // 65x65 heightmap, LOD level 3: base resolution 64 halves to 8
        let mut rng = rand::rng();
        let heights =
            Array2::from_shape_fn((65, 65), |_| rng.random_range(0.0..1.0f32));
        let field = Heightfield::new(heights).unwrap();

        let resolution = lod_resolution(base_resolution(65), 3);
        assert_eq!(resolution, 8);

        let mesh = tessellate_with_skirt(
            resolution,
            Vec3::new(500.0, 100.0, 500.0),
            0.0,
            Some(20.0),
            |u, v| (field.sample(u, v) * 100.0, Vec3::Y),
        );

        assert_eq!(mesh.vertex_count(), 81 + 36);
        assert_eq!(mesh.indices.len(), 384 + 192);
        assert!(mesh.validate().is_ok());
    }
}
