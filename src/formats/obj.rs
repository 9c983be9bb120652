//! Wavefront OBJ export of generated meshes.
//!
//! The interchange format uses the opposite handedness, so two named
//! transforms are applied here and only here: `mirror_x` negates the x
//! component of positions and normals, and `flip_winding` swaps the second
//! and third index of every face. Applied together they keep the exported
//! faces front-facing; internally the mesh stays in its own convention.

use crate::{mesh::Mesh, result::ConversionResult};
use log::info;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Writes the mesh as `{save_path}/{name}.obj` and returns the file path.
///
/// Fails without writing when the mesh violates its structural invariants.
pub fn save_mesh_as_obj(mesh: &Mesh, save_path: &Path, name: &str) -> ConversionResult<PathBuf> {
    mesh.validate()?;

    fs::create_dir_all(save_path)?;
    let path = save_path.join(format!("{name}.obj"));

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "o {name}")?;
    writeln!(writer, "g {name}")?;

    for position in &mesh.positions {
        let mirrored = mirror_x(position.to_array());
        writeln!(writer, "v {} {} {}", mirrored[0], mirrored[1], mirrored[2])?;
    }

    for uv in &mesh.uvs {
        writeln!(writer, "vt {} {}", uv.x, uv.y)?;
    }

    if let Some(normals) = &mesh.normals {
        for normal in normals {
            let mirrored = mirror_x(normal.to_array());
            writeln!(writer, "vn {} {} {}", mirrored[0], mirrored[1], mirrored[2])?;
        }
    }

    let with_normals = mesh.normals.is_some();

    for triangle in mesh.indices.chunks_exact(3) {
        // 1-based indices, flipped winding
        let [a, b, c] = flip_winding([triangle[0] + 1, triangle[1] + 1, triangle[2] + 1]);

        if with_normals {
            writeln!(writer, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        } else {
            writeln!(writer, "f {a}/{a} {b}/{b} {c}/{c}")?;
        }
    }

    writer.flush()?;

    info!("mesh saved as OBJ at: {}", path.display());

    Ok(path)
}

fn mirror_x(vector: [f32; 3]) -> [f32; 3] {
    [-vector[0], vector[1], vector[2]]
}

fn flip_winding(triangle: [u32; 3]) -> [u32; 3] {
    [triangle[0], triangle[2], triangle[1]]
}
