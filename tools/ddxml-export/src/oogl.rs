//! Geomview OFF dumps of ddxml meshes at several levels of detail
//!
//! Level 0 is the mesh as stored. Every further level is simplified towards
//! a percentage of the original face count, starting from the previous
//! level, so face counts never grow with the level number.

use anyhow::{Context, Result};
use meshopt::{DecodePosition, SimplifyOptions};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::OoglConfig;
use crate::ddxml::{parse_ddxml, ParsedMesh};
use crate::error::DdxmlError;

/// Vertex position as seen by the simplifier
struct Position([f32; 3]);

impl DecodePosition for Position {
    fn decode_position(&self) -> [f32; 3] {
        self.0
    }
}

/// One level of detail of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct LodLevel {
    pub level: u32,
    pub triangles: Vec<[u32; 3]>,
}

/// Render vertices and triangles as an OFF object
pub fn to_off(mesh: &ParsedMesh, triangles: &[[u32; 3]]) -> String {
    let mut out = String::from("OFF\n");
    let _ = writeln!(out, "{} {} 0", mesh.vertices.len(), triangles.len());
    for v in &mesh.vertices {
        let _ = writeln!(out, "{} {} {}", v.x, v.y, v.z);
    }
    for [a, b, c] in triangles {
        let _ = writeln!(out, "3 {} {} {}", a, b, c);
    }
    out
}

/// Output path for a mesh level: `<stem>_m<mesh>_l<level>.oogl` next to the input
pub fn oogl_path(input: &Path, mesh: usize, level: u32) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_m{}_l{}.oogl", stem, mesh, level))
}

/// Simplify `triangles` towards `target_faces` faces.
///
/// Returns the input unchanged when it is already at or below the target.
pub fn simplify(
    mesh: &ParsedMesh,
    triangles: &[[u32; 3]],
    target_faces: usize,
    target_error: f32,
) -> Vec<[u32; 3]> {
    if target_faces >= triangles.len() {
        return triangles.to_vec();
    }

    let indices: Vec<u32> = triangles.iter().flatten().copied().collect();
    let positions: Vec<Position> = mesh
        .vertices
        .iter()
        .map(|v| Position(v.to_array()))
        .collect();

    let simplified = meshopt::simplify_decoder(
        &indices,
        &positions,
        target_faces * 3,
        target_error,
        SimplifyOptions::empty(),
        None,
    );
    simplified
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .collect()
}

/// Build every level of the LOD table for one mesh
pub fn lod_levels(mesh: &ParsedMesh, config: &OoglConfig) -> Vec<LodLevel> {
    let original = mesh.triangles();
    let faces = original.len();

    let mut levels = Vec::with_capacity(config.levels.len() + 1);
    levels.push(LodLevel {
        level: 0,
        triangles: original,
    });

    for (i, &percent) in config.levels.iter().enumerate() {
        let target = faces * percent as usize / 100;
        let previous = &levels[levels.len() - 1].triangles;
        let triangles = simplify(mesh, previous, target, config.target_error);
        levels.push(LodLevel {
            level: i as u32 + 1,
            triangles,
        });
    }
    levels
}

/// Write every LOD level of every mesh of a ddxml file, returning the paths written
pub fn write_oogl(input: &Path, config: &OoglConfig) -> Result<Vec<PathBuf>> {
    let xml = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read model: {:?}", input))?;
    let meshes = parse_ddxml(&xml).with_context(|| format!("Failed to parse model: {:?}", input))?;
    if meshes.is_empty() {
        return Err(DdxmlError::format("No surfaces found, missing mesh or bad ddxml"))
            .with_context(|| format!("Failed to convert model: {:?}", input));
    }

    // Nothing is written until every level of every mesh is built
    let mut files = Vec::new();
    for (i, mesh) in meshes.iter().enumerate() {
        tracing::info!("Mesh {} '{}':", i, mesh.name);
        for lod in lod_levels(mesh, config) {
            tracing::info!("\tlevel {} with {} faces", lod.level, lod.triangles.len());
            files.push((oogl_path(input, i, lod.level), to_off(mesh, &lod.triangles)));
        }
    }

    let mut written = Vec::with_capacity(files.len());
    for (path, off) in files {
        std::fs::write(&path, off).with_context(|| format!("Failed to write: {:?}", path))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeightmapConfig;
    use crate::heightmap::Heightmap;
    use crate::terrain::triangulate;
    use glam::Vec3;

    fn grid(w: u32, h: u32) -> ParsedMesh {
        let map = Heightmap::from_raw(w, h, &vec![128; (w * h) as usize]).unwrap();
        let terrain = triangulate(&map, &HeightmapConfig::default());
        ParsedMesh {
            name: "grid".to_string(),
            vertices: terrain.vertices,
            indices: Some(terrain.triangle_list),
            ..Default::default()
        }
    }

    #[test]
    fn test_off_layout() {
        let mesh = ParsedMesh {
            name: "tri".to_string(),
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::new(0.0, 1.5, 0.0)],
            indices: Some(vec![0, 1, 2]),
            ..Default::default()
        };
        assert_eq!(
            to_off(&mesh, &mesh.triangles()),
            "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1.5 0\n3 0 1 2\n"
        );
    }

    #[test]
    fn test_off_from_strip() {
        let mesh = ParsedMesh {
            vertices: vec![Vec3::ZERO; 4],
            strip: Some(vec![2, 0, 3, 1]),
            ..Default::default()
        };
        let off = to_off(&mesh, &mesh.triangles());
        assert!(off.starts_with("OFF\n4 2 0\n"));
        assert!(off.ends_with("3 2 0 3\n3 3 0 1\n"));
    }

    #[test]
    fn test_output_names() {
        assert_eq!(
            oogl_path(Path::new("models/sub.ddxml"), 2, 3),
            PathBuf::from("models/sub_m2_l3.oogl")
        );
    }

    #[test]
    fn test_levels_never_gain_faces() {
        let mesh = grid(9, 9);
        let levels = lod_levels(&mesh, &OoglConfig::default());

        assert_eq!(levels.len(), 5);
        assert_eq!(levels[0].triangles.len(), 128);
        // 125% and 100% targets keep the mesh as is
        assert_eq!(levels[1].triangles, levels[0].triangles);
        assert_eq!(levels[2].triangles, levels[0].triangles);
        for pair in levels.windows(2) {
            assert!(pair[1].triangles.len() <= pair[0].triangles.len());
        }
        assert!(levels[4].triangles.len() < levels[0].triangles.len());

        let count = mesh.vertices.len() as u32;
        assert!(levels.iter().flat_map(|l| l.triangles.iter().flatten()).all(|&i| i < count));
    }

    #[test]
    fn test_writes_every_level_of_every_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("boat.ddxml");
        let xml = r#"<?xml version="1.0"?>
<dftd-model version="1.1">
<mesh name="a" id="0"><vertices nr="3">0 0 0 1 0 0 0 1 0</vertices><indices nr="3">0 1 2</indices></mesh>
<mesh name="b" id="1"><vertices nr="3">0 0 0 1 0 0 0 1 0</vertices><indices nr="3">0 2 1</indices></mesh>
</dftd-model>
"#;
        std::fs::write(&input, xml).unwrap();

        let config = OoglConfig {
            levels: vec![100, 50],
            ..Default::default()
        };
        let written = write_oogl(&input, &config).unwrap();
        assert_eq!(written.len(), 6);
        assert!(dir.path().join("boat_m0_l0.oogl").exists());
        assert!(dir.path().join("boat_m1_l2.oogl").exists());
        let second = std::fs::read_to_string(dir.path().join("boat_m1_l0.oogl")).unwrap();
        assert!(second.ends_with("3 0 2 1\n"));
    }

    #[test]
    fn test_no_meshes_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.ddxml");
        std::fs::write(&input, "<dftd-model version=\"1.1\"></dftd-model>").unwrap();

        let err = write_oogl(&input, &OoglConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DdxmlError>(),
            Some(DdxmlError::FormatError(_))
        ));
        assert!(!dir.path().join("empty_m0_l0.oogl").exists());
    }
}
