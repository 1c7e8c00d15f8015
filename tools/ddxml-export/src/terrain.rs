//! Heightmap triangulation (PGM -> ddxml terrain mesh)

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use std::path::Path;

use crate::config::HeightmapConfig;
use crate::ddxml::{DdxmlDocument, IndexBuffer, IndexKind, Material, MeshData};
use crate::heightmap::Heightmap;

/// Name of the material written when a texture is given
pub const TERRAIN_MATERIAL: &str = "default";

/// Triangulated heightmap
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    pub vertices: Vec<Vec3>,
    /// One texture coordinate per vertex
    pub texcoords: Vec<Vec2>,
    pub triangle_list: Vec<u32>,
    pub triangle_strip: Vec<u32>,
}

/// Number of flat triangle list indices for a `w × h` grid
pub fn triangle_list_len(w: u32, h: u32) -> usize {
    ((w - 1) * (h - 1) * 6) as usize
}

/// Number of strip indices for a `w × h` grid.
///
/// Two start indices, then per row `(w-1)` quads worth of indices plus four
/// degenerate bridge indices; the last row has no bridge.
pub fn triangle_strip_len(w: u32, h: u32) -> usize {
    let per_row = (w - 1) * 2 + 4;
    (2 + (h - 1) * per_row - 4) as usize
}

/// Triangulate a heightmap into vertices, texcoords and both index buffers.
pub fn triangulate(map: &Heightmap, config: &HeightmapConfig) -> TerrainMesh {
    let (w, h) = (map.width(), map.height());
    let half_w = w as f32 * 0.5;
    let half_h = h as f32 * 0.5;

    let mut vertices = Vec::with_capacity((w * h) as usize);
    let mut texcoords = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let height = f32::from(map.sample(x, y)) * config.height_mult;
            vertices.push(Vec3::new(
                (x as f32 - half_w) * config.xscale,
                (y as f32 - half_h) * config.yscale,
                height,
            ));
            texcoords.push(Vec2::new(
                x as f32 / (w - 1) as f32,
                y as f32 / (h - 1) as f32,
            ));
        }
    }

    TerrainMesh {
        vertices,
        texcoords,
        triangle_list: triangle_list(w, h),
        triangle_strip: triangle_strip(w, h),
    }
}

/// Two triangles per grid cell, split along the `(x,y)-(x+1,y+1)` diagonal
fn triangle_list(w: u32, h: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(triangle_list_len(w, h));
    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let b = y * w + x;
            indices.extend_from_slice(&[b, b + 1, b + w, b + w, b + 1, b + w + 1]);
        }
    }
    indices
}

/// Serpentine strip over the whole grid.
///
/// Even rows run left to right, odd rows right to left. Each row change is
/// bridged by four indices forming degenerate triangles, the last two of
/// which seed the next row.
fn triangle_strip(w: u32, h: u32) -> Vec<u32> {
    let mut strip = Vec::with_capacity(triangle_strip_len(w, h));
    strip.extend_from_slice(&[w, 0]);

    for y in 0..h - 1 {
        let top = y * w;
        let bottom = (y + 1) * w;
        let has_next = y + 2 < h;

        if y % 2 == 0 {
            for x in 1..w {
                strip.extend_from_slice(&[bottom + x, top + x]);
            }
            if has_next {
                let corner = bottom + w - 1;
                strip.extend_from_slice(&[corner, corner, corner, corner + w]);
            }
        } else {
            for x in 1..w {
                strip.extend_from_slice(&[top + w - 1 - x, bottom + w - 1 - x]);
            }
            if has_next {
                strip.extend_from_slice(&[bottom, bottom, bottom + w, bottom]);
            }
        }
    }
    strip
}

impl TerrainMesh {
    /// Build the ddxml document for this terrain.
    ///
    /// A textured `default` material is added only when `texture` is given.
    pub fn to_document(
        &self,
        name: &str,
        texture: Option<&str>,
        config: &HeightmapConfig,
    ) -> crate::error::Result<DdxmlDocument> {
        let mut doc = DdxmlDocument::new();

        let mut mesh = MeshData::new(name);
        if let Some(texture) = texture {
            doc.add_material(Material::textured(TERRAIN_MATERIAL, texture));
            mesh.material = Some(TERRAIN_MATERIAL.to_string());
        }

        mesh.vertices = self.vertices.clone();
        if config.emit_triangle_list {
            mesh.index_buffers.push(IndexBuffer {
                kind: IndexKind::TriangleList,
                indices: self.triangle_list.clone(),
            });
        }
        mesh.index_buffers.push(IndexBuffer {
            kind: IndexKind::TriangleStrip,
            indices: self.triangle_strip.clone(),
        });
        mesh.texcoords = Some(self.texcoords.clone());

        doc.add_mesh(mesh)?;
        Ok(doc)
    }
}

/// Convert a PGM heightmap file into a ddxml model file.
///
/// The output file is only created once the whole document has been built.
pub fn convert_heightmap(
    input: &Path,
    output: &Path,
    texture: Option<&str>,
    config: &HeightmapConfig,
) -> Result<()> {
    let data =
        std::fs::read(input).with_context(|| format!("Failed to read heightmap: {:?}", input))?;
    let map = Heightmap::from_pgm(&data)
        .with_context(|| format!("Failed to load heightmap: {:?}", input))?;
    tracing::info!("Heightmap {:?}: width={} height={}", input, map.width(), map.height());

    let terrain = triangulate(&map, config);
    let name = input.to_string_lossy();
    let xml = terrain.to_document(&name, texture, config)?.to_xml()?;

    std::fs::write(output, xml)
        .with_context(|| format!("Failed to write output: {:?}", output))?;

    tracing::info!(
        "Converted terrain: {} vertices, {} list indices, {} strip indices",
        terrain.vertices.len(),
        terrain.triangle_list.len(),
        terrain.triangle_strip.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddxml::parse_ddxml;

    fn flat(w: u32, h: u32) -> Heightmap {
        Heightmap::from_raw(w, h, &vec![128; (w * h) as usize]).unwrap()
    }

    #[test]
    fn test_two_by_two_example() {
        let map = Heightmap::from_raw(2, 2, &[120, 130, 140, 150]).unwrap();
        let mesh = triangulate(&map, &HeightmapConfig::default());

        assert_eq!(
            mesh.vertices,
            vec![
                Vec3::new(-1.0, -1.0, -8.0),
                Vec3::new(0.0, -1.0, 2.0),
                Vec3::new(-1.0, 0.0, 12.0),
                Vec3::new(0.0, 0.0, 22.0),
            ]
        );
        assert_eq!(mesh.triangle_list, vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(mesh.triangle_strip, vec![2, 0, 3, 1]);
        assert_eq!(
            mesh.texcoords,
            vec![Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE]
        );
    }

    #[test]
    fn test_scale_factors() {
        let map = Heightmap::from_raw(2, 2, &[138, 128, 128, 128]).unwrap();
        let config = HeightmapConfig {
            xscale: 2.0,
            yscale: 3.0,
            height_mult: 0.5,
            ..Default::default()
        };
        let mesh = triangulate(&map, &config);
        assert_eq!(mesh.vertices[0], Vec3::new(-2.0, -3.0, 5.0));
        assert_eq!(mesh.vertices[3], Vec3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_index_counts_and_bounds() {
        for (w, h) in [(2, 2), (2, 5), (3, 3), (4, 2), (5, 7), (8, 8)] {
            let mesh = triangulate(&flat(w, h), &HeightmapConfig::default());
            let count = w * h;

            assert_eq!(mesh.vertices.len(), count as usize);
            assert_eq!(mesh.texcoords.len(), count as usize);
            assert_eq!(mesh.triangle_list.len(), triangle_list_len(w, h));
            assert_eq!(mesh.triangle_list.len(), ((w - 1) * (h - 1) * 6) as usize);
            assert_eq!(mesh.triangle_strip.len(), triangle_strip_len(w, h));
            assert!(mesh.triangle_list.iter().all(|&i| i < count), "{}x{}", w, h);
            assert!(mesh.triangle_strip.iter().all(|&i| i < count), "{}x{}", w, h);
        }
    }

    #[test]
    fn test_strip_covers_every_cell() {
        use crate::ddxml::ParsedMesh;
        use std::collections::HashSet;

        let (w, h) = (4, 4);
        let mesh = triangulate(&flat(w, h), &HeightmapConfig::default());
        let parsed = ParsedMesh {
            strip: Some(mesh.triangle_strip.clone()),
            ..Default::default()
        };
        let tris = parsed.triangles();
        assert_eq!(tris.len(), ((w - 1) * (h - 1) * 2) as usize);

        let sorted: HashSet<[u32; 3]> = tris
            .iter()
            .map(|t| {
                let mut t = *t;
                t.sort_unstable();
                t
            })
            .collect();
        assert_eq!(sorted.len(), tris.len());
    }

    #[test]
    fn test_texcoords_span_unit_square() {
        let mesh = triangulate(&flat(5, 3), &HeightmapConfig::default());
        assert_eq!(mesh.texcoords[0], Vec2::ZERO);
        assert_eq!(*mesh.texcoords.last().unwrap(), Vec2::ONE);
        assert_eq!(mesh.texcoords[2], Vec2::new(0.5, 0.0));
        assert_eq!(mesh.texcoords[5], Vec2::new(0.0, 0.5));
    }

    #[test]
    fn test_document_round_trip_counts() {
        let (w, h) = (6, 3);
        let mesh = triangulate(&flat(w, h), &HeightmapConfig::default());
        let xml = mesh
            .to_document("terrain.pgm", Some("terrain.png"), &HeightmapConfig::default())
            .unwrap()
            .to_xml()
            .unwrap();

        assert!(xml.contains(r#"<mesh name="terrain.pgm" id="0" material="0">"#));
        assert!(xml.contains(r#"filename="terrain.png""#));

        let parsed = parse_ddxml(&xml).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].vertices.len(), (w * h) as usize);
        assert_eq!(parsed[0].indices.as_ref().map(Vec::len), Some(triangle_list_len(w, h)));
        assert_eq!(parsed[0].strip.as_ref().map(Vec::len), Some(triangle_strip_len(w, h)));
    }

    #[test]
    fn test_untextured_document_has_no_material() {
        let mesh = triangulate(&flat(2, 2), &HeightmapConfig::default());
        let config = HeightmapConfig {
            emit_triangle_list: false,
            ..Default::default()
        };
        let xml = mesh.to_document("t", None, &config).unwrap().to_xml().unwrap();
        assert!(!xml.contains("<material"));
        assert!(!xml.contains("material="));
        assert!(xml.contains(r#"<indices type="triangle_strip" nr="4">2 0 3 1</indices>"#));
        assert!(!xml.contains(r#"<indices nr="#));
    }
}
