//! Scene exporter (scene graph -> ddxml model)
//!
//! Walks the transform hierarchy depth first from a root node. Every node must
//! own exactly one mesh; each mesh is deduplicated and written together with
//! the node's pivot translation and rotation limits.

use anyhow::Context;
use glam::Vec3;
use std::path::{Path, PathBuf};

use crate::config::{ExportConfig, MissingUvs};
use crate::ddxml::{DdxmlDocument, IndexBuffer, IndexKind, Material, MeshData, Rotation};
use crate::dedup::{collect_corners, merge_corners};
use crate::error::{DdxmlError, Result};
use crate::scene::{Axis, MeshId, NodeId, SceneFile, SceneSource};

/// Export statistics for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub objects: usize,
    pub corners: usize,
    pub vertices: usize,
    pub skipped_polygons: usize,
}

struct SceneExporter<'a, S: SceneSource> {
    scene: &'a S,
    config: &'a ExportConfig,
    doc: DdxmlDocument,
    stats: ExportStats,
}

/// Resolve the export root: the named node, or the single selected node.
pub fn resolve_root<S: SceneSource>(scene: &S, root: Option<&str>) -> Result<NodeId> {
    if let Some(name) = root {
        return scene
            .find_node(name)
            .ok_or_else(|| DdxmlError::SelectionError(format!("no node named '{}'", name)));
    }

    let selection = scene.selection();
    match selection.as_slice() {
        [] => Err(DdxmlError::SelectionError("Nothing selected".to_string())),
        [node] => Ok(*node),
        _ => Err(DdxmlError::SelectionError(
            "Multiple selections, only select the root node".to_string(),
        )),
    }
}

/// Export the hierarchy below `root` (or the selected node) into a document.
pub fn export_scene<S: SceneSource>(
    scene: &S,
    root: Option<&str>,
    config: &ExportConfig,
) -> Result<(DdxmlDocument, ExportStats)> {
    let root = resolve_root(scene, root)?;

    let mut exporter = SceneExporter {
        scene,
        config,
        doc: DdxmlDocument::new(),
        stats: ExportStats::default(),
    };
    exporter.doc.add_material(Material::phong(&config.material));
    exporter.walk(root, None)?;

    Ok((exporter.doc, exporter.stats))
}

/// Export a scene description file.
///
/// `output` is asked for the destination only after the document has been
/// built, so a failed export never creates or prompts for a file.
pub fn export_scene_file<F>(
    scene_path: &Path,
    root: Option<&str>,
    config: &ExportConfig,
    output: F,
) -> anyhow::Result<(PathBuf, ExportStats)>
where
    F: FnOnce() -> anyhow::Result<PathBuf>,
{
    let scene = SceneFile::load(scene_path)?;
    let (doc, stats) = export_scene(&scene, root, config)
        .with_context(|| format!("Failed to export scene: {:?}", scene_path))?;
    let xml = doc.to_xml()?;

    let output = output()?;
    std::fs::write(&output, xml).with_context(|| format!("Failed to write output: {:?}", output))?;
    tracing::info!(
        "Exported {} objects ({} corners -> {} vertices) to {:?}",
        stats.objects,
        stats.corners,
        stats.vertices,
        output
    );
    Ok((output, stats))
}

impl<'a, S: SceneSource> SceneExporter<'a, S> {
    fn walk(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<()> {
        let name = self.scene.node_name(node).to_string();
        let mesh = self.single_mesh(node)?;
        let mesh_name = self.scene.mesh_name(mesh).to_string();
        tracing::debug!("Exporting object '{}' with mesh '{}'", name, mesh_name);

        let data = self.read_mesh(mesh, node);
        self.doc.add_mesh(data)?;

        let parent_name = parent.map(|p| self.scene.node_name(p).to_string());
        self.doc.add_object(&name, &mesh_name, parent_name.as_deref())?;
        self.stats.objects += 1;

        self.add_transformation(&name, node, parent)?;

        for child in self.scene.child_transforms(node) {
            self.walk(child, Some(node))?;
        }
        Ok(())
    }

    fn single_mesh(&self, node: NodeId) -> Result<MeshId> {
        let node_name = || self.scene.node_name(node).to_string();
        match self.scene.meshes_owned_by(node).as_slice() {
            [mesh] => Ok(*mesh),
            [] => Err(DdxmlError::NoMeshError { node: node_name() }),
            _ => Err(DdxmlError::MultipleMeshError { node: node_name() }),
        }
    }

    fn add_transformation(&mut self, name: &str, node: NodeId, parent: Option<NodeId>) -> Result<()> {
        let parent_pivot = parent.map(|p| self.scene.pivot(p)).unwrap_or(Vec3::ZERO);
        let delta = self.scene.pivot(node) - parent_pivot;

        if delta.abs().element_sum() > self.config.translation_epsilon {
            self.doc.add_translation(name, delta)?;
        }

        for axis in Axis::ALL {
            let limit = self.scene.rotation_limit(node, axis);
            if let (Some(min), Some(max)) = (limit.min, limit.max) {
                self.doc.add_rotation(
                    name,
                    Rotation {
                        axis: axis.vector(),
                        angle: 0.0,
                        min_angle: min,
                        max_angle: max,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn read_mesh(&mut self, mesh: MeshId, node: NodeId) -> MeshData {
        let scene = self.scene;
        let mesh_name = scene.mesh_name(mesh);
        let pivot = scene.pivot(node);

        // Kept polygons with the traversal order of their first corner
        let mut kept = Vec::new();
        let mut tuples = Vec::new();
        for (index, poly) in scene.polygons(mesh).into_iter().enumerate() {
            if !poly.has_uvs() {
                match self.config.missing_uvs {
                    MissingUvs::Skip => {
                        tracing::warn!(
                            "Poly with no UVs, not exporting; mesh={} poly={}",
                            mesh_name,
                            index
                        );
                        self.stats.skipped_polygons += 1;
                        continue;
                    }
                    MissingUvs::Default => {
                        tracing::warn!(
                            "Poly with no UVs, using (0, 0); mesh={} poly={}",
                            mesh_name,
                            index
                        );
                    }
                }
            }
            let base = tuples.len();
            tuples.extend(poly.corners.iter().map(|c| (c.position, c.normal, c.uv)));
            kept.push((base, poly));
        }

        let corners = collect_corners(tuples);
        let merged = merge_corners(
            &corners,
            |n| scene.vertex_normal(mesh, n),
            self.config.merge_tolerance,
        );

        let remap = &merged.remap;
        let indices: Vec<u32> = kept
            .iter()
            .flat_map(|&(base, ref poly)| {
                poly.triangles
                    .iter()
                    .flatten()
                    .map(move |&corner| remap[base + corner])
            })
            .collect();

        let mut data = MeshData::new(mesh_name);
        data.material = Some(self.config.material.clone());
        data.vertices = merged
            .vertices
            .iter()
            .map(|v| scene.vertex_position(mesh, v.position) - pivot)
            .collect();
        data.normals = Some(
            merged
                .vertices
                .iter()
                .map(|v| scene.vertex_normal(mesh, v.normal))
                .collect(),
        );
        data.texcoords = Some(
            merged
                .vertices
                .iter()
                .map(|v| v.uv.map(|uv| scene.uv(mesh, uv)).unwrap_or([0.0, 0.0]).into())
                .collect(),
        );
        data.index_buffers.push(IndexBuffer {
            kind: IndexKind::TriangleList,
            indices,
        });

        tracing::info!(
            "Mesh '{}': {} corners -> {} vertices, {} indices",
            mesh_name,
            corners.len(),
            merged.vertices.len(),
            data.index_buffers[0].indices.len()
        );
        self.stats.corners += corners.len();
        self.stats.vertices += merged.vertices.len();

        data
    }
}
