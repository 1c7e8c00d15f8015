//! TOML scene descriptions
//!
//! A flat list of transform nodes (each naming its parent) and mesh shapes
//! (each naming the node that owns it). Polygons reference the mesh
//! attribute arrays by index, one entry per corner.

use anyhow::Context;
use glam::Vec3;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use super::{Axis, CornerRef, MeshId, NodeId, Polygon, RotationLimit, SceneSource};
use crate::error::{DdxmlError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    /// Names of the nodes selected in the host
    #[serde(default)]
    pub selection: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDesc>,
    #[serde(default)]
    pub meshes: Vec<MeshDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub pivot: Vec3,
    #[serde(default)]
    pub rotate_x: Option<RotationLimitDesc>,
    #[serde(default)]
    pub rotate_y: Option<RotationLimitDesc>,
    #[serde(default)]
    pub rotate_z: Option<RotationLimitDesc>,
}

/// Rotation limits in degrees
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RotationLimitDesc {
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshDesc {
    pub name: String,
    /// Name of the transform node this shape belongs to
    pub owner: String,
    pub positions: Vec<Vec3>,
    #[serde(default)]
    pub normals: Vec<Vec3>,
    #[serde(default)]
    pub uvs: Vec<[f32; 2]>,
    #[serde(default)]
    pub polygons: Vec<PolygonDesc>,
}

/// Per-corner attribute indices of one polygon
#[derive(Debug, Clone, Deserialize)]
pub struct PolygonDesc {
    pub positions: Vec<usize>,
    pub normals: Vec<usize>,
    #[serde(default)]
    pub uvs: Option<Vec<usize>>,
    /// Explicit triangulation; a fan around corner 0 when absent
    #[serde(default)]
    pub triangles: Option<Vec<[usize; 3]>>,
}

impl SceneFile {
    /// Parse and validate a scene description
    pub fn parse(content: &str) -> Result<Self> {
        let scene: SceneFile = toml::from_str(content)
            .map_err(|e| DdxmlError::format(format!("bad scene description: {}", e)))?;
        scene.validate()?;
        Ok(scene)
    }

    /// Load a scene description file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene: {:?}", path))?;
        let scene =
            Self::parse(&content).with_context(|| format!("Failed to load scene: {:?}", path))?;
        tracing::info!(
            "Loaded scene {:?}: {} nodes, {} meshes",
            path,
            scene.nodes.len(),
            scene.meshes.len()
        );
        Ok(scene)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(DdxmlError::format(format!("duplicate node '{}'", node.name)));
            }
        }

        for node in &self.nodes {
            if let Some(parent) = &node.parent {
                if !names.contains(parent.as_str()) {
                    return Err(DdxmlError::format(format!(
                        "node '{}' has unknown parent '{}'",
                        node.name, parent
                    )));
                }
            }
            self.check_acyclic(node)?;
        }

        if let Some(name) = self.selection.iter().find(|s| !names.contains(s.as_str())) {
            return Err(DdxmlError::format(format!("selected node '{}' does not exist", name)));
        }

        let mut mesh_names = HashSet::new();
        for mesh in &self.meshes {
            if !mesh_names.insert(mesh.name.as_str()) {
                return Err(DdxmlError::format(format!("duplicate mesh '{}'", mesh.name)));
            }
            if !names.contains(mesh.owner.as_str()) {
                return Err(DdxmlError::format(format!(
                    "mesh '{}' is owned by unknown node '{}'",
                    mesh.name, mesh.owner
                )));
            }
            for (i, poly) in mesh.polygons.iter().enumerate() {
                validate_polygon(mesh, i, poly)?;
            }
        }
        Ok(())
    }

    fn check_acyclic(&self, node: &NodeDesc) -> Result<()> {
        let mut current = node.parent.as_deref();
        for _ in 0..self.nodes.len() {
            let Some(name) = current else {
                return Ok(());
            };
            if name == node.name {
                break;
            }
            current = self
                .nodes
                .iter()
                .find(|n| n.name == name)
                .and_then(|n| n.parent.as_deref());
        }
        Err(DdxmlError::format(format!(
            "node '{}' has a cyclic parent chain",
            node.name
        )))
    }

    fn node(&self, node: NodeId) -> &NodeDesc {
        &self.nodes[node.0]
    }

    fn mesh(&self, mesh: MeshId) -> &MeshDesc {
        &self.meshes[mesh.0]
    }
}

fn validate_polygon(mesh: &MeshDesc, index: usize, poly: &PolygonDesc) -> Result<()> {
    let fail = |what: String| {
        Err(DdxmlError::format(format!(
            "mesh '{}' polygon {}: {}",
            mesh.name, index, what
        )))
    };

    let corners = poly.positions.len();
    if corners < 3 {
        return fail(format!("has {} corners, need at least 3", corners));
    }
    if poly.normals.len() != corners {
        return fail(format!("{} normals for {} corners", poly.normals.len(), corners));
    }
    if let Some(uvs) = &poly.uvs {
        if uvs.len() != corners {
            return fail(format!("{} uvs for {} corners", uvs.len(), corners));
        }
        if let Some(&bad) = uvs.iter().find(|&&i| i >= mesh.uvs.len()) {
            return fail(format!("uv index {} out of range", bad));
        }
    }
    if let Some(&bad) = poly.positions.iter().find(|&&i| i >= mesh.positions.len()) {
        return fail(format!("position index {} out of range", bad));
    }
    if let Some(&bad) = poly.normals.iter().find(|&&i| i >= mesh.normals.len()) {
        return fail(format!("normal index {} out of range", bad));
    }
    if let Some(triangles) = &poly.triangles {
        if triangles.iter().flatten().any(|&c| c >= corners) {
            return fail("triangle refers to a missing corner".to_string());
        }
    }
    Ok(())
}

/// Fan triangulation around corner 0
fn fan(corners: usize) -> Vec<[usize; 3]> {
    (1..corners - 1).map(|i| [0, i, i + 1]).collect()
}

impl SceneSource for SceneFile {
    fn selection(&self) -> Vec<NodeId> {
        self.selection
            .iter()
            .filter_map(|name| self.find_node(name))
            .collect()
    }

    fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    fn node_name(&self, node: NodeId) -> &str {
        &self.node(node).name
    }

    fn child_transforms(&self, node: NodeId) -> Vec<NodeId> {
        let name = self.node_name(node);
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.as_deref() == Some(name))
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    fn meshes_owned_by(&self, node: NodeId) -> Vec<MeshId> {
        let name = self.node_name(node);
        self.meshes
            .iter()
            .enumerate()
            .filter(|(_, m)| m.owner == name)
            .map(|(i, _)| MeshId(i))
            .collect()
    }

    fn mesh_name(&self, mesh: MeshId) -> &str {
        &self.mesh(mesh).name
    }

    fn polygons(&self, mesh: MeshId) -> Vec<Polygon> {
        self.mesh(mesh)
            .polygons
            .iter()
            .map(|p| {
                let corners = (0..p.positions.len())
                    .map(|i| CornerRef {
                        position: p.positions[i],
                        normal: p.normals[i],
                        uv: p.uvs.as_ref().map(|uvs| uvs[i]),
                    })
                    .collect();
                Polygon {
                    corners,
                    triangles: p
                        .triangles
                        .clone()
                        .unwrap_or_else(|| fan(p.positions.len())),
                }
            })
            .collect()
    }

    fn vertex_position(&self, mesh: MeshId, index: usize) -> Vec3 {
        self.mesh(mesh).positions[index]
    }

    fn vertex_normal(&self, mesh: MeshId, index: usize) -> Vec3 {
        self.mesh(mesh).normals[index]
    }

    fn uv(&self, mesh: MeshId, index: usize) -> [f32; 2] {
        self.mesh(mesh).uvs[index]
    }

    fn pivot(&self, node: NodeId) -> Vec3 {
        self.node(node).pivot
    }

    fn rotation_limit(&self, node: NodeId, axis: Axis) -> RotationLimit {
        let node = self.node(node);
        let desc = match axis {
            Axis::X => node.rotate_x,
            Axis::Y => node.rotate_y,
            Axis::Z => node.rotate_z,
        };
        desc.map(|d| RotationLimit {
            min: d.min,
            max: d.max,
        })
        .unwrap_or_default()
    }
}
