//! Scene graph access for the exporter
//!
//! The exporter only talks to a host scene through [`SceneSource`]. Any
//! backend (an authoring tool API, a description file) can drive it.

mod file;

pub use file::{MeshDesc, NodeDesc, PolygonDesc, RotationLimitDesc, SceneFile};

use glam::Vec3;

/// Handle to a transform node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Handle to a mesh shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

/// Rotation axis of a transform node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn vector(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Lower and upper rotation limit of one axis, in degrees.
/// Either side may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationLimit {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

/// One polygon corner as attribute indices into the mesh arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerRef {
    pub position: usize,
    pub normal: usize,
    /// `None` when the polygon has no UVs
    pub uv: Option<usize>,
}

/// A polygon with the host's own triangulation
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub corners: Vec<CornerRef>,
    /// Triangles as indices into `corners`
    pub triangles: Vec<[usize; 3]>,
}

impl Polygon {
    pub fn has_uvs(&self) -> bool {
        self.corners.iter().all(|c| c.uv.is_some())
    }
}

/// Read access to a host scene graph
pub trait SceneSource {
    /// Nodes currently selected in the host
    fn selection(&self) -> Vec<NodeId>;

    fn find_node(&self, name: &str) -> Option<NodeId>;

    fn node_name(&self, node: NodeId) -> &str;

    /// Child transform nodes, in host order
    fn child_transforms(&self, node: NodeId) -> Vec<NodeId>;

    /// Mesh shapes owned directly by the node
    fn meshes_owned_by(&self, node: NodeId) -> Vec<MeshId>;

    fn mesh_name(&self, mesh: MeshId) -> &str;

    /// Polygons in stable host order
    fn polygons(&self, mesh: MeshId) -> Vec<Polygon>;

    fn vertex_position(&self, mesh: MeshId, index: usize) -> Vec3;

    fn vertex_normal(&self, mesh: MeshId, index: usize) -> Vec3;

    fn uv(&self, mesh: MeshId, index: usize) -> [f32; 2];

    /// Rotation pivot in object space
    fn pivot(&self, node: NodeId) -> Vec3;

    fn rotation_limit(&self, node: NodeId, axis: Axis) -> RotationLimit;
}
