//! ddxml model format (`<dftd-model>` documents)

mod document;
mod reader;

pub use document::{
    DdxmlDocument, IndexBuffer, IndexKind, Material, MeshData, ObjectNode, Rotation, TextureMap,
};
pub use reader::{parse_ddxml, strip_to_triangles, DdxmlParser, ParseState, ParsedMesh};

/// Root element tag
pub const DDXML_ROOT: &str = "dftd-model";

/// Format version written into the root element
pub const DDXML_VERSION: &str = "1.1";
