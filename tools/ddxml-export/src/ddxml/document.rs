//! In-memory ddxml document construction and serialisation

use glam::{Mat4, Vec2, Vec3};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{DDXML_ROOT, DDXML_VERSION};
use crate::error::{DdxmlError, Result};

/// Diffuse texture map attached to a material
#[derive(Debug, Clone, PartialEq)]
pub struct TextureMap {
    pub filename: String,
    pub uscale: f32,
    pub vscale: f32,
    pub uoffset: f32,
    pub voffset: f32,
    pub angle: f32,
}

impl TextureMap {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            uscale: 1.0,
            vscale: 1.0,
            uoffset: 0.0,
            voffset: 0.0,
            angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub map: Option<TextureMap>,
}

impl Material {
    /// Plain white phong material used by the scene exporter
    pub fn phong(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse: [1.0, 1.0, 1.0],
            specular: [1.0, 0.95, 0.9],
            shininess: 30.0,
            map: None,
        }
    }

    /// White material carrying a diffuse texture
    pub fn textured(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse: [1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0],
            shininess: 60.0,
            map: Some(TextureMap::new(filename)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuffer {
    pub kind: IndexKind,
    pub indices: Vec<u32>,
}

/// Geometry of one `<mesh>` element
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    /// Material name, resolved to an id when the mesh is added
    pub material: Option<String>,
    pub vertices: Vec<Vec3>,
    pub index_buffers: Vec<IndexBuffer>,
    pub normals: Option<Vec<Vec3>>,
    pub texcoords: Option<Vec<Vec2>>,
    pub transformation: Mat4,
}

impl MeshData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            material: None,
            vertices: Vec::new(),
            index_buffers: Vec::new(),
            normals: None,
            texcoords: None,
            transformation: Mat4::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    pub axis: Vec3,
    pub angle: f32,
    pub min_angle: f32,
    pub max_angle: f32,
}

/// Entry of the `<objecttree>`
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub id: u32,
    pub name: String,
    pub mesh_id: u32,
    pub translation: Option<Vec3>,
    pub rotations: Vec<Rotation>,
    children: Vec<usize>,
}

#[derive(Debug)]
struct MaterialEntry {
    id: u32,
    material: Material,
}

#[derive(Debug)]
struct MeshEntry {
    id: u32,
    material_id: Option<u32>,
    data: MeshData,
}

/// Builder for a complete ddxml document.
///
/// Names are resolved when elements are added, so a document that builds
/// successfully always serialises with consistent id references.
#[derive(Debug, Default)]
pub struct DdxmlDocument {
    materials: Vec<MaterialEntry>,
    meshes: Vec<MeshEntry>,
    objects: Vec<ObjectNode>,
    roots: Vec<usize>,
}

impl DdxmlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material, returning its id
    pub fn add_material(&mut self, material: Material) -> u32 {
        let id = self.materials.len() as u32;
        self.materials.push(MaterialEntry { id, material });
        id
    }

    /// Register a mesh, returning its id. Mesh names must be unique.
    pub fn add_mesh(&mut self, mesh: MeshData) -> Result<u32> {
        if self.meshes.iter().any(|m| m.data.name == mesh.name) {
            return Err(DdxmlError::format(format!("duplicate mesh '{}'", mesh.name)));
        }
        let material_id = match &mesh.material {
            Some(name) => Some(self.material_id(name)?),
            None => None,
        };

        let id = self.meshes.len() as u32;
        self.meshes.push(MeshEntry {
            id,
            material_id,
            data: mesh,
        });
        Ok(id)
    }

    /// Add an object referring to a registered mesh, below `parent` or at the tree root
    pub fn add_object(&mut self, name: &str, mesh: &str, parent: Option<&str>) -> Result<u32> {
        let parent_idx = match parent {
            Some(parent) => Some(self.object_index(parent, "parent object")?),
            None => None,
        };
        let mesh_id = self.mesh_id(mesh)?;

        let id = self.objects.len() as u32;
        let idx = self.objects.len();
        self.objects.push(ObjectNode {
            id,
            name: name.to_string(),
            mesh_id,
            translation: None,
            rotations: Vec::new(),
            children: Vec::new(),
        });

        match parent_idx {
            Some(p) => self.objects[p].children.push(idx),
            None => self.roots.push(idx),
        }
        Ok(id)
    }

    pub fn add_translation(&mut self, object: &str, vector: Vec3) -> Result<()> {
        let idx = self.object_index(object, "object")?;
        self.objects[idx].translation = Some(vector);
        Ok(())
    }

    pub fn add_rotation(&mut self, object: &str, rotation: Rotation) -> Result<()> {
        let idx = self.object_index(object, "object")?;
        self.objects[idx].rotations.push(rotation);
        Ok(())
    }

    pub fn meshes(&self) -> impl Iterator<Item = &MeshData> {
        self.meshes.iter().map(|m| &m.data)
    }

    pub fn objects(&self) -> &[ObjectNode] {
        &self.objects
    }

    /// Children of an object, in insertion order
    pub fn children(&self, object: &ObjectNode) -> impl Iterator<Item = &ObjectNode> {
        object.children.iter().map(|&i| &self.objects[i])
    }

    fn material_id(&self, name: &str) -> Result<u32> {
        self.materials
            .iter()
            .find(|m| m.material.name == name)
            .map(|m| m.id)
            .ok_or_else(|| DdxmlError::lookup("material", name))
    }

    fn mesh_id(&self, name: &str) -> Result<u32> {
        self.meshes
            .iter()
            .find(|m| m.data.name == name)
            .map(|m| m.id)
            .ok_or_else(|| DdxmlError::lookup("mesh", name))
    }

    fn object_index(&self, name: &str, kind: &'static str) -> Result<usize> {
        self.objects
            .iter()
            .position(|o| o.name == name)
            .ok_or_else(|| DdxmlError::lookup(kind, name))
    }

    /// Serialise the whole document
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;

        let mut root = BytesStart::new(DDXML_ROOT);
        root.push_attribute(("version", DDXML_VERSION));
        writer.write_event(Event::Start(root))?;

        for entry in &self.materials {
            write_material(&mut writer, entry)?;
        }
        for entry in &self.meshes {
            write_mesh(&mut writer, entry)?;
        }
        if !self.objects.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("objecttree")))?;
            for &root in &self.roots {
                self.write_object(&mut writer, root)?;
            }
            writer.write_event(Event::End(BytesEnd::new("objecttree")))?;
        }

        writer.write_event(Event::End(BytesEnd::new(DDXML_ROOT)))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| DdxmlError::format(format!("document is not UTF-8: {}", e)))?;
        xml.push('\n');
        Ok(xml)
    }

    fn write_object(&self, writer: &mut Writer<Vec<u8>>, idx: usize) -> Result<()> {
        let object = &self.objects[idx];

        let mut start = BytesStart::new("object");
        start.push_attribute(("id", object.id.to_string().as_str()));
        start.push_attribute(("name", object.name.as_str()));
        start.push_attribute(("mesh", object.mesh_id.to_string().as_str()));
        writer.write_event(Event::Start(start))?;

        if let Some(t) = object.translation {
            write_empty(writer, "translation", &[("vector", fixed3(t).as_str())])?;
        }
        for rot in &object.rotations {
            write_empty(
                writer,
                "rotation",
                &[
                    ("axis", format!("{} {} {}", rot.axis.x, rot.axis.y, rot.axis.z).as_str()),
                    ("angle", fixed(rot.angle).as_str()),
                    ("minangle", fixed(rot.min_angle).as_str()),
                    ("maxangle", fixed(rot.max_angle).as_str()),
                ],
            )?;
        }
        for &child in &object.children {
            self.write_object(writer, child)?;
        }

        writer.write_event(Event::End(BytesEnd::new("object")))?;
        Ok(())
    }
}

fn write_material(writer: &mut Writer<Vec<u8>>, entry: &MaterialEntry) -> Result<()> {
    let mat = &entry.material;

    let mut start = BytesStart::new("material");
    start.push_attribute(("name", mat.name.as_str()));
    start.push_attribute(("id", entry.id.to_string().as_str()));
    writer.write_event(Event::Start(start))?;

    write_empty(writer, "diffuse", &[("color", color(mat.diffuse).as_str())])?;
    write_empty(writer, "specular", &[("color", color(mat.specular).as_str())])?;
    write_empty(writer, "shininess", &[("exponent", mat.shininess.to_string().as_str())])?;
    if let Some(map) = &mat.map {
        write_empty(
            writer,
            "map",
            &[
                ("type", "diffuse"),
                ("filename", map.filename.as_str()),
                ("uscal", map.uscale.to_string().as_str()),
                ("vscal", map.vscale.to_string().as_str()),
                ("uoffset", map.uoffset.to_string().as_str()),
                ("voffset", map.voffset.to_string().as_str()),
                ("angle", map.angle.to_string().as_str()),
            ],
        )?;
    }

    writer.write_event(Event::End(BytesEnd::new("material")))?;
    Ok(())
}

fn write_mesh(writer: &mut Writer<Vec<u8>>, entry: &MeshEntry) -> Result<()> {
    let mesh = &entry.data;

    let mut start = BytesStart::new("mesh");
    start.push_attribute(("name", mesh.name.as_str()));
    start.push_attribute(("id", entry.id.to_string().as_str()));
    if let Some(material_id) = entry.material_id {
        start.push_attribute(("material", material_id.to_string().as_str()));
    }
    writer.write_event(Event::Start(start))?;

    let vertices = join(mesh.vertices.iter().map(|v| fixed3(*v)));
    write_text(
        writer,
        "vertices",
        &[("nr", mesh.vertices.len().to_string().as_str())],
        &vertices,
    )?;

    for buffer in &mesh.index_buffers {
        let nr = buffer.indices.len().to_string();
        let text = join(buffer.indices.iter().map(u32::to_string));
        match buffer.kind {
            IndexKind::TriangleList => write_text(writer, "indices", &[("nr", nr.as_str())], &text)?,
            IndexKind::TriangleStrip => write_text(
                writer,
                "indices",
                &[("type", "triangle_strip"), ("nr", nr.as_str())],
                &text,
            )?,
        }
    }

    if let Some(normals) = &mesh.normals {
        write_text(writer, "normals", &[], &join(normals.iter().map(|n| fixed3(*n))))?;
    }
    if let Some(texcoords) = &mesh.texcoords {
        let text = join(texcoords.iter().map(|t| format!("{} {}", fixed(t.x), fixed(t.y))));
        write_text(writer, "texcoords", &[], &text)?;
    }

    let matrix = join(mesh.transformation.transpose().to_cols_array().iter().map(f32::to_string));
    write_text(writer, "transformation", &[], &matrix)?;

    writer.write_event(Event::End(BytesEnd::new("mesh")))?;
    Ok(())
}

fn write_empty(writer: &mut Writer<Vec<u8>>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut elem = BytesStart::new(name);
    for &attr in attrs {
        elem.push_attribute(attr);
    }
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

fn write_text(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    for &attr in attrs {
        start.push_attribute(attr);
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Six decimal places, as every exported coordinate and angle
pub(crate) fn fixed(v: f32) -> String {
    format!("{:.6}", v)
}

fn fixed3(v: Vec3) -> String {
    format!("{:.6} {:.6} {:.6}", v.x, v.y, v.z)
}

fn color(c: [f32; 3]) -> String {
    format!("{} {} {}", c[0], c[1], c[2])
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(name: &str) -> MeshData {
        let mut mesh = MeshData::new(name);
        mesh.material = Some("phong1SG".to_string());
        mesh.vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        mesh.index_buffers.push(IndexBuffer {
            kind: IndexKind::TriangleList,
            indices: vec![0, 1, 2],
        });
        mesh
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut doc = DdxmlDocument::new();
        assert_eq!(doc.add_material(Material::phong("phong1SG")), 0);
        assert_eq!(doc.add_mesh(triangle("a")).unwrap(), 0);
        assert_eq!(doc.add_mesh(triangle("b")).unwrap(), 1);
        assert_eq!(doc.add_object("root", "a", None).unwrap(), 0);
        assert_eq!(doc.add_object("arm", "b", Some("root")).unwrap(), 1);

        let root = &doc.objects()[0];
        let children: Vec<_> = doc.children(root).map(|o| o.name.as_str()).collect();
        assert_eq!(children, vec!["arm"]);
    }

    #[test]
    fn test_unknown_names_are_lookup_errors() {
        let mut doc = DdxmlDocument::new();
        let err = doc.add_mesh(triangle("a")).unwrap_err();
        assert!(matches!(err, DdxmlError::LookupError { kind: "material", .. }));

        doc.add_material(Material::phong("phong1SG"));
        doc.add_mesh(triangle("a")).unwrap();
        assert!(matches!(
            doc.add_object("root", "missing", None),
            Err(DdxmlError::LookupError { kind: "mesh", .. })
        ));
        assert!(matches!(
            doc.add_object("root", "a", Some("nobody")),
            Err(DdxmlError::LookupError { .. })
        ));
        assert!(doc.add_translation("nobody", Vec3::X).is_err());
    }

    #[test]
    fn test_rejects_duplicate_mesh_name() {
        let mut doc = DdxmlDocument::new();
        doc.add_material(Material::phong("phong1SG"));
        doc.add_mesh(triangle("shape")).unwrap();
        let err = doc.add_mesh(triangle("shape")).unwrap_err();
        assert!(matches!(err, DdxmlError::FormatError(_)));
        assert_eq!(doc.meshes().count(), 1);
    }

    #[test]
    fn test_serialises_object_tree() {
        let mut doc = DdxmlDocument::new();
        doc.add_material(Material::phong("phong1SG"));
        doc.add_mesh(triangle("hullShape")).unwrap();
        doc.add_mesh(triangle("rudderShape")).unwrap();
        doc.add_object("hull", "hullShape", None).unwrap();
        doc.add_object("rudder", "rudderShape", Some("hull")).unwrap();
        doc.add_translation("rudder", Vec3::new(0.0, -1.5, 0.25)).unwrap();
        doc.add_rotation(
            "rudder",
            Rotation {
                axis: Vec3::Z,
                angle: 0.0,
                min_angle: -30.0,
                max_angle: 30.0,
            },
        )
        .unwrap();

        let xml = doc.to_xml().unwrap();
        assert!(xml.contains(r#"<dftd-model version="1.1">"#));
        assert!(xml.contains(r#"<material name="phong1SG" id="0">"#));
        assert!(xml.contains(r#"<specular color="1 0.95 0.9"/>"#));
        assert!(xml.contains(r#"<mesh name="rudderShape" id="1" material="0">"#));
        assert!(xml.contains(r#"<vertices nr="3">0.000000 0.000000 0.000000 1.000000"#));
        assert!(xml.contains(r#"<indices nr="3">0 1 2</indices>"#));
        assert!(xml.contains("<transformation>1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1</transformation>"));
        assert!(xml.contains(r#"<translation vector="0.000000 -1.500000 0.250000"/>"#));
        assert!(xml.contains(
            r#"<rotation axis="0 0 1" angle="0.000000" minangle="-30.000000" maxangle="30.000000"/>"#
        ));

        let hull = xml.find(r#"name="hull""#).unwrap();
        let rudder = xml.find(r#"name="rudder""#).unwrap();
        let hull_end = xml.rfind("</object>").unwrap();
        assert!(hull < rudder && rudder < hull_end);
    }

    #[test]
    fn test_transformation_is_row_major() {
        let mut doc = DdxmlDocument::new();
        let mut mesh = MeshData::new("moved");
        mesh.transformation = Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0));
        doc.add_mesh(mesh).unwrap();

        let xml = doc.to_xml().unwrap();
        assert!(xml.contains("<transformation>1 0 0 5 0 1 0 6 0 0 1 7 0 0 0 1</transformation>"));
    }

    #[test]
    fn test_escapes_names() {
        let mut doc = DdxmlDocument::new();
        doc.add_mesh(MeshData::new("a<b>&c")).unwrap();
        let xml = doc.to_xml().unwrap();
        assert!(xml.contains("a&lt;b&gt;&amp;c"));
    }
}
