//! Streaming ddxml reader
//!
//! Walks `quick-xml` events through an explicit state machine and collects
//! the geometry of every `<mesh>` element. All parse state lives in a
//! [`DdxmlParser`] created per document.

use glam::{Vec2, Vec3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{DdxmlError, Result};

/// Parser position relative to the element structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Outside any mesh
    Idle,
    InMesh,
    InVertices,
    InIndices { strip: bool },
    InTexcoords,
    /// Inside a mesh child whose content is not needed, `depth` levels below it
    InMeshChild { depth: u32 },
}

/// Geometry recovered from one `<mesh>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMesh {
    pub name: String,
    pub vertices: Vec<Vec3>,
    /// Flat triangle list, present if the mesh has an `<indices>` element without a type
    pub indices: Option<Vec<u32>>,
    /// Raw triangle strip, present if the mesh has a `type="triangle_strip"` element
    pub strip: Option<Vec<u32>>,
    pub texcoords: Vec<Vec2>,
}

impl ParsedMesh {
    /// Triangle list for this mesh, decoding the strip when no flat list exists.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        if let Some(indices) = &self.indices {
            return indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect();
        }
        match &self.strip {
            Some(strip) => strip_to_triangles(strip),
            None => Vec::new(),
        }
    }
}

/// Convert a triangle strip to a triangle list, dropping degenerate triangles.
pub fn strip_to_triangles(strip: &[u32]) -> Vec<[u32; 3]> {
    strip
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[0] != w[1] && w[1] != w[2] && w[0] != w[2])
        .map(|(i, w)| {
            if i % 2 == 0 {
                [w[0], w[1], w[2]]
            } else {
                [w[1], w[0], w[2]]
            }
        })
        .collect()
}

/// Per-document parser state
pub struct DdxmlParser {
    state: ParseState,
    current: Option<ParsedMesh>,
    /// Expected element count from the `nr` attribute of the open element
    expected: Option<usize>,
    text: String,
    meshes: Vec<ParsedMesh>,
}

impl Default for DdxmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DdxmlParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            current: None,
            expected: None,
            text: String::new(),
            meshes: Vec::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Parse a whole document, consuming the parser
    pub fn parse(mut self, xml: &str) -> Result<Vec<ParsedMesh>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event()? {
                Event::Start(e) => self.start(&e)?,
                Event::Empty(e) => {
                    self.start(&e)?;
                    self.end(e.name().as_ref())?;
                }
                Event::End(e) => self.end(e.name().as_ref())?,
                Event::Text(t) => {
                    if self.collects_text() {
                        self.text.push_str(&t.unescape()?);
                        self.text.push(' ');
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if self.state != ParseState::Idle {
            return Err(DdxmlError::format("document ended inside a mesh"));
        }
        Ok(self.meshes)
    }

    fn collects_text(&self) -> bool {
        matches!(
            self.state,
            ParseState::InVertices | ParseState::InIndices { .. } | ParseState::InTexcoords
        )
    }

    fn start(&mut self, e: &BytesStart) -> Result<()> {
        let name = e.name();
        self.state = match (self.state, name.as_ref()) {
            (ParseState::Idle, b"mesh") => {
                let mesh_name = attribute(e, "name")?.unwrap_or_default();
                tracing::debug!("Reading mesh '{}'", mesh_name);
                self.current = Some(ParsedMesh {
                    name: mesh_name,
                    ..Default::default()
                });
                ParseState::InMesh
            }
            (ParseState::Idle, _) => ParseState::Idle,
            (ParseState::InMesh, b"vertices") => {
                self.begin_data(e)?;
                ParseState::InVertices
            }
            (ParseState::InMesh, b"indices") => {
                self.begin_data(e)?;
                let strip = attribute(e, "type")?.as_deref() == Some("triangle_strip");
                ParseState::InIndices { strip }
            }
            (ParseState::InMesh, b"texcoords") => {
                self.begin_data(e)?;
                ParseState::InTexcoords
            }
            (ParseState::InMesh, _) => ParseState::InMeshChild { depth: 0 },
            (ParseState::InMeshChild { depth }, _) => ParseState::InMeshChild { depth: depth + 1 },
            (state, other) => {
                return Err(DdxmlError::format(format!(
                    "unexpected <{}> in state {:?}",
                    String::from_utf8_lossy(other),
                    state
                )))
            }
        };
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<()> {
        self.state = match (self.state, name) {
            (ParseState::InMesh, b"mesh") => {
                if let Some(mesh) = self.current.take() {
                    self.finish_mesh(mesh)?;
                }
                ParseState::Idle
            }
            (ParseState::InVertices, b"vertices") => {
                let values = self.take_floats()?;
                if values.len() % 3 != 0 {
                    return Err(DdxmlError::format(format!(
                        "vertex data has {} values, not a multiple of 3",
                        values.len()
                    )));
                }
                let vertices: Vec<Vec3> = values.chunks_exact(3).map(Vec3::from_slice).collect();
                self.check_count("vertices", vertices.len())?;
                self.mesh_mut()?.vertices = vertices;
                ParseState::InMesh
            }
            (ParseState::InIndices { strip }, b"indices") => {
                let indices = self.take_indices()?;
                self.check_count("indices", indices.len())?;
                let mesh = self.mesh_mut()?;
                if strip {
                    mesh.strip = Some(indices);
                } else {
                    mesh.indices = Some(indices);
                }
                ParseState::InMesh
            }
            (ParseState::InTexcoords, b"texcoords") => {
                let values = self.take_floats()?;
                if values.len() % 2 != 0 {
                    return Err(DdxmlError::format(format!(
                        "texcoord data has {} values, not a multiple of 2",
                        values.len()
                    )));
                }
                self.mesh_mut()?.texcoords = values.chunks_exact(2).map(Vec2::from_slice).collect();
                ParseState::InMesh
            }
            (ParseState::InMeshChild { depth: 0 }, _) => ParseState::InMesh,
            (ParseState::InMeshChild { depth }, _) => ParseState::InMeshChild { depth: depth - 1 },
            (state, _) => state,
        };
        Ok(())
    }

    fn begin_data(&mut self, e: &BytesStart) -> Result<()> {
        self.text.clear();
        self.expected = match attribute(e, "nr")? {
            Some(nr) => Some(
                nr.parse()
                    .map_err(|_| DdxmlError::format(format!("bad nr attribute '{}'", nr)))?,
            ),
            None => None,
        };
        Ok(())
    }

    fn check_count(&mut self, element: &str, actual: usize) -> Result<()> {
        match self.expected.take() {
            Some(expected) if expected != actual => Err(DdxmlError::format(format!(
                "<{}> declares nr={} but holds {} entries",
                element, expected, actual
            ))),
            _ => Ok(()),
        }
    }

    fn take_floats(&mut self) -> Result<Vec<f32>> {
        let text = std::mem::take(&mut self.text);
        text.split_whitespace()
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|_| DdxmlError::format(format!("bad number '{}'", v)))
            })
            .collect()
    }

    fn take_indices(&mut self) -> Result<Vec<u32>> {
        let text = std::mem::take(&mut self.text);
        text.split_whitespace()
            .map(|v| {
                v.parse::<u32>()
                    .map_err(|_| DdxmlError::format(format!("bad index '{}'", v)))
            })
            .collect()
    }

    fn mesh_mut(&mut self) -> Result<&mut ParsedMesh> {
        self.current
            .as_mut()
            .ok_or_else(|| DdxmlError::format("mesh data outside of <mesh>"))
    }

    fn finish_mesh(&mut self, mesh: ParsedMesh) -> Result<()> {
        if !mesh.texcoords.is_empty() && mesh.texcoords.len() != mesh.vertices.len() {
            return Err(DdxmlError::format(format!(
                "mesh '{}' has {} texcoords for {} vertices",
                mesh.name,
                mesh.texcoords.len(),
                mesh.vertices.len()
            )));
        }

        let count = mesh.vertices.len() as u32;
        let referenced = mesh.indices.iter().chain(mesh.strip.iter()).flatten();
        if let Some(bad) = referenced.copied().find(|&i| i >= count) {
            return Err(DdxmlError::format(format!(
                "mesh '{}' references vertex {} but has only {}",
                mesh.name, bad, count
            )));
        }
        self.meshes.push(mesh);
        Ok(())
    }
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Parse every mesh of a ddxml document
pub fn parse_ddxml(xml: &str) -> Result<Vec<ParsedMesh>> {
    DdxmlParser::new().parse(xml)
}
