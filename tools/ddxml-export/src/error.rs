//! Error type shared by the converters.

/// Errors raised while reading inputs or assembling a ddxml document.
///
/// Every variant is fatal to the current invocation.
#[derive(Debug, thiserror::Error)]
pub enum DdxmlError {
    #[error("Malformed input: {0}")]
    FormatError(String),

    #[error("Bad selection: {0}")]
    SelectionError(String),

    #[error("No mesh found for object: {node}")]
    NoMeshError { node: String },

    #[error("Multiple meshes found on object: {node}")]
    MultipleMeshError { node: String },

    #[error("Cannot find {kind} named '{name}'")]
    LookupError { kind: &'static str, name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl DdxmlError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        DdxmlError::FormatError(msg.into())
    }

    pub(crate) fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        DdxmlError::LookupError {
            kind,
            name: name.into(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for DdxmlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        DdxmlError::Xml(err.into())
    }
}

pub type Result<T, E = DdxmlError> = std::result::Result<T, E>;
