//! ddxml-export library
//!
//! Asset pipeline conversions around the ddxml model format: heightmap
//! triangulation, scene graph export, OFF dumps and the sonar simulation.

pub mod config;
pub mod ddxml;
pub mod dedup;
pub mod error;
pub mod export;
pub mod heightmap;
pub mod oogl;
pub mod scene;
pub mod sonar;
pub mod terrain;

pub use config::{
    load_config, Config, ExportConfig, HeightmapConfig, MissingUvs, OoglConfig, SonarConfig,
};
pub use ddxml::{parse_ddxml, DdxmlDocument, ParsedMesh};
pub use error::DdxmlError;
pub use export::{export_scene, export_scene_file, ExportStats};
pub use heightmap::Heightmap;
pub use scene::{SceneFile, SceneSource};
pub use terrain::{convert_heightmap, triangulate, TerrainMesh};
