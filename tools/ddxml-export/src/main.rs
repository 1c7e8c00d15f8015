//! ddxml-export - ddxml asset pipeline tool
//!
//! Converts PGM heightmaps and scene descriptions to ddxml models, dumps
//! ddxml meshes as OFF files and runs the group listening apparatus model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use ddxml_export::{config, export, oogl, sonar, terrain};

#[derive(Parser)]
#[command(name = "ddxml-export")]
#[command(about = "ddxml asset pipeline tool")]
#[command(version)]
struct Cli {
    /// Path to a ddxml.toml configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triangulate a PGM heightmap into a ddxml terrain mesh
    Heightmap {
        /// Input PGM file
        input: PathBuf,

        /// Output .ddxml file
        output: PathBuf,

        /// Diffuse texture filename written into the material
        texture: Option<String>,

        /// Horizontal sample spacing (overrides config)
        #[arg(long)]
        xscale: Option<f32>,

        /// Vertical sample spacing (overrides config)
        #[arg(long)]
        yscale: Option<f32>,

        /// Height multiplier (overrides config)
        #[arg(long)]
        height_mult: Option<f32>,
    },

    /// Export a scene description to a ddxml model
    Scene {
        /// Input scene description (.toml)
        input: PathBuf,

        /// Output .ddxml file (asked for interactively when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root node to export instead of the selected node
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Write every mesh of a ddxml file as Geomview OFF files, one per LOD level
    Oogl {
        /// Input .ddxml file
        input: PathBuf,
    },

    /// Simulate the group listening apparatus
    Sonar {
        /// Apparatus angle in degrees; without it the plot is shown with gnuplot
        angle: Option<f64>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Heightmap {
            input,
            output,
            texture,
            xscale,
            yscale,
            height_mult,
        } => {
            let mut heightmap = config.heightmap;
            if let Some(x) = xscale {
                heightmap.xscale = x;
            }
            if let Some(y) = yscale {
                heightmap.yscale = y;
            }
            if let Some(m) = height_mult {
                heightmap.height_mult = m;
            }
            tracing::info!("Converting {:?} -> {:?}", input, output);
            terrain::convert_heightmap(&input, &output, texture.as_deref(), &heightmap)?;
            tracing::info!("Done!");
        }

        Commands::Scene {
            input,
            output,
            root,
        } => {
            tracing::info!("Exporting scene {:?}", input);
            export::export_scene_file(&input, root.as_deref(), &config.export, || match output {
                Some(path) => Ok(path),
                None => prompt_output(),
            })?;
            tracing::info!("Done!");
        }

        Commands::Oogl { input } => {
            let written = oogl::write_oogl(&input, &config.oogl)?;
            tracing::info!("Wrote {} OFF files", written.len());
        }

        Commands::Sonar { angle } => {
            let dir = std::env::current_dir().context("Failed to get working directory")?;
            sonar::run(angle, &config.sonar, &dir)?;
        }
    }

    Ok(())
}

/// Ask for the output filename on stdin
fn prompt_output() -> Result<PathBuf> {
    print!("Output file: ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read output filename")?;

    let name = line.trim();
    if name.is_empty() {
        anyhow::bail!("No output file given");
    }
    Ok(PathBuf::from(name))
}
