use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::color::ColorMode;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build a local container image for the project
    Build {
        /// Image tag (default: dev.local/<project-name>)
        #[arg(short = 't', long)]
        tag: Option<String>,
        /// Build with Buildah instead of Docker
        #[arg(long)]
        buildah: bool,
        /// Extra options passed to `buildah bud` (requires --buildah), e.g. --format=docker
        #[arg(long = "buildah-options", allow_hyphen_values = true)]
        buildah_options: Option<String>,
        /// Extra options passed to `docker build`
        #[arg(long = "docker-options", allow_hyphen_values = true)]
        docker_options: Option<String>,
        /// Push the image after a successful build
        #[arg(long)]
        push: bool,
    },

    /// Extract the stack template and project sources into a directory
    Extract {
        /// Directory to extract into (must not exist; default: <home>/extract/<project-name>)
        #[arg(long = "target-dir")]
        target_dir: Option<PathBuf>,
        /// Use Buildah instead of Docker to read the stack image
        #[arg(long)]
        buildah: bool,
    },

    /// Inspect a local image with `docker image inspect`
    Inspect {
        /// Image reference
        image: String,
    },

    /// Print version and build information
    Version,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "appsody",
    version,
    about = "Build container images for stack-based projects with Docker or Buildah.",
    after_long_help = "Examples:\n  appsody build\n  appsody build --buildah --buildah-options --format=docker\n  appsody --dryrun build -t dev.local/demo:1.0\n  appsody inspect dev.local/demo\n"
)]
pub struct Cli {
    /// Config file (default: $APPSODY_HOME/.appsody.yaml or ~/.appsody/.appsody.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the external commands that would run, but do not execute them
    #[arg(long, global = true)]
    pub dryrun: bool,

    /// Print detailed execution info
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub color: Option<ColorMode>,

    #[command(subcommand)]
    pub command: Command,
}
