//! CLI argument parsing for environment creation and inspection.
//!
//! The default form creates an environment; `info` is the only subcommand.
use crate::error::DrenvError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ROS distributions with a matching base image.
pub const SUPPORTED_DISTROS: &[&str] = &["melodic", "noetic", "foxy", "humble", "iron"];

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "drenv",
    version,
    about = "Docker-based ROS development environments bound to a directory",
    after_help = "Examples:\n  drenv humble ~/ros_ws/env\n  drenv noetic ./env --no-gpu\n  drenv info ./env --json\n\nAfter creation, attach with:\n  . <ENV_DIR>/bin/activate",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub create: CreateArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Info(InfoArgs),
}

/// Inputs for creating a new environment.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// ROS distribution for the base image (melodic, noetic, foxy, humble, iron)
    #[arg(value_name = "ROS_DISTRO", required = true)]
    pub distro: Option<String>,

    /// Environment directory to create; its parent is mounted as the workspace
    #[arg(value_name = "ENV_DIR", required = true)]
    pub env_dir: Option<PathBuf>,

    /// Build the image without the docker layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Do not pass the host GPU through to the container
    #[arg(long)]
    pub no_gpu: bool,

    /// Install CUDA in the container
    #[arg(long)]
    pub cuda: bool,

    /// Docker executable
    #[arg(long, value_name = "BIN", env = "DRENV_DOCKER", default_value = "docker")]
    pub docker: String,

    /// Rocker executable
    #[arg(long, value_name = "BIN", env = "DRENV_ROCKER", default_value = "rocker")]
    pub rocker: String,

    /// Read staged resources from DIR instead of the embedded copies
    #[arg(long, value_name = "DIR", env = "DRENV_RESOURCE_DIR")]
    pub resource_dir: Option<PathBuf>,
}

/// Info command inputs.
#[derive(Parser, Debug)]
#[command(about = "Show the layout and container name of an environment")]
pub struct InfoArgs {
    /// Environment directory
    #[arg(value_name = "ENV_DIR")]
    pub env_dir: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Reject distributions without a known base image.
pub fn ensure_supported_distro(distro: &str) -> Result<(), DrenvError> {
    if SUPPORTED_DISTROS.contains(&distro) {
        return Ok(());
    }
    Err(DrenvError::UnsupportedDistro {
        distro: distro.to_string(),
        supported: SUPPORTED_DISTROS.join(", "),
    })
}
