//! CLI argument parsing module for refreeze

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Re-freeze Python requirements against the base image of a Dockerfile
///
/// Settings left unset here fall back to `refreeze.toml` in the working tree,
/// then to built-in defaults.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "refreeze",
    version,
    about = "Re-freeze Python requirements against a container base image"
)]
pub struct CliArgs {
    /// Working tree mounted into the environment (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Build descriptor declaring the base image [default: Dockerfile]
    #[arg(long, value_name = "FILE")]
    pub dockerfile: Option<PathBuf>,

    /// Abstract dependency spec; repeatable [default: requirements.in]
    #[arg(long = "spec", value_name = "FILE", action = ArgAction::Append)]
    pub specs: Vec<PathBuf>,

    /// Frozen manifest to regenerate [default: requirements.txt]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Target platform of the environment [default: linux/amd64]
    #[arg(long)]
    pub platform: Option<String>,

    /// Docker-compatible engine binary [default: docker]
    #[arg(long)]
    pub engine: Option<String>,

    /// Mount point of the working tree inside the environment [default: /io]
    #[arg(long, value_name = "DIR")]
    pub mount_point: Option<String>,

    /// Command recorded in the manifest header [default: ./refreeze]
    #[arg(long, value_name = "COMMAND")]
    pub compile_command: Option<String>,

    /// Package installed to provide pip-compile [default: pip-tools]
    #[arg(long, value_name = "PACKAGE")]
    pub compiler_package: Option<String>,

    /// Extra argument passed to pip-compile; repeatable
    #[arg(long = "compile-arg", value_name = "ARG", allow_hyphen_values = true, action = ArgAction::Append)]
    pub compile_args: Vec<String>,

    /// Configuration file [default: <PATH>/refreeze.toml when present]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    // General options
    /// Dry run mode - show the planned commands without launching anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Enable verbose output (debug logging)
    #[arg(long)]
    pub verbose: bool,

    /// Enable trace logging, including every engine invocation
    #[arg(long)]
    pub trace: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,

    // Output options
    /// Output the report in JSON format
    #[arg(long, conflicts_with = "diff")]
    pub json: bool,

    /// Show manifest changes in diff format
    #[arg(long)]
    pub diff: bool,
}
