//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ConfigError: Invalid configuration or input paths
//! - DescriptorError: Build descriptor problems (no base image)
//! - EnvironmentError: Container engine failures
//! - SnapshotError: Constraint capture failures
//! - FreezeError: Compilation and verification failures
//! - ManifestError: Manifest file read/write/parse failures

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for configuration and descriptor errors
pub const EXIT_CONFIG_ERROR: u8 = 2;
/// Exit code for snapshot (environment) failures
pub const EXIT_SNAPSHOT_FAILURE: u8 = 3;
/// Exit code for resolution conflicts and floor violations
pub const EXIT_RESOLUTION_CONFLICT: u8 = 4;
/// Exit code after Ctrl-C
pub const EXIT_INTERRUPTED: u8 = 130;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Freeze(#[from] FreezeError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Descriptor(_) => EXIT_CONFIG_ERROR,
            AppError::Snapshot(SnapshotError::Interrupted) => EXIT_INTERRUPTED,
            AppError::Snapshot(_) => EXIT_SNAPSHOT_FAILURE,
            AppError::Freeze(FreezeError::Interrupted) => EXIT_INTERRUPTED,
            AppError::Freeze(FreezeError::Environment(_)) => EXIT_SNAPSHOT_FAILURE,
            AppError::Freeze(_) => EXIT_RESOLUTION_CONFLICT,
            AppError::Manifest(_) => 1,
        }
    }
}

/// Errors related to configuration and input validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML or has unknown keys
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Working tree does not exist
    #[error("working tree not found: {path}")]
    WorkingTreeNotFound { path: PathBuf },

    /// A requirements input file is missing
    #[error("dependency spec not found: {path}")]
    SpecNotFound { path: PathBuf },

    /// A path must live inside the mounted working tree
    #[error("{path} is outside the working tree {tree}")]
    OutsideWorkingTree { path: PathBuf, tree: PathBuf },

    /// The output manifest would overwrite one of its own inputs
    #[error("output manifest {path} is also listed as a dependency spec")]
    SpecIsOutput { path: PathBuf },

    /// A value is empty or malformed
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors related to the build descriptor
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Failed to read the descriptor
    #[error("failed to read build descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No FROM directive before the first installation directive
    #[error("no base image declared in {path}: expected a FROM directive before any build step")]
    MissingBaseImage { path: PathBuf },

    /// The FROM argument references an ARG with no default
    #[error("base image '{reference}' in {path} uses ${variable}, which has no default value")]
    UnresolvedImageVariable {
        path: PathBuf,
        reference: String,
        variable: String,
    },

    /// The FROM argument is empty or malformed
    #[error("invalid base image reference '{reference}' in {path}")]
    InvalidImageReference { path: PathBuf, reference: String },
}

/// Errors raised by the container engine
#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// The engine binary could not be executed
    #[error("failed to run container engine '{engine}': {source}")]
    EngineUnavailable {
        engine: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine refused to start the environment (pull failure, bad platform, ...)
    #[error("failed to launch environment from {image}: {diagnostic}")]
    Launch { image: String, diagnostic: String },

    /// Removing the environment failed
    #[error("failed to remove environment {container}: {diagnostic}")]
    Teardown {
        container: String,
        diagnostic: String,
    },
}

/// Errors while capturing the constraint snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The environment could not be started
    #[error("snapshot failed: {0}")]
    Launch(#[source] EnvironmentError),

    /// Installing the dependency compiler failed
    #[error("snapshot failed: could not install {package} (exit status {status}):\n{diagnostic}")]
    CompilerInstall {
        package: String,
        status: i32,
        diagnostic: String,
    },

    /// Listing installed packages failed
    #[error("snapshot failed: could not enumerate installed packages (exit status {status}):\n{diagnostic}")]
    Enumeration { status: i32, diagnostic: String },

    /// The listing contained a line that is not `name==version`
    #[error("snapshot failed: unexpected line {line_number} in package listing: '{line}'")]
    InvalidLine { line_number: usize, line: String },

    /// The listing was empty
    #[error("snapshot failed: the base image reported no installed packages")]
    Empty,

    /// Ctrl-C during capture
    #[error("interrupted while capturing the constraint snapshot")]
    Interrupted,
}

/// Errors while compiling and verifying the frozen manifest
#[derive(Error, Debug)]
pub enum FreezeError {
    /// The compiler could not satisfy the specs under the snapshot constraints
    #[error("dependency resolution failed (exit status {status}):\n{diagnostic}")]
    ResolutionConflict { status: i32, diagnostic: String },

    /// The compiled manifest pins something below the base image version
    #[error("compiled manifest regresses packages shipped by the base image: {}", .violations.join("; "))]
    FloorViolation { violations: Vec<String> },

    /// The engine failed while running the compiler
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// Ctrl-C during compilation
    #[error("interrupted while compiling requirements")]
    Interrupted,
}

/// Errors related to manifest file operations
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Failed to read manifest file
    #[error("failed to read manifest file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or stage the manifest file
    #[error("failed to write manifest file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requirement line that is not pinned or not parseable
    #[error("failed to parse {path} line {line_number}: '{line}'")]
    Parse {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
}

impl ConfigError {
    /// Creates a new InvalidValue error
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl DescriptorError {
    /// Creates a new MissingBaseImage error
    pub fn missing_base_image(path: impl Into<PathBuf>) -> Self {
        DescriptorError::MissingBaseImage { path: path.into() }
    }
}

impl EnvironmentError {
    /// Creates a new Launch error
    pub fn launch(image: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        EnvironmentError::Launch {
            image: image.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

impl ManifestError {
    /// Creates a new Read error
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a new Write error
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::Write {
            path: path.into(),
            source,
        }
    }

    /// Creates a new Parse error
    pub fn parse_error(path: impl Into<PathBuf>, line_number: usize, line: impl Into<String>) -> Self {
        ManifestError::Parse {
            path: path.into(),
            line_number,
            line: line.into(),
        }
    }
}
