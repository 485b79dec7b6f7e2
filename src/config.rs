//! Layered run configuration
//!
//! Values come from (lowest to highest priority):
//! - Built-in defaults
//! - `refreeze.toml` in the working tree, or the file given with `--config`
//! - CLI flags
//!
//! Relative paths are resolved against the working tree.

use crate::cli::CliArgs;
use crate::error::ConfigError;
use crate::snapshot::DEFAULT_COMPILER_PACKAGE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working tree
pub const CONFIG_FILENAME: &str = "refreeze.toml";

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
pub const DEFAULT_SPEC: &str = "requirements.in";
pub const DEFAULT_OUTPUT: &str = "requirements.txt";
pub const DEFAULT_PLATFORM: &str = "linux/amd64";
pub const DEFAULT_ENGINE: &str = "docker";
pub const DEFAULT_MOUNT_POINT: &str = "/io";
pub const DEFAULT_COMPILE_COMMAND: &str = "./refreeze";

/// Contents of `refreeze.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub dockerfile: Option<PathBuf>,
    pub specs: Option<Vec<PathBuf>>,
    pub output: Option<PathBuf>,
    pub platform: Option<String>,
    pub engine: Option<String>,
    pub mount_point: Option<String>,
    pub compile_command: Option<String>,
    pub compiler_package: Option<String>,
    pub compile_args: Option<Vec<String>>,
}

impl FileConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Load `explicit` if given, otherwise `refreeze.toml` in the tree when present
    pub fn discover(working_tree: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = working_tree.join(CONFIG_FILENAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading config file");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeConfig {
    /// Canonical working tree, mounted into the environment
    pub working_tree: PathBuf,
    pub dockerfile: PathBuf,
    pub specs: Vec<PathBuf>,
    pub output: PathBuf,
    pub platform: String,
    pub engine: String,
    pub mount_point: String,
    pub compile_command: String,
    pub compiler_package: String,
    pub compile_args: Vec<String>,
    pub dry_run: bool,
}

impl FreezeConfig {
    /// Defaults for a working tree
    pub fn for_tree(working_tree: impl Into<PathBuf>) -> Self {
        let working_tree = working_tree.into();
        Self {
            dockerfile: working_tree.join(DEFAULT_DOCKERFILE),
            specs: vec![working_tree.join(DEFAULT_SPEC)],
            output: working_tree.join(DEFAULT_OUTPUT),
            working_tree,
            platform: DEFAULT_PLATFORM.to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            compile_command: DEFAULT_COMPILE_COMMAND.to_string(),
            compiler_package: DEFAULT_COMPILER_PACKAGE.to_string(),
            compile_args: Vec::new(),
            dry_run: false,
        }
    }

    /// Resolve CLI arguments on top of the config file and defaults
    pub fn resolve(args: &CliArgs) -> Result<Self, ConfigError> {
        let working_tree = args
            .path
            .canonicalize()
            .ok()
            .filter(|path| path.is_dir())
            .ok_or_else(|| ConfigError::WorkingTreeNotFound {
                path: args.path.clone(),
            })?;
        let file = FileConfig::discover(&working_tree, args.config.as_deref())?;
        let config = Self::layer(working_tree, file, args);
        config.validate()?;
        Ok(config)
    }

    /// Apply file values, then CLI values, over the defaults
    pub fn layer(working_tree: PathBuf, file: FileConfig, args: &CliArgs) -> Self {
        let mut config = Self::for_tree(working_tree);
        let tree = config.working_tree.clone();
        let in_tree = |path: &Path| tree.join(path);

        if let Some(path) = args.dockerfile.as_deref().or(file.dockerfile.as_deref()) {
            config.dockerfile = in_tree(path);
        }
        let specs = if args.specs.is_empty() {
            file.specs.unwrap_or_default()
        } else {
            args.specs.clone()
        };
        if !specs.is_empty() {
            config.specs = specs.iter().map(|path| in_tree(path)).collect();
        }
        if let Some(path) = args.output.as_deref().or(file.output.as_deref()) {
            config.output = in_tree(path);
        }

        let pick = |cli: &Option<String>, file: Option<String>, current: &mut String| {
            if let Some(value) = cli.clone().or(file) {
                *current = value;
            }
        };
        pick(&args.platform, file.platform, &mut config.platform);
        pick(&args.engine, file.engine, &mut config.engine);
        pick(&args.mount_point, file.mount_point, &mut config.mount_point);
        pick(&args.compile_command, file.compile_command, &mut config.compile_command);
        pick(&args.compiler_package, file.compiler_package, &mut config.compiler_package);

        config.compile_args = if args.compile_args.is_empty() {
            file.compile_args.unwrap_or_default()
        } else {
            args.compile_args.clone()
        };
        config.dry_run = args.dry_run;
        config
    }

    /// Reject empty or malformed scalar values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("platform", &self.platform),
            ("engine", &self.engine),
            ("compile-command", &self.compile_command),
            ("compiler-package", &self.compiler_package),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid_value(key, "must not be empty"));
            }
        }
        if !self.mount_point.starts_with('/') || self.mount_point.contains(':') {
            return Err(ConfigError::invalid_value(
                "mount-point",
                format!("'{}' must be an absolute path without ':'", self.mount_point),
            ));
        }
        if self.platform.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid_value(
                "platform",
                format!("'{}' must not contain whitespace", self.platform),
            ));
        }
        Ok(())
    }

    /// Spec files relative to the working tree; each must exist inside it
    pub fn relative_specs(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let output = self.relative_output()?;
        self.specs
            .iter()
            .map(|spec| {
                let canonical = spec
                    .canonicalize()
                    .ok()
                    .filter(|path| path.is_file())
                    .ok_or_else(|| ConfigError::SpecNotFound { path: spec.clone() })?;
                let relative = self.strip_tree(&canonical, spec)?;
                if relative == output {
                    return Err(ConfigError::SpecIsOutput { path: spec.clone() });
                }
                Ok(relative)
            })
            .collect()
    }

    /// Output manifest relative to the working tree; its directory must exist inside it
    pub fn relative_output(&self) -> Result<PathBuf, ConfigError> {
        let file_name = self
            .output
            .file_name()
            .ok_or_else(|| ConfigError::invalid_value("output", "must name a file"))?;
        let parent = self
            .output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let parent = parent
            .canonicalize()
            .map_err(|_| ConfigError::OutsideWorkingTree {
                path: self.output.clone(),
                tree: self.working_tree.clone(),
            })?;
        let relative = self.strip_tree(&parent, &self.output)?;
        Ok(relative.join(file_name))
    }

    fn strip_tree(&self, canonical: &Path, original: &Path) -> Result<PathBuf, ConfigError> {
        canonical
            .strip_prefix(&self.working_tree)
            .map(Path::to_path_buf)
            .map_err(|_| ConfigError::OutsideWorkingTree {
                path: original.to_path_buf(),
                tree: self.working_tree.clone(),
            })
    }
}
