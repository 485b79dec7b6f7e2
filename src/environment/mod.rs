//! Ephemeral execution environments
//!
//! This module provides:
//! - The `ContainerEngine` trait at the process boundary
//! - `SystemEngine`, which drives a docker-compatible CLI
//! - `MockEngine`, an in-process stand-in used by tests
//! - `EphemeralEnvironment`, a scoped guard that removes the container on drop

mod engine;
pub mod mock;

pub use engine::SystemEngine;
pub use mock::MockEngine;

use crate::domain::ImageReference;
use crate::error::EnvironmentError;
use std::path::PathBuf;

/// Environment variable pip-compile reads to render its header command
pub const COMPILE_COMMAND_ENV: &str = "CUSTOM_COMPILE_COMMAND";

/// Everything needed to start an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub image: ImageReference,
    /// Fixed target platform, e.g. `linux/amd64`
    pub platform: String,
    /// Host directory mounted read/write
    pub host_dir: PathBuf,
    /// Mount point inside the environment; also the working directory
    pub mount_point: String,
    /// Variables set for every command in the environment
    pub env: Vec<(String, String)>,
}

/// Captured output of one command run inside the environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// Exit status, None when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit status for error reporting; -1 stands for "killed by a signal"
    pub fn code(&self) -> i32 {
        self.status.unwrap_or(-1)
    }
}

/// A container engine that can start, run commands in, and remove environments
pub trait ContainerEngine {
    /// Engine name for logs and error messages
    fn name(&self) -> &str;

    /// Start a detached environment and return its identifier
    fn launch(&self, spec: &LaunchSpec) -> Result<String, EnvironmentError>;

    /// Run `argv` inside a running environment
    fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput, EnvironmentError>;

    /// Force-remove an environment
    fn remove(&self, container: &str) -> Result<(), EnvironmentError>;

    /// Human-readable launch command, for dry-run plans
    fn render_launch(&self, spec: &LaunchSpec) -> String;

    /// Human-readable exec command, for dry-run plans
    fn render_exec(&self, container: &str, argv: &[String]) -> String;

    /// Human-readable teardown command, for dry-run plans
    fn render_remove(&self, container: &str) -> String;
}

/// A launched environment, removed when dropped
///
/// The guard owns the container for its whole lifetime; every exit path of
/// the scope that holds it (success, error, unwinding) tears the container
/// down.
pub struct EphemeralEnvironment<'e> {
    engine: &'e dyn ContainerEngine,
    container: String,
}

impl<'e> EphemeralEnvironment<'e> {
    /// Launch a new environment from `spec`
    pub fn launch(
        engine: &'e dyn ContainerEngine,
        spec: &LaunchSpec,
    ) -> Result<Self, EnvironmentError> {
        tracing::info!(image = %spec.image, platform = %spec.platform, "launching environment");
        let container = engine.launch(spec)?;
        tracing::debug!(container = %container, "environment started");
        Ok(Self { engine, container })
    }

    /// Identifier assigned by the engine
    pub fn id(&self) -> &str {
        &self.container
    }

    /// Run a command in the environment
    pub fn exec(&self, argv: &[String]) -> Result<ExecOutput, EnvironmentError> {
        tracing::debug!(container = %self.container, command = %argv.join(" "), "exec");
        let output = self.engine.exec(&self.container, argv)?;
        tracing::debug!(status = ?output.status, "exec finished");
        Ok(output)
    }
}

impl Drop for EphemeralEnvironment<'_> {
    fn drop(&mut self) {
        match self.engine.remove(&self.container) {
            Ok(()) => tracing::debug!(container = %self.container, "environment removed"),
            Err(e) => tracing::warn!(container = %self.container, error = %e, "failed to remove environment"),
        }
    }
}

/// Render a path relative to the mounted directory as a POSIX path argument
///
/// Commands run with the mount point as working directory, so relative
/// arguments resolve inside the mounted tree.
pub fn posix_path(relative: &std::path::Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return ".".to_string();
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            image: ImageReference::new("example/base:1.0").unwrap(),
            platform: "linux/amd64".to_string(),
            host_dir: PathBuf::from("/work"),
            mount_point: "/io".to_string(),
            env: vec![(COMPILE_COMMAND_ENV.to_string(), "./refreeze".to_string())],
        }
    }

    #[test]
    fn test_exec_output_status() {
        assert!(ExecOutput::success("ok").is_success());
        let failed = ExecOutput::failure(2, "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.code(), 2);
        assert_eq!(ExecOutput::default().code(), -1);
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let engine = MockEngine::new();
        {
            let env = EphemeralEnvironment::launch(&engine, &spec()).unwrap();
            assert_eq!(engine.running(), vec![env.id().to_string()]);
        }
        assert!(engine.running().is_empty());
        assert_eq!(engine.removed().len(), 1);
    }

    #[test]
    fn test_guard_removes_after_failed_exec() {
        let engine = MockEngine::new().fail_install("no network");
        let result = (|| -> Result<ExecOutput, EnvironmentError> {
            let env = EphemeralEnvironment::launch(&engine, &spec())?;
            env.exec(&["python".into(), "-m".into(), "pip".into(), "install".into(), "pip-tools".into()])
        })();
        assert!(!result.unwrap().is_success());
        assert!(engine.running().is_empty());
    }

    #[test]
    fn test_launch_failure_leaves_nothing_running() {
        let engine = MockEngine::new().fail_launch("pull access denied");
        let result = EphemeralEnvironment::launch(&engine, &spec());
        assert!(matches!(result, Err(EnvironmentError::Launch { .. })));
        assert!(engine.running().is_empty());
        assert!(engine.removed().is_empty());
    }

    #[test]
    fn test_posix_path() {
        assert_eq!(posix_path(Path::new("requirements.txt")), "requirements.txt");
        assert_eq!(posix_path(Path::new("deps/base.in")), "deps/base.in");
        assert_eq!(posix_path(Path::new("")), ".");
    }
}
