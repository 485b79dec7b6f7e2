//! Constraint snapshot capture
//!
//! Installs the dependency compiler in a launched environment, then lists
//! every installed package into a constraints file that stays in the
//! environment for the compile step.

use crate::domain::ConstraintSnapshot;
use crate::environment::EphemeralEnvironment;
use crate::error::SnapshotError;
use crate::interrupt::Interrupt;
use crate::parser::parse_snapshot;

/// Constraints file inside the environment; never under the mount point
pub const CONSTRAINTS_PATH: &str = "/tmp/refreeze/constraints.txt";

/// Package providing `pip-compile`
pub const DEFAULT_COMPILER_PACKAGE: &str = "pip-tools";

/// Captures the installed package set of a base image
#[derive(Debug, Clone)]
pub struct ConstraintSnapshotter {
    compiler_package: String,
    interrupt: Interrupt,
}

impl Default for ConstraintSnapshotter {
    fn default() -> Self {
        Self::new(DEFAULT_COMPILER_PACKAGE)
    }
}

impl ConstraintSnapshotter {
    pub fn new(compiler_package: impl Into<String>) -> Self {
        Self {
            compiler_package: compiler_package.into(),
            interrupt: Interrupt::global(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Command installing the dependency compiler
    pub fn install_command(&self) -> Vec<String> {
        [
            "python",
            "-m",
            "pip",
            "install",
            "--quiet",
            "--disable-pip-version-check",
            self.compiler_package.as_str(),
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Command writing the package listing to the constraints file and echoing it
    pub fn list_command(&self) -> Vec<String> {
        let dir = CONSTRAINTS_PATH
            .rsplit_once('/')
            .map_or("/tmp", |(dir, _)| dir);
        let script = format!(
            "mkdir -p {dir} && python -m pip list --format=freeze --disable-pip-version-check > {path} && cat {path}",
            dir = dir,
            path = CONSTRAINTS_PATH
        );
        vec!["sh".to_string(), "-c".to_string(), script]
    }

    /// Install the compiler and capture the snapshot
    ///
    /// The constraints file is left at [`CONSTRAINTS_PATH`] for the compile
    /// step that follows in the same environment.
    pub fn capture(&self, env: &EphemeralEnvironment) -> Result<ConstraintSnapshot, SnapshotError> {
        tracing::info!(package = %self.compiler_package, "installing dependency compiler");
        let install = env.exec(&self.install_command()).map_err(SnapshotError::Launch)?;
        // A signalled engine child reports failure; the interrupt takes precedence
        self.check_interrupt()?;
        if !install.is_success() {
            return Err(SnapshotError::CompilerInstall {
                package: self.compiler_package.clone(),
                status: install.code(),
                diagnostic: install.stderr.trim_end().to_string(),
            });
        }

        tracing::info!(container = %env.id(), "capturing installed packages");
        let listing = env.exec(&self.list_command()).map_err(SnapshotError::Launch)?;
        self.check_interrupt()?;
        if !listing.is_success() {
            return Err(SnapshotError::Enumeration {
                status: listing.code(),
                diagnostic: listing.stderr.trim_end().to_string(),
            });
        }

        let snapshot = parse_snapshot(&listing.stdout)?;
        tracing::debug!(packages = snapshot.len(), "snapshot captured");
        Ok(snapshot)
    }

    fn check_interrupt(&self) -> Result<(), SnapshotError> {
        if self.interrupt.requested() {
            Err(SnapshotError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageReference;
    use crate::environment::{LaunchSpec, MockEngine};
    use std::sync::atomic::AtomicBool;

    fn spec(dir: &std::path::Path) -> LaunchSpec {
        LaunchSpec {
            image: ImageReference::new("example/base:1.0").unwrap(),
            platform: "linux/amd64".to_string(),
            host_dir: dir.to_path_buf(),
            mount_point: "/io".to_string(),
            env: Vec::new(),
        }
    }

    #[test]
    fn test_commands() {
        let snapshotter = ConstraintSnapshotter::new("pip-tools==7.4.1");
        assert_eq!(
            snapshotter.install_command().last().map(String::as_str),
            Some("pip-tools==7.4.1")
        );
        let list = snapshotter.list_command();
        assert_eq!(list[0], "sh");
        assert!(list[2].starts_with("mkdir -p /tmp/refreeze && "));
        assert!(list[2].contains("> /tmp/refreeze/constraints.txt"));
        assert!(list[2].ends_with("cat /tmp/refreeze/constraints.txt"));
    }

    #[test]
    fn test_capture() {
        let engine = MockEngine::new().with_installed(&[("requests", "2.31.0"), ("Pandas", "2.2.1")]);
        let dir = tempfile::tempdir().unwrap();
        let env = EphemeralEnvironment::launch(&engine, &spec(dir.path())).unwrap();

        let snapshot = ConstraintSnapshotter::default().capture(&env).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.version_of("pandas"), Some("2.2.1"));
        assert_eq!(engine.commands().len(), 2);
    }

    #[test]
    fn test_capture_install_failure() {
        let engine = MockEngine::new()
            .with_installed(&[("requests", "2.31.0")])
            .fail_install("ERROR: No matching distribution found for pip-tools");
        let dir = tempfile::tempdir().unwrap();
        let env = EphemeralEnvironment::launch(&engine, &spec(dir.path())).unwrap();

        let err = ConstraintSnapshotter::default().capture(&env).unwrap_err();
        match err {
            SnapshotError::CompilerInstall { package, diagnostic, .. } => {
                assert_eq!(package, "pip-tools");
                assert!(diagnostic.contains("No matching distribution"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_capture_invalid_listing() {
        let engine = MockEngine::new().with_listing("requests==2.31.0\nnot a pin\n");
        let dir = tempfile::tempdir().unwrap();
        let env = EphemeralEnvironment::launch(&engine, &spec(dir.path())).unwrap();

        let err = ConstraintSnapshotter::default().capture(&env).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidLine { line_number: 2, .. }));
    }

    #[test]
    fn test_capture_empty_image() {
        let engine = MockEngine::new();
        let dir = tempfile::tempdir().unwrap();
        let env = EphemeralEnvironment::launch(&engine, &spec(dir.path())).unwrap();

        let err = ConstraintSnapshotter::default().capture(&env).unwrap_err();
        assert!(matches!(err, SnapshotError::Empty));
    }

    #[test]
    fn test_capture_interrupted_after_install() {
        static FLAG: AtomicBool = AtomicBool::new(true);
        let engine = MockEngine::new().with_installed(&[("requests", "2.31.0")]);
        let dir = tempfile::tempdir().unwrap();
        let env = EphemeralEnvironment::launch(&engine, &spec(dir.path())).unwrap();

        let err = ConstraintSnapshotter::default()
            .with_interrupt(Interrupt::from_flag(&FLAG))
            .capture(&env)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Interrupted));
        assert_eq!(engine.commands().len(), 1);
    }

    #[test]
    fn test_capture_interrupt_wins_over_killed_install() {
        static FLAG: AtomicBool = AtomicBool::new(true);
        let engine = MockEngine::new()
            .with_installed(&[("requests", "2.31.0")])
            .fail_install("Terminated");
        let dir = tempfile::tempdir().unwrap();
        let env = EphemeralEnvironment::launch(&engine, &spec(dir.path())).unwrap();

        let err = ConstraintSnapshotter::default()
            .with_interrupt(Interrupt::from_flag(&FLAG))
            .capture(&env)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Interrupted));
        assert_eq!(engine.commands().len(), 1);
    }
}
