//! Freeze orchestrator for coordinating the whole re-freeze workflow
//!
//! This module provides:
//! - Workflow coordination: extract → validate → launch → snapshot → compile → verify → persist
//! - Dry-run planning without launching anything
//! - Interrupt checks between stages
//!
//! The environment is held by a scoped guard, so it is removed on every
//! path out of the launch scope. The output manifest is only replaced after
//! the compiled result has been verified.

use crate::config::FreezeConfig;
use crate::domain::{FreezeReport, ImageReference};
use crate::environment::{
    posix_path, ContainerEngine, EphemeralEnvironment, LaunchSpec, COMPILE_COMMAND_ENV,
};
use crate::error::{AppError, ConfigError, FreezeError, SnapshotError};
use crate::interrupt::Interrupt;
use crate::manifest::{CommitOutcome, ManifestWriter};
use crate::parser::{extract_base_image_from_file, parse_frozen_manifest};
use crate::progress::Progress;
use crate::snapshot::{ConstraintSnapshotter, CONSTRAINTS_PATH};
use std::path::{Path, PathBuf};

/// Container placeholder used in dry-run plans
const PLANNED_CONTAINER: &str = "<container>";

/// Orchestrator for one re-freeze run
pub struct FreezeOrchestrator<'e> {
    config: FreezeConfig,
    engine: &'e dyn ContainerEngine,
    show_progress: bool,
    interrupt: Interrupt,
}

impl<'e> FreezeOrchestrator<'e> {
    /// Create an orchestrator driving `engine`
    pub fn new(config: FreezeConfig, engine: &'e dyn ContainerEngine) -> Self {
        Self {
            config,
            engine,
            show_progress: false,
            interrupt: Interrupt::global(),
        }
    }

    /// Show stage spinners on stderr
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Run the workflow
    pub fn run(&self) -> Result<FreezeReport, AppError> {
        let mut progress = Progress::new(self.show_progress);
        let config = &self.config;

        // Step 1: base image, before anything can launch
        progress.stage("Reading build descriptor");
        let image = extract_base_image_from_file(&config.dockerfile)?;
        tracing::info!(image = %image, "base image");

        // Step 2: inputs
        let specs = config.relative_specs()?;
        let output = config.relative_output()?;
        let writer = ManifestWriter::new(config.working_tree.join(&output));
        let current = writer.read_current()?;

        let launch = self.launch_spec(&image);
        let snapshotter = ConstraintSnapshotter::new(config.compiler_package.as_str())
            .with_interrupt(self.interrupt);
        let mut report = FreezeReport::new(image.as_str(), config.platform.as_str(), output.clone());

        if config.dry_run {
            report.dry_run = true;
            report.planned_commands = self.plan(&launch, &snapshotter, &specs, &output);
            return Ok(report);
        }

        let staged = writer.stage(current.as_deref())?;
        let staging = staged
            .path()
            .strip_prefix(&config.working_tree)
            .map(Path::to_path_buf)
            .map_err(|_| ConfigError::OutsideWorkingTree {
                path: staged.path().to_path_buf(),
                tree: config.working_tree.clone(),
            })?;
        self.check_interrupt()?;

        // Steps 3-6: the environment lives exactly as long as this block
        let snapshot = {
            progress.stage(&format!("Launching {} ({})", image, config.platform));
            let env = EphemeralEnvironment::launch(self.engine, &launch)
                .map_err(SnapshotError::Launch)?;

            progress.stage("Capturing installed packages");
            let snapshot = snapshotter.capture(&env)?;
            tracing::info!(container = %env.id(), packages = snapshot.len(), "snapshot captured");
            self.check_interrupt()?;

            progress.stage(&format!("Compiling {}", join_paths(&specs)));
            let compile = env
                .exec(&self.compile_command(&specs, &staging))
                .map_err(FreezeError::from)?;
            self.check_interrupt()?;
            if !compile.is_success() {
                return Err(FreezeError::ResolutionConflict {
                    status: compile.code(),
                    diagnostic: compile.stderr.trim_end().to_string(),
                }
                .into());
            }

            progress.stage("Removing environment");
            snapshot
        };
        progress.finish_and_clear();

        // Step 7: verify before anything replaces the output
        let manifest = parse_frozen_manifest(&staged.read()?, staged.path())?;
        let violations = manifest.floor_violations(&snapshot);
        if !violations.is_empty() {
            return Err(FreezeError::FloorViolation {
                violations: violations.iter().map(ToString::to_string).collect(),
            }
            .into());
        }

        // Step 8: persist and report
        let previous = current
            .as_deref()
            .and_then(|content| match parse_frozen_manifest(content, writer.path()) {
                Ok(previous) => Some(previous),
                Err(e) => {
                    tracing::warn!(error = %e, "previous manifest is not parseable; reporting all packages as added");
                    None
                }
            })
            .unwrap_or_default();
        report.changes = manifest.changes_from(&previous);
        report.snapshot_packages = snapshot.len();
        report.pinned_packages = manifest.len();
        report.manifest_changed = staged.commit(current.as_deref())? == CommitOutcome::Written;
        Ok(report)
    }

    /// Launch parameters for the base image
    pub fn launch_spec(&self, image: &ImageReference) -> LaunchSpec {
        LaunchSpec {
            image: image.clone(),
            platform: self.config.platform.clone(),
            host_dir: self.config.working_tree.clone(),
            mount_point: self.config.mount_point.clone(),
            env: vec![(
                COMPILE_COMMAND_ENV.to_string(),
                self.config.compile_command.clone(),
            )],
        }
    }

    /// `pip-compile` invocation, run from the mount point
    pub fn compile_command(&self, specs: &[PathBuf], staging: &Path) -> Vec<String> {
        let mut argv = vec![
            "pip-compile".to_string(),
            "--strip-extras".to_string(),
            format!("--constraint={}", CONSTRAINTS_PATH),
            format!("--output-file={}", posix_path(staging)),
        ];
        argv.extend(self.config.compile_args.iter().cloned());
        argv.extend(specs.iter().map(|spec| posix_path(spec)));
        argv
    }

    /// Engine commands a real run would execute
    fn plan(
        &self,
        launch: &LaunchSpec,
        snapshotter: &ConstraintSnapshotter,
        specs: &[PathBuf],
        output: &Path,
    ) -> Vec<String> {
        let file_name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = output.with_file_name(format!(".{}.XXXXXX.staged", file_name));

        vec![
            self.engine.render_launch(launch),
            self.engine
                .render_exec(PLANNED_CONTAINER, &snapshotter.install_command()),
            self.engine
                .render_exec(PLANNED_CONTAINER, &snapshotter.list_command()),
            self.engine
                .render_exec(PLANNED_CONTAINER, &self.compile_command(specs, &staging)),
            self.engine.render_remove(PLANNED_CONTAINER),
        ]
    }

    fn check_interrupt(&self) -> Result<(), FreezeError> {
        if self.interrupt.requested() {
            tracing::warn!("interrupted");
            Err(FreezeError::Interrupted)
        } else {
            Ok(())
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| posix_path(path))
        .collect::<Vec<_>>()
        .join(", ")
}
