//! In-process container engine for tests
//!
//! Emulates the three commands the workflow runs inside an environment:
//! installing the compiler, listing installed packages, and `pip-compile`.
//! Compilation resolves each top-level requirement against the simulated
//! base image (whose versions act as hard pins) and a small package index,
//! and writes the manifest through the simulated mount onto the host.

use super::{ContainerEngine, ExecOutput, LaunchSpec, COMPILE_COMMAND_ENV};
use crate::domain::{normalize_name, PinnedPackage, Pep440Version, Requirement};
use crate::error::EnvironmentError;
use crate::parser::{parse_frozen_manifest, parse_spec};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MockState {
    next_id: usize,
    launched: HashMap<String, LaunchSpec>,
    running: Vec<String>,
    removed: Vec<String>,
    commands: Vec<Vec<String>>,
}

/// Mock engine with a scripted base image and package index
#[derive(Debug, Default)]
pub struct MockEngine {
    installed: Vec<PinnedPackage>,
    index: BTreeMap<String, Vec<String>>,
    launch_failure: Option<String>,
    install_failure: Option<String>,
    listing_override: Option<String>,
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packages pre-installed in the simulated base image
    pub fn with_installed(mut self, packages: &[(&str, &str)]) -> Self {
        self.installed
            .extend(packages.iter().map(|(name, version)| PinnedPackage::new(*name, *version)));
        self
    }

    /// Versions the simulated index offers for a package
    pub fn with_available(mut self, name: &str, versions: &[&str]) -> Self {
        self.index
            .entry(normalize_name(name))
            .or_default()
            .extend(versions.iter().map(|v| v.to_string()));
        self
    }

    /// Make every launch fail with the given diagnostic
    pub fn fail_launch(mut self, diagnostic: &str) -> Self {
        self.launch_failure = Some(diagnostic.to_string());
        self
    }

    /// Make the compiler installation step fail
    pub fn fail_install(mut self, diagnostic: &str) -> Self {
        self.install_failure = Some(diagnostic.to_string());
        self
    }

    /// Replace the package listing with raw text
    pub fn with_listing(mut self, listing: &str) -> Self {
        self.listing_override = Some(listing.to_string());
        self
    }

    /// Containers launched and not yet removed
    pub fn running(&self) -> Vec<String> {
        self.lock().running.clone()
    }

    /// Containers removed so far
    pub fn removed(&self) -> Vec<String> {
        self.lock().removed.clone()
    }

    /// Number of launches attempted
    pub fn launch_count(&self) -> usize {
        self.lock().next_id
    }

    /// Every command run through `exec`, in order
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.lock().commands.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only means an earlier test assertion panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listing(&self) -> String {
        if let Some(listing) = &self.listing_override {
            return listing.clone();
        }
        self.installed
            .iter()
            .map(|package| format!("{}\n", package))
            .collect()
    }

    fn compile(&self, spec: &LaunchSpec, argv: &[String]) -> ExecOutput {
        let mut output_file = None;
        let mut inputs = Vec::new();
        for arg in &argv[1..] {
            if let Some(path) = arg.strip_prefix("--output-file=") {
                output_file = Some(path.to_string());
            } else if !arg.starts_with('-') {
                inputs.push(arg.clone());
            }
        }
        let Some(output_file) = output_file else {
            return ExecOutput::failure(2, "Error: --output-file is required");
        };
        let output_path = host_path(spec, &output_file);

        let mut merged: BTreeMap<String, (Requirement, String)> = BTreeMap::new();
        for input in &inputs {
            let path = host_path(spec, input);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    return ExecOutput::failure(2, format!("Error: Could not open file '{}': {}", input, e))
                }
            };
            let requirements = match parse_spec(&content, &path) {
                Ok(requirements) => requirements,
                Err(e) => return ExecOutput::failure(2, format!("Error: {}", e)),
            };
            for requirement in requirements {
                match merged.get_mut(&requirement.normalized_name()) {
                    Some((existing, _)) => existing.specifiers.extend(&requirement.specifiers),
                    None => {
                        merged.insert(requirement.normalized_name(), (requirement, input.clone()));
                    }
                }
            }
        }

        let previous = std::fs::read_to_string(&output_path)
            .ok()
            .and_then(|content| parse_frozen_manifest(&content, &output_path).ok());

        let mut lines = Vec::new();
        for (key, (requirement, source)) in &merged {
            let pin = match self.resolve(key, requirement, previous.as_ref()) {
                Ok(pin) => pin,
                Err(diagnostic) => return ExecOutput::failure(2, diagnostic),
            };
            lines.push(format!("{}\n    # via -r {}\n", pin, source));
        }

        let command = spec
            .env
            .iter()
            .find(|(key, _)| key == COMPILE_COMMAND_ENV)
            .map_or("pip-compile", |(_, value)| value.as_str());
        let mut content = format!(
            "#\n# This file is autogenerated by pip-compile with Python 3.11\n# by the following command:\n#\n#    {}\n#\n",
            command
        );
        content.extend(lines);

        match atomic_write(&output_path, &content) {
            Ok(()) => ExecOutput::success(""),
            Err(e) => ExecOutput::failure(1, format!("Error: could not write {}: {}", output_file, e)),
        }
    }

    fn resolve(
        &self,
        key: &str,
        requirement: &Requirement,
        previous: Option<&crate::domain::FrozenManifest>,
    ) -> Result<String, String> {
        if let Some(url) = &requirement.url {
            return Ok(format!("{} @ {}", requirement.name, url));
        }

        let satisfies = |version: &str| {
            Pep440Version::parse(version).is_some_and(|v| requirement.specifiers.matches(&v))
        };

        // Installed versions are constraints: the only acceptable candidate
        if let Some(installed) = self
            .installed
            .iter()
            .find(|package| package.normalized_name() == key)
        {
            return if satisfies(installed.version.as_str()) {
                Ok(format!("{}=={}", requirement.name, installed.version))
            } else {
                Err(format!(
                    "Could not find a version that matches {} (from -r requirements.in)\n\
                     Tried: {}\n\
                     There are incompatible versions in the resolved dependencies:\n  \
                     {} (from -c /tmp/refreeze/constraints.txt)\n  {}",
                    requirement, installed.version, installed, requirement
                ))
            };
        }

        let keep = previous
            .and_then(|manifest| manifest.get(key))
            .and_then(|entry| entry.version())
            .filter(|version| satisfies(*version));
        if let Some(version) = keep {
            return Ok(format!("{}=={}", requirement.name, version));
        }

        self.index
            .get(key)
            .into_iter()
            .flatten()
            .filter(|version| satisfies(version.as_str()))
            .filter_map(|version| Pep440Version::parse(version).map(|parsed| (parsed, version)))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, version)| format!("{}=={}", requirement.name, version))
            .ok_or_else(|| {
                format!(
                    "Could not find a version that satisfies the requirement {}\nNo matching distribution found for {}",
                    requirement, requirement.name
                )
            })
    }
}

/// Write beside `path` and rename over it, replacing the file rather than its content
fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let temp = path.with_file_name(format!(".__atomic-write{:08x}", std::process::id()));
    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp);
    })
}

/// Map a path seen inside the environment to the host
fn host_path(spec: &LaunchSpec, path: &str) -> PathBuf {
    let relative = Path::new(path)
        .strip_prefix(&spec.mount_point)
        .unwrap_or_else(|_| Path::new(path));
    spec.host_dir.join(relative)
}

impl ContainerEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<String, EnvironmentError> {
        let mut state = self.lock();
        state.next_id += 1;
        if let Some(diagnostic) = &self.launch_failure {
            return Err(EnvironmentError::launch(spec.image.as_str(), diagnostic.clone()));
        }
        let id = format!("mock-{}", state.next_id);
        state.launched.insert(id.clone(), spec.clone());
        state.running.push(id.clone());
        Ok(id)
    }

    fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput, EnvironmentError> {
        let spec = {
            let mut state = self.lock();
            state.commands.push(argv.to_vec());
            if !state.running.iter().any(|id| id == container) {
                return Ok(ExecOutput::failure(
                    1,
                    format!("Error response from daemon: No such container: {}", container),
                ));
            }
            state.launched.get(container).cloned()
        };
        let Some(spec) = spec else {
            return Ok(ExecOutput::failure(1, "unknown container"));
        };

        let program = argv.first().map(String::as_str).unwrap_or_default();
        let script = argv.join(" ");
        let output = if program == "pip-compile" {
            self.compile(&spec, argv)
        } else if script.contains("pip list") {
            ExecOutput::success(self.listing())
        } else if script.contains("pip install") {
            match &self.install_failure {
                Some(diagnostic) => ExecOutput::failure(1, diagnostic.clone()),
                None => ExecOutput::success(""),
            }
        } else {
            ExecOutput::failure(127, format!("{}: command not found", program))
        };
        Ok(output)
    }

    fn remove(&self, container: &str) -> Result<(), EnvironmentError> {
        let mut state = self.lock();
        state.running.retain(|id| id != container);
        state.removed.push(container.to_string());
        Ok(())
    }

    fn render_launch(&self, spec: &LaunchSpec) -> String {
        format!("mock run {} ({})", spec.image, spec.platform)
    }

    fn render_exec(&self, container: &str, argv: &[String]) -> String {
        format!("mock exec {} {}", container, argv.join(" "))
    }

    fn render_remove(&self, container: &str) -> String {
        format!("mock rm {}", container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageReference;

    fn spec(dir: &Path) -> LaunchSpec {
        LaunchSpec {
            image: ImageReference::new("example/base:1.0").unwrap(),
            platform: "linux/amd64".to_string(),
            host_dir: dir.to_path_buf(),
            mount_point: "/io".to_string(),
            env: vec![(COMPILE_COMMAND_ENV.to_string(), "./refreeze".to_string())],
        }
    }

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_listing_reflects_installed() {
        let engine = MockEngine::new().with_installed(&[("requests", "2.31.0")]);
        let dir = tempfile::tempdir().unwrap();
        let id = engine.launch(&spec(dir.path())).unwrap();
        let out = engine
            .exec(&id, &argv(&["sh", "-c", "python -m pip list --format=freeze"]))
            .unwrap();
        assert_eq!(out.stdout, "requests==2.31.0\n");
    }

    #[test]
    fn test_compile_pins_installed_version() {
        let engine = MockEngine::new()
            .with_installed(&[("requests", "2.31.0")])
            .with_available("requests", &["2.31.0", "2.32.3"]);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.in"), "requests\n").unwrap();

        let id = engine.launch(&spec(dir.path())).unwrap();
        let out = engine
            .exec(
                &id,
                &argv(&["pip-compile", "--output-file=out.txt", "requirements.in"]),
            )
            .unwrap();
        assert!(out.is_success(), "{}", out.stderr);

        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert!(content.contains("#    ./refreeze\n"));
        assert!(content.contains("requests==2.31.0\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_compile_replaces_output_file() {
        use std::os::unix::fs::MetadataExt;
        let engine = MockEngine::new().with_installed(&[("requests", "2.31.0")]);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.in"), "requests\n").unwrap();
        std::fs::write(dir.path().join("out.txt"), "requests==2.30.0\n").unwrap();
        let before = std::fs::metadata(dir.path().join("out.txt")).unwrap().ino();

        let id = engine.launch(&spec(dir.path())).unwrap();
        let out = engine
            .exec(
                &id,
                &argv(&["pip-compile", "--output-file=out.txt", "requirements.in"]),
            )
            .unwrap();
        assert!(out.is_success(), "{}", out.stderr);

        let after = std::fs::metadata(dir.path().join("out.txt")).unwrap().ino();
        assert_ne!(before, after);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|name| !name.starts_with(".__atomic-write")));
    }

    #[test]
    fn test_compile_conflict() {
        let engine = MockEngine::new().with_installed(&[("pandas", "2.2.1")]);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.in"), "pandas<2\n").unwrap();

        let id = engine.launch(&spec(dir.path())).unwrap();
        let out = engine
            .exec(
                &id,
                &argv(&["pip-compile", "--output-file=/io/out.txt", "/io/requirements.in"]),
            )
            .unwrap();
        assert!(!out.is_success());
        assert!(out.stderr.contains("Could not find a version that matches pandas<2"));
        assert!(!dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_unknown_command() {
        let engine = MockEngine::new();
        let dir = tempfile::tempdir().unwrap();
        let id = engine.launch(&spec(dir.path())).unwrap();
        let out = engine.exec(&id, &argv(&["make"])).unwrap();
        assert_eq!(out.code(), 127);
    }

    #[test]
    fn test_exec_after_remove_fails() {
        let engine = MockEngine::new();
        let dir = tempfile::tempdir().unwrap();
        let id = engine.launch(&spec(dir.path())).unwrap();
        engine.remove(&id).unwrap();
        let out = engine.exec(&id, &argv(&["sh", "-c", "pip list"])).unwrap();
        assert!(!out.is_success());
    }
}
