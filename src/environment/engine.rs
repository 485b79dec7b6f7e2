//! Docker-compatible container engine driven through its CLI

use super::{ContainerEngine, ExecOutput, LaunchSpec};
use crate::error::EnvironmentError;
use std::process::{Command, Output};

/// Label attached to every environment this tool starts
const CONTAINER_LABEL: &str = "refreeze=1";

/// Engine that shells out to `docker` (or `podman`, which accepts the same flags)
#[derive(Debug, Clone)]
pub struct SystemEngine {
    program: String,
}

impl Default for SystemEngine {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl SystemEngine {
    /// Create an engine for the given CLI program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for starting a detached, self-removing environment
    pub fn launch_args(&self, spec: &LaunchSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--rm".to_string(),
            "--platform".to_string(),
            spec.platform.clone(),
            "--volume".to_string(),
            format!("{}:{}", spec.host_dir.display(), spec.mount_point),
            "--workdir".to_string(),
            spec.mount_point.clone(),
        ];
        for (key, value) in &spec.env {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.extend([
            "--label".to_string(),
            CONTAINER_LABEL.to_string(),
            // Keep the container alive between exec calls
            "--entrypoint".to_string(),
            "sleep".to_string(),
            spec.image.to_string(),
            "infinity".to_string(),
        ]);
        args
    }

    /// Arguments for running a command in a started environment
    pub fn exec_args(&self, container: &str, argv: &[String]) -> Vec<String> {
        let mut args = vec!["exec".to_string(), container.to_string()];
        args.extend(argv.iter().cloned());
        args
    }

    /// Arguments for force-removing an environment
    pub fn remove_args(&self, container: &str) -> Vec<String> {
        vec!["rm".to_string(), "--force".to_string(), container.to_string()]
    }

    /// Run the engine CLI and capture output
    fn run_command(&self, args: &[String]) -> Result<Output, EnvironmentError> {
        tracing::debug!(command = %self.render(args), "running container engine");
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| EnvironmentError::EngineUnavailable {
                engine: self.program.clone(),
                source,
            })
    }

    fn render(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ContainerEngine for SystemEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<String, EnvironmentError> {
        let output = self.run_command(&self.launch_args(spec))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(EnvironmentError::launch(spec.image.as_str(), stderr));
        }

        let container = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container.is_empty() {
            return Err(EnvironmentError::launch(
                spec.image.as_str(),
                format!("{} did not report a container id", self.program),
            ));
        }
        Ok(container)
    }

    fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput, EnvironmentError> {
        let output = self.run_command(&self.exec_args(container, argv))?;
        Ok(ExecOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn remove(&self, container: &str) -> Result<(), EnvironmentError> {
        let output = self.run_command(&self.remove_args(container))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(EnvironmentError::Teardown {
                container: container.to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn render_launch(&self, spec: &LaunchSpec) -> String {
        self.render(&self.launch_args(spec))
    }

    fn render_exec(&self, container: &str, argv: &[String]) -> String {
        self.render(&self.exec_args(container, argv))
    }

    fn render_remove(&self, container: &str) -> String {
        self.render(&self.remove_args(container))
    }
}

/// Quote an argument for display in a POSIX shell
pub(crate) fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageReference;
    use std::path::PathBuf;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            image: ImageReference::new("example/base:1.0").unwrap(),
            platform: "linux/amd64".to_string(),
            host_dir: PathBuf::from("/work/notebook"),
            mount_point: "/io".to_string(),
            env: vec![("CUSTOM_COMPILE_COMMAND".to_string(), "./refreeze".to_string())],
        }
    }

    #[test]
    fn test_launch_args_shape() {
        let engine = SystemEngine::default();
        let args = engine.launch_args(&spec());
        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--rm",
                "--platform",
                "linux/amd64",
                "--volume",
                "/work/notebook:/io",
                "--workdir",
                "/io",
                "--env",
                "CUSTOM_COMPILE_COMMAND=./refreeze",
                "--label",
                "refreeze=1",
                "--entrypoint",
                "sleep",
                "example/base:1.0",
                "infinity",
            ]
        );
    }

    #[test]
    fn test_exec_and_remove_args() {
        let engine = SystemEngine::new("podman");
        assert_eq!(engine.name(), "podman");
        let argv = vec!["pip-compile".to_string(), "requirements.in".to_string()];
        assert_eq!(
            engine.exec_args("abc123", &argv),
            vec!["exec", "abc123", "pip-compile", "requirements.in"]
        );
        assert_eq!(engine.remove_args("abc123"), vec!["rm", "--force", "abc123"]);
    }

    #[test]
    fn test_render_quotes_shell_words() {
        let engine = SystemEngine::default();
        let argv = vec!["sh".to_string(), "-c".to_string(), "pip list > /tmp/x".to_string()];
        assert_eq!(
            engine.render_exec("<container>", &argv),
            "docker exec '<container>' sh -c 'pip list > /tmp/x'"
        );
        assert_eq!(engine.render_remove("abc"), "docker rm --force abc");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("linux/amd64"), "linux/amd64");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_missing_engine_binary() {
        let engine = SystemEngine::new("refreeze-test-no-such-engine");
        let err = engine.remove("abc").unwrap_err();
        assert!(matches!(err, EnvironmentError::EngineUnavailable { .. }));
    }
}
