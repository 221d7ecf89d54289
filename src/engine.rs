//! Container engine capability.
//!
//! The orchestrator talks to `docker` and `rocker` only through
//! [`ContainerEngine`], so tests can substitute a recorder for the real
//! binaries.
use crate::error::DrenvError;
use crate::util::format_command;
use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

/// Environment variable naming the docker binary for staged helper scripts.
pub const DOCKER_ENV: &str = "DRENV_DOCKER";

/// Inputs for `docker build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub tag: String,
    /// Image definition streamed on stdin, so the build has no context dir.
    pub image_definition: String,
    pub build_args: Vec<(String, String)>,
    pub labels: Vec<(String, String)>,
    pub network: String,
    pub no_cache: bool,
}

impl BuildRequest {
    /// Arguments following `docker`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["build".to_string(), "-t".to_string(), self.tag.clone()];
        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(format!("--network={}", self.network));
        for (key, value) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{key}={value}"));
        }
        if self.no_cache {
            args.push("--no-cache".to_string());
        }
        args.push("-".to_string());
        args
    }
}

/// Outcome of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    /// Rendered command line, suitable for re-running by hand.
    pub command: String,
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl EngineStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

pub trait ContainerEngine {
    /// Build an image from a streamed definition.
    fn build(&mut self, request: &BuildRequest) -> Result<EngineStatus, DrenvError>;

    /// Launch the long-lived container with the launch helper's flag set.
    fn run(&mut self, args: &[String]) -> Result<EngineStatus, DrenvError>;

    /// Run `helper` (the environment's in-container command tool) with `args`.
    fn exec(&mut self, helper: &Path, args: &[String]) -> Result<EngineStatus, DrenvError>;

    fn remove_image(&mut self, image: &str) -> Result<EngineStatus, DrenvError>;
}

/// Engine backed by the `docker` and `rocker` executables.
///
/// Child output is inherited so long builds stream straight to the terminal.
#[derive(Debug, Clone)]
pub struct CliEngine {
    pub docker: String,
    pub rocker: String,
}

impl CliEngine {
    pub fn new(docker: impl Into<String>, rocker: impl Into<String>) -> Self {
        Self {
            docker: docker.into(),
            rocker: rocker.into(),
        }
    }
}

impl ContainerEngine for CliEngine {
    fn build(&mut self, request: &BuildRequest) -> Result<EngineStatus, DrenvError> {
        let args = request.args();
        let command = format_command(&self.docker, &args);
        tracing::info!(command = %command, "running");
        let start = Instant::now();
        let mut child = Command::new(&self.docker)
            .args(&args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|err| DrenvError::io(format!("spawn {}", self.docker), err))?;

        // `stdin` is dropped after the write, closing the pipe.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(request.image_definition.as_bytes()),
            None => Ok(()),
        };

        let status = child
            .wait()
            .map_err(|err| DrenvError::io(format!("wait for {}", self.docker), err))?;
        let result = finish(command, status, start);
        match written {
            // A build that exits early stops reading; its status is the failure.
            Err(err) if result.success() => {
                Err(DrenvError::io("stream image definition to docker build", err))
            }
            _ => Ok(result),
        }
    }

    fn run(&mut self, args: &[String]) -> Result<EngineStatus, DrenvError> {
        spawn_and_wait(Command::new(&self.rocker), &self.rocker, args)
    }

    /// Staged helpers read `DRENV_DOCKER`, so they use the same docker binary.
    fn exec(&mut self, helper: &Path, args: &[String]) -> Result<EngineStatus, DrenvError> {
        let mut cmd = Command::new(helper);
        cmd.env(DOCKER_ENV, &self.docker);
        spawn_and_wait(cmd, &helper.to_string_lossy(), args)
    }

    fn remove_image(&mut self, image: &str) -> Result<EngineStatus, DrenvError> {
        let args = ["rmi".to_string(), image.to_string()];
        spawn_and_wait(Command::new(&self.docker), &self.docker, &args)
    }
}

fn spawn_and_wait(
    mut cmd: Command,
    program: &str,
    args: &[String],
) -> Result<EngineStatus, DrenvError> {
    let command = format_command(program, args);
    tracing::info!(command = %command, "running");
    let start = Instant::now();
    let status = cmd
        .args(args)
        .status()
        .map_err(|err| DrenvError::io(format!("spawn {program}"), err))?;
    Ok(finish(command, status, start))
}

fn finish(command: String, status: ExitStatus, start: Instant) -> EngineStatus {
    let elapsed_ms = start.elapsed().as_millis();
    let result = EngineStatus {
        command,
        code: status.code(),
    };
    tracing::debug!(elapsed_ms, status = %result.describe(), "command finished");
    result
}
