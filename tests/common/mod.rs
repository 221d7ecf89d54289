//! Shared test infrastructure for integration tests.
//!
//! Runs the built `drenv` binary against fake `docker` and `rocker`
//! executables that record their arguments instead of touching a daemon.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$(basename "$0") $*" >> "$DRENV_FAKE_LOG"
case "$1" in
    build)
        # A failing build exits before reading the streamed definition.
        if [ "${FAKE_DOCKER_BUILD_EXIT:-0}" != 0 ]; then
            exit "$FAKE_DOCKER_BUILD_EXIT"
        fi
        cat > /dev/null
        ;;
    rmi)
        exit "${FAKE_DOCKER_RMI_EXIT:-0}"
        ;;
esac
exit 0
"#;

const FAKE_ROCKER: &str = r#"#!/bin/sh
echo "$(basename "$0") $*" >> "$DRENV_FAKE_LOG"
exit "${FAKE_ROCKER_EXIT:-0}"
"#;

/// Scratch host: a workspace dir, fake engine binaries, and a call log.
pub struct FakeHost {
    pub temp: TempDir,
    pub fake_bin: PathBuf,
    pub log: PathBuf,
    pub home: PathBuf,
    exit_codes: Vec<(&'static str, String)>,
}

impl FakeHost {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let fake_bin = temp.path().join("fake-bin");
        let home = temp.path().join("home");
        fs::create_dir_all(&fake_bin).expect("create fake bin");
        fs::create_dir_all(home.join(".ssh")).expect("create home");
        write_script(&fake_bin.join("docker"), FAKE_DOCKER);
        write_script(&fake_bin.join("rocker"), FAKE_ROCKER);
        let log = temp.path().join("engine.log");
        Self {
            temp,
            fake_bin,
            log,
            home,
            exit_codes: Vec::new(),
        }
    }

    /// Make a fake step fail, e.g. `FAKE_DOCKER_BUILD_EXIT`.
    pub fn fail_with(mut self, var: &'static str, code: i32) -> Self {
        self.exit_codes.push((var, code.to_string()));
        self
    }

    /// Install a fake docker under another name, outside PATH.
    pub fn custom_docker(&self, name: &str) -> PathBuf {
        let dir = self.temp.path().join("custom-bin");
        fs::create_dir_all(&dir).expect("create custom bin");
        let path = dir.join(name);
        write_script(&path, FAKE_DOCKER);
        path
    }

    pub fn workspace(&self) -> PathBuf {
        let workspace = self.temp.path().join("ws");
        fs::create_dir_all(&workspace).expect("create workspace");
        workspace
    }

    /// Run `drenv` with `args` from `cwd`.
    pub fn run(&self, cwd: &Path, args: &[&str]) -> Output {
        let mut dirs = vec![self.fake_bin.clone()];
        if let Some(existing) = env::var_os("PATH") {
            dirs.extend(env::split_paths(&existing));
        }
        let path = env::join_paths(dirs).expect("join PATH");
        let mut command = Command::new(env!("CARGO_BIN_EXE_drenv"));
        command
            .args(args)
            .current_dir(cwd)
            .env("PATH", path)
            .env("USER", "tester")
            .env("HOME", &self.home)
            .env("SSH_AUTH_SOCK", self.temp.path().join("agent.sock"))
            .env("DISPLAY", ":0")
            .env("DRENV_FAKE_LOG", &self.log)
            .env_remove("DRENV_RESOURCE_DIR")
            .env_remove("DRENV_DOCKER")
            .env_remove("DRENV_ROCKER");
        for (var, value) in &self.exit_codes {
            command.env(var, value);
        }
        command.output().expect("run drenv")
    }

    /// Recorded engine invocations, one per line.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write fake script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod fake script");
}
