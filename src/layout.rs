//! Typed paths into an environment layout.
//!
//! Every host and container path is derived from the environment root's
//! position relative to its parent, so the mounts set up at launch and the
//! paths used by the staged scripts can never drift apart.
use crate::error::DrenvError;
use crate::host::HostContext;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

pub const BIN_DIR: &str = "bin";
pub const RESOURCE_DIR: &str = "resources";
pub const CONTAINER_NAME_FILE: &str = "docker_container_name";
pub const VERSION_FILE: &str = "drenv_version.txt";
pub const IMAGE_DEFINITION: &str = "Dockerfile";
pub const CONTAINER_SETUP_SCRIPT: &str = "_container_setup.sh";
pub const ACTIVATE_SCRIPT: &str = "activate";
pub const RUN_CMD_SCRIPT: &str = "run_cmd";
pub const SSH_AUTH_SOCK_LINK: &str = "ssh_auth_sock";
pub const CONTAINER_SSH_AUTH_SOCK: &str = "/tmp/ssh_auth_sock";

/// Host and container paths for one environment.
///
/// Fields prefixed `container_` are paths inside the container; the rest are
/// host paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentPaths {
    pub root: PathBuf,
    pub workspace: PathBuf,
    pub bin_dir: PathBuf,
    pub resource_dir: PathBuf,
    pub container_name_file: PathBuf,
    pub version_file: PathBuf,
    pub image_definition: PathBuf,
    pub activate_script: PathBuf,
    pub run_cmd_script: PathBuf,
    pub ssh_auth_sock_link: PathBuf,
    pub container_workspace: PathBuf,
    pub container_env_dir: PathBuf,
    pub container_setup_script: PathBuf,
    pub container_ssh_auth_sock: PathBuf,
}

impl EnvironmentPaths {
    /// Derive the full layout for `root`.
    ///
    /// Relative roots are resolved against `host.cwd`. The root itself does
    /// not need to exist yet.
    pub fn derive(root: &Path, host: &HostContext) -> Result<Self, DrenvError> {
        let root = normalize_root(root, &host.cwd);
        let workspace = root
            .parent()
            .ok_or_else(|| DrenvError::InvalidRoot(root.clone()))?
            .to_path_buf();
        let workspace_name = workspace
            .file_name()
            .ok_or_else(|| DrenvError::InvalidRoot(root.clone()))?;
        let env_name = root
            .file_name()
            .ok_or_else(|| DrenvError::InvalidRoot(root.clone()))?;

        let bin_dir = root.join(BIN_DIR);
        let resource_dir = root.join(RESOURCE_DIR);
        let container_workspace = Path::new("/home").join(&host.user).join(workspace_name);
        let container_env_dir = container_workspace.join(env_name);

        Ok(Self {
            container_name_file: root.join(CONTAINER_NAME_FILE),
            version_file: resource_dir.join(VERSION_FILE),
            image_definition: resource_dir.join(IMAGE_DEFINITION),
            activate_script: bin_dir.join(ACTIVATE_SCRIPT),
            run_cmd_script: bin_dir.join(RUN_CMD_SCRIPT),
            ssh_auth_sock_link: resource_dir.join(SSH_AUTH_SOCK_LINK),
            container_setup_script: container_env_dir
                .join(RESOURCE_DIR)
                .join(CONTAINER_SETUP_SCRIPT),
            container_ssh_auth_sock: PathBuf::from(CONTAINER_SSH_AUTH_SOCK),
            container_workspace,
            container_env_dir,
            bin_dir,
            resource_dir,
            workspace,
            root,
        })
    }
}

/// Make `path` absolute and resolve symlinks in the part of it that exists.
///
/// `.` and `..` are folded lexically first; the deepest existing ancestor is
/// then canonicalized and the remaining components appended unchanged.
pub(crate) fn normalize_root(path: &Path, cwd: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other.as_os_str()),
        }
    }

    let mut existing = lexical.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            let mut out = resolved;
            for name in tail.iter().rev() {
                out.push(name);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}
