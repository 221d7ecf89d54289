//! Error taxonomy for environment creation.
//!
//! Every variant is terminal for the current invocation. Engine failures
//! carry the container name and the rendered command so the user can re-run
//! the failing step by hand.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrenvError {
    #[error("environment root {} has no parent directory to mount as a workspace", .0.display())]
    InvalidRoot(PathBuf),

    #[error("environment directory {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("resource '{name}' missing from {source_dir} (broken drenv installation)")]
    ResourceMissing { name: String, source_dir: String },

    #[error("SSH_AUTH_SOCK must be set: the container setup script needs ssh agent access")]
    MissingCredential,

    #[error("{0} must be set in the environment")]
    MissingHostContext(&'static str),

    #[error("missing required host tools:\n{0}")]
    MissingTool(String),

    #[error("requested ROS distro '{distro}' not supported (supported: {supported})")]
    UnsupportedDistro { distro: String, supported: String },

    #[error("image build for container {container} failed with {status}: {command}")]
    BuildFailed {
        container: String,
        command: String,
        status: String,
        code: Option<i32>,
    },

    #[error("container launch for {container} failed with {status}: {command}")]
    LaunchFailed {
        container: String,
        command: String,
        status: String,
        code: Option<i32>,
    },

    #[error("container setup in {container} failed with {status}: {command}")]
    SetupFailed {
        container: String,
        command: String,
        status: String,
        code: Option<i32>,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DrenvError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DrenvError::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this failure.
    ///
    /// Engine failures propagate the external command's own code when it fits
    /// in a process exit status; everything else exits 1.
    pub fn exit_code(&self) -> u8 {
        let code = match self {
            DrenvError::BuildFailed { code, .. }
            | DrenvError::LaunchFailed { code, .. }
            | DrenvError::SetupFailed { code, .. } => *code,
            _ => None,
        };
        code.and_then(|code| u8::try_from(code).ok())
            .filter(|code| *code != 0)
            .unwrap_or(1)
    }
}
