//! Ambient host context.
//!
//! All environment reads happen once, in [`HostContext::from_env`]; the rest of
//! the crate only sees the resulting value.
use crate::error::DrenvError;
use std::env;
use std::path::PathBuf;

/// Snapshot of the invoking user's environment.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Invoking user's login name; also names the home dir inside the container.
    pub user: String,
    pub home: PathBuf,
    /// SSH agent socket; required for environment creation only.
    pub ssh_auth_sock: Option<PathBuf>,
    /// X display, forwarded as-is.
    pub display: Option<String>,
    /// Working directory used to resolve relative environment roots.
    pub cwd: PathBuf,
}

impl HostContext {
    pub fn from_env() -> Result<Self, DrenvError> {
        let user = non_empty_var("USER")
            .or_else(|| non_empty_var("LOGNAME"))
            .ok_or(DrenvError::MissingHostContext("USER"))?;
        let home = non_empty_var("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .ok_or(DrenvError::MissingHostContext("HOME"))?;
        let cwd =
            env::current_dir().map_err(|err| DrenvError::io("resolve current directory", err))?;
        Ok(Self {
            user,
            home,
            ssh_auth_sock: non_empty_var("SSH_AUTH_SOCK").map(PathBuf::from),
            display: non_empty_var("DISPLAY"),
            cwd,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
