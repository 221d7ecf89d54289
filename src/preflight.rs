//! Host tool checks run before an environment is created.
//!
//! A missing `docker` or `rocker` would otherwise surface only after the
//! environment directory has been staged and named.
use crate::error::DrenvError;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// Each tuple is (command, install hint).
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<(), DrenvError> {
    let missing = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .map(|(tool, hint)| format!("  {tool} (install: {hint})"))
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(DrenvError::MissingTool(missing.join("\n")));
    }
    Ok(())
}

/// Check the engine binaries the creation flow shells out to.
pub fn check_engine_tools(docker: &str, rocker: &str) -> Result<(), DrenvError> {
    check_required_tools(&[
        (docker, "https://docs.docker.com/engine/install/"),
        (rocker, "pip install rocker"),
    ])
}
