//! Read-only view of an environment descriptor.
use crate::descriptor;
use crate::host::HostContext;
use anyhow::{Context, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoFormat {
    Table,
    Json,
}

/// Render the descriptor for `root`.
///
/// Works on roots that were never created; the container name then reads
/// as unnamed.
pub fn run_info(root: &Path, host: &HostContext, format: InfoFormat) -> Result<String> {
    let descriptor = descriptor::resolve(root, host)
        .with_context(|| format!("resolve environment at {}", root.display()))?;
    tracing::debug!(
        root = %descriptor.paths.root.display(),
        container = descriptor.container_name(),
        "resolved environment"
    );
    match format {
        InfoFormat::Table => Ok(descriptor.to_string()),
        InfoFormat::Json => {
            let mut text =
                serde_json::to_string_pretty(&descriptor).context("serialize environment")?;
            text.push('\n');
            Ok(text)
        }
    }
}
