//! Environment descriptor: the derived layout plus the container identity.
//!
//! Resolution is read-only and safe before a name has been assigned; the
//! identity is attached as a separate step, producing a new value.
use crate::error::DrenvError;
use crate::host::HostContext;
use crate::layout::EnvironmentPaths;
use crate::naming::ContainerIdentity;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

pub const UNNAMED_CONTAINER: &str = "unnamed_container";

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentDescriptor {
    #[serde(flatten)]
    pub paths: EnvironmentPaths,
    #[serde(rename = "container_name")]
    pub identity: Option<ContainerIdentity>,
}

impl EnvironmentDescriptor {
    pub fn container_name(&self) -> &str {
        self.identity
            .as_ref()
            .map(ContainerIdentity::as_str)
            .unwrap_or(UNNAMED_CONTAINER)
    }

    pub fn with_identity(self, identity: ContainerIdentity) -> Self {
        Self {
            paths: self.paths,
            identity: Some(identity),
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        fn show(path: &Path) -> String {
            path.display().to_string()
        }
        let paths = &self.paths;
        vec![
            ("container_name", self.container_name().to_string()),
            ("workspace", show(&paths.workspace)),
            ("root", show(&paths.root)),
            ("bin_dir", show(&paths.bin_dir)),
            ("resource_dir", show(&paths.resource_dir)),
            ("container_name_file", show(&paths.container_name_file)),
            ("version_file", show(&paths.version_file)),
            ("image_definition", show(&paths.image_definition)),
            ("activate_script", show(&paths.activate_script)),
            ("run_cmd_script", show(&paths.run_cmd_script)),
            ("ssh_auth_sock_link", show(&paths.ssh_auth_sock_link)),
            ("container_workspace", show(&paths.container_workspace)),
            ("container_env_dir", show(&paths.container_env_dir)),
            ("container_setup_script", show(&paths.container_setup_script)),
            ("container_ssh_auth_sock", show(&paths.container_ssh_auth_sock)),
        ]
    }
}

/// Two-column field/value table.
impl fmt::Display for EnvironmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        let width = rows
            .iter()
            .map(|(field, _)| field.len())
            .max()
            .unwrap_or(0)
            .max("field".len());
        writeln!(f, "{:<width$}  value", "field")?;
        writeln!(f, "{}  -----", "-".repeat(width))?;
        for (field, value) in rows {
            writeln!(f, "{field:<width$}  {value}")?;
        }
        Ok(())
    }
}

/// Resolve the descriptor for `root`, loading a persisted identity if any.
pub fn resolve(root: &Path, host: &HostContext) -> Result<EnvironmentDescriptor, DrenvError> {
    let paths = EnvironmentPaths::derive(root, host)?;
    let identity = read_identity(&paths.container_name_file)?;
    Ok(EnvironmentDescriptor { paths, identity })
}

fn read_identity(path: &Path) -> Result<Option<ContainerIdentity>, DrenvError> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| DrenvError::io(format!("read {}", path.display()), err))?;
    Ok(ContainerIdentity::from_persisted(&raw))
}
