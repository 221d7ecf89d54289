//! Container identity assignment and persistence.
//!
//! The identity names both the long-lived container and its image. It is
//! generated once per environment and written next to the environment so
//! later commands against the same directory reuse it.
use crate::descriptor::EnvironmentDescriptor;
use crate::error::DrenvError;
use crate::util::truncate_string;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Docker allows 128 chars per tag; rocker prepends its own prefixes to
/// derived tags, so identities stay well below that.
pub const MAX_TAG_LEN: usize = 100;
pub const INTERMEDIATE_IMAGE_SUFFIX: &str = "_tmp_intermediate";
pub const IMAGE_REPOSITORY: &str = "drenv";
const RANDOM_BYTES: usize = 12;

/// Longest identity that still leaves room for the intermediate suffix.
pub const fn max_identity_len() -> usize {
    MAX_TAG_LEN - INTERMEDIATE_IMAGE_SUFFIX.len()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContainerIdentity(String);

impl ContainerIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Image the launch helper derives and keeps for this container.
    pub fn image_name(&self) -> String {
        format!("{IMAGE_REPOSITORY}:{}", self.0)
    }

    /// Image produced by the build step, deleted once the container runs.
    pub fn intermediate_image_name(&self) -> String {
        format!("{IMAGE_REPOSITORY}:{}{INTERMEDIATE_IMAGE_SUFFIX}", self.0)
    }

    pub(crate) fn from_persisted(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_end();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh identity: `<distro>_<24 hex chars><sanitized root>`.
pub fn assign_name(descriptor: &EnvironmentDescriptor, distro: &str) -> ContainerIdentity {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    compose_identity(distro, &hex::encode(bytes), &descriptor.paths.root)
}

fn compose_identity(distro: &str, random_hex: &str, root: &Path) -> ContainerIdentity {
    let raw = format!("{distro}_{random_hex}{}", sanitize_path(root));
    ContainerIdentity(truncate_string(&raw, max_identity_len()))
}

/// Encode a path with only characters valid in image tags and container names.
fn sanitize_path(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Write the identity to the environment's container name file.
pub fn persist(
    descriptor: &EnvironmentDescriptor,
    identity: &ContainerIdentity,
) -> Result<(), DrenvError> {
    let path = &descriptor.paths.container_name_file;
    fs::write(path, identity.as_str())
        .map_err(|err| DrenvError::io(format!("write {}", path.display()), err))?;
    tracing::debug!(container = %identity, path = %path.display(), "persisted container name");
    Ok(())
}
