//! Resource staging into a fresh environment directory.
//!
//! Staging happens once, at creation time. An existing root is never
//! touched, and every resource is loaded before the first directory is
//! created so a broken installation leaves nothing behind.
use crate::descriptor::EnvironmentDescriptor;
use crate::error::DrenvError;
use crate::templates;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// User-facing tools, staged into `bin/`.
pub const BIN_MANIFEST: &[&str] = &[
    "activate",
    "rebuild",
    "run_cmd",
    "cleanup",
    "delete_all_drenv_containers.sh",
    "delete_all_drenv_images.sh",
];

/// Internal image and setup resources, staged into `resources/`.
pub const RESOURCE_MANIFEST: &[&str] = &["Dockerfile", "_container_setup.sh"];

/// Where staged resources are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    /// Resources compiled into the binary.
    Embedded,
    /// An installed resource directory.
    Directory(PathBuf),
}

impl ResourceSource {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        dir.map(ResourceSource::Directory)
            .unwrap_or(ResourceSource::Embedded)
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, DrenvError> {
        match self {
            ResourceSource::Embedded => templates::embedded(name)
                .map(|text| text.as_bytes().to_vec())
                .ok_or_else(|| self.missing(name)),
            ResourceSource::Directory(dir) => {
                let path = dir.join(name);
                if !path.is_file() {
                    return Err(self.missing(name));
                }
                fs::read(&path).map_err(|err| DrenvError::io(format!("read {}", path.display()), err))
            }
        }
    }

    fn missing(&self, name: &str) -> DrenvError {
        DrenvError::ResourceMissing {
            name: name.to_string(),
            source_dir: self.describe(),
        }
    }

    fn describe(&self) -> String {
        match self {
            ResourceSource::Embedded => "embedded resources".to_string(),
            ResourceSource::Directory(dir) => dir.display().to_string(),
        }
    }
}

struct StagedFile {
    dest: PathBuf,
    bytes: Vec<u8>,
    executable: bool,
}

/// Create the environment directory and populate it from `source`.
pub fn stage(
    descriptor: &EnvironmentDescriptor,
    source: &ResourceSource,
    version: &str,
) -> Result<(), DrenvError> {
    let paths = &descriptor.paths;
    if fs::symlink_metadata(&paths.root).is_ok() {
        return Err(DrenvError::AlreadyExists(paths.root.clone()));
    }

    let mut files = Vec::with_capacity(BIN_MANIFEST.len() + RESOURCE_MANIFEST.len());
    for name in BIN_MANIFEST {
        files.push(StagedFile {
            dest: paths.bin_dir.join(name),
            bytes: source.load(name)?,
            executable: true,
        });
    }
    for name in RESOURCE_MANIFEST {
        files.push(StagedFile {
            dest: paths.resource_dir.join(name),
            bytes: source.load(name)?,
            executable: name.ends_with(".sh"),
        });
    }

    fs::create_dir_all(&paths.root)
        .map_err(|err| DrenvError::io(format!("create {}", paths.root.display()), err))?;
    create_dir(&paths.bin_dir)?;
    create_dir(&paths.resource_dir)?;

    for file in &files {
        write_file(&file.dest, &file.bytes, file.executable)?;
    }
    write_file(&paths.version_file, version.as_bytes(), false)?;

    tracing::info!(
        root = %paths.root.display(),
        files = files.len() + 1,
        source = %source.describe(),
        "staged environment resources"
    );
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), DrenvError> {
    fs::create_dir(path).map_err(|err| DrenvError::io(format!("create {}", path.display()), err))
}

fn write_file(path: &Path, bytes: &[u8], executable: bool) -> Result<(), DrenvError> {
    fs::write(path, bytes).map_err(|err| DrenvError::io(format!("write {}", path.display()), err))?;
    if executable {
        mark_executable(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), DrenvError> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|err| DrenvError::io(format!("chmod {}", path.display()), err))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), DrenvError> {
    Ok(())
}
