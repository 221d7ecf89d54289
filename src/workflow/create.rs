//! Environment creation: stage, name, build, launch, clean up, set up.
//!
//! Each step runs only after the previous one succeeded. Nothing is retried
//! or rolled back; a failure leaves the environment in the state the last
//! completed step produced, named and inspectable.
use crate::descriptor::{self, EnvironmentDescriptor};
use crate::engine::{BuildRequest, ContainerEngine};
use crate::error::DrenvError;
use crate::host::HostContext;
use crate::naming::{self, ContainerIdentity};
use crate::staging::{self, ResourceSource};
use std::fmt;
use std::fs;
use std::path::Path;

/// Settings for one creation run.
#[derive(Debug, Clone)]
pub struct CreateConfig {
    pub distro: String,
    pub no_cache: bool,
    pub no_gpu: bool,
    pub cuda: bool,
    /// Recorded in the image labels and the version marker.
    pub tool_version: String,
}

/// Creation progress, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildState {
    Init,
    Named,
    ImageBuilt,
    ContainerRunning,
    IntermediateCleaned,
    SetupComplete,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BuildState::Init => "init",
            BuildState::Named => "named",
            BuildState::ImageBuilt => "image-built",
            BuildState::ContainerRunning => "container-running",
            BuildState::IntermediateCleaned => "intermediate-cleaned",
            BuildState::SetupComplete => "setup-complete",
        };
        f.write_str(label)
    }
}

/// Result of a successful creation.
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub descriptor: EnvironmentDescriptor,
    pub state: BuildState,
}

/// Stage a new environment at `root` and build its container.
pub fn create_environment(
    root: &Path,
    host: &HostContext,
    config: &CreateConfig,
    resources: &ResourceSource,
    engine: &mut dyn ContainerEngine,
) -> Result<CreateReport, DrenvError> {
    let descriptor = descriptor::resolve(root, host)?;
    require_ssh_auth_sock(host)?;
    staging::stage(&descriptor, resources, &config.tool_version)?;
    build_environment(descriptor, host, config, engine)
}

/// Name the staged environment and bring its container up.
pub fn build_environment(
    descriptor: EnvironmentDescriptor,
    host: &HostContext,
    config: &CreateConfig,
    engine: &mut dyn ContainerEngine,
) -> Result<CreateReport, DrenvError> {
    transition(&descriptor, BuildState::Init);
    let ssh_auth_sock = require_ssh_auth_sock(host)?;

    let identity = naming::assign_name(&descriptor, &config.distro);
    naming::persist(&descriptor, &identity)?;
    let descriptor = descriptor.with_identity(identity.clone());
    transition(&descriptor, BuildState::Named);

    println!("Building container: {identity}");
    println!("Env config:");
    println!("{descriptor}");

    println!();
    println!("DOCKER IMAGE BUILD");
    println!();
    let intermediate_image = identity.intermediate_image_name();
    let request = build_request(&descriptor, config, &intermediate_image)?;
    let status = engine.build(&request)?;
    if !status.success() {
        return Err(DrenvError::BuildFailed {
            container: identity.to_string(),
            status: status.describe(),
            command: status.command,
            code: status.code,
        });
    }
    transition(&descriptor, BuildState::ImageBuilt);

    link_ssh_auth_sock(ssh_auth_sock, &descriptor.paths.ssh_auth_sock_link)?;

    println!();
    println!("DOCKER CONTAINER START");
    println!();
    let args = launch_args(&descriptor, host, config, &identity);
    let status = engine.run(&args)?;
    if !status.success() {
        return Err(DrenvError::LaunchFailed {
            container: identity.to_string(),
            status: status.describe(),
            command: status.command,
            code: status.code,
        });
    }
    transition(&descriptor, BuildState::ContainerRunning);

    match engine.remove_image(&intermediate_image) {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!(
            image = %intermediate_image,
            command = %status.command,
            status = %status.describe(),
            "failed to remove intermediate image"
        ),
        Err(err) => tracing::warn!(
            image = %intermediate_image,
            error = %err,
            "failed to remove intermediate image"
        ),
    }
    transition(&descriptor, BuildState::IntermediateCleaned);

    println!();
    println!("RUN CONTAINER SETUP SCRIPT");
    println!();
    let setup_args = [descriptor
        .paths
        .container_setup_script
        .to_string_lossy()
        .to_string()];
    let status = engine.exec(&descriptor.paths.run_cmd_script, &setup_args)?;
    if !status.success() {
        return Err(DrenvError::SetupFailed {
            container: identity.to_string(),
            status: status.describe(),
            command: status.command,
            code: status.code,
        });
    }
    transition(&descriptor, BuildState::SetupComplete);

    Ok(CreateReport {
        descriptor,
        state: BuildState::SetupComplete,
    })
}

/// The setup script needs agent access; checked before anything is staged or named.
fn require_ssh_auth_sock(host: &HostContext) -> Result<&Path, DrenvError> {
    host.ssh_auth_sock
        .as_deref()
        .ok_or(DrenvError::MissingCredential)
}

fn transition(descriptor: &EnvironmentDescriptor, state: BuildState) {
    tracing::info!(container = descriptor.container_name(), %state, "environment state");
}

fn build_request(
    descriptor: &EnvironmentDescriptor,
    config: &CreateConfig,
    tag: &str,
) -> Result<BuildRequest, DrenvError> {
    let path = &descriptor.paths.image_definition;
    let image_definition = fs::read_to_string(path)
        .map_err(|err| DrenvError::io(format!("read {}", path.display()), err))?;
    Ok(BuildRequest {
        tag: tag.to_string(),
        image_definition,
        build_args: vec![("ROS_DISTRO".to_string(), config.distro.clone())],
        labels: vec![
            (
                "drenv_dir".to_string(),
                descriptor.paths.root.display().to_string(),
            ),
            ("drenv_version".to_string(), config.tool_version.clone()),
        ],
        network: "host".to_string(),
        no_cache: config.no_cache,
    })
}

/// Point the environment's stable socket path at the caller's agent socket.
///
/// The container mounts the link, so a new agent socket (e.g. after a reboot)
/// only needs the link refreshed, not a rebuild.
fn link_ssh_auth_sock(target: &Path, link: &Path) -> Result<(), DrenvError> {
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link)
            .map_err(|err| DrenvError::io(format!("remove {}", link.display()), err))?;
    }
    symlink(target, link)
        .map_err(|err| DrenvError::io(format!("symlink {}", link.display()), err))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "ssh agent socket links require a unix host",
    ))
}

/// Flag set for the launch helper.
///
/// `--nvidia` goes first: placed after the image it would swallow the image
/// name as its own value.
pub fn launch_args(
    descriptor: &EnvironmentDescriptor,
    host: &HostContext,
    config: &CreateConfig,
    identity: &ContainerIdentity,
) -> Vec<String> {
    let paths = &descriptor.paths;
    let container = identity.as_str();
    let container_workspace = paths.container_workspace.display().to_string();
    let container_sock = paths.container_ssh_auth_sock.display().to_string();

    let mut args = Vec::new();
    if !config.no_gpu {
        args.push("--nvidia".to_string());
    }
    args.extend(
        [
            "--nocleanup",
            "--user",
            "--git",
            "--privileged",
            "--name",
            container,
            "--image-name",
        ]
        .map(String::from),
    );
    args.push(identity.image_name());
    args.push("--volume".to_string());
    args.push(format!(
        "{}:{container_workspace}",
        paths.workspace.display()
    ));
    args.extend(["--volume", "/dev/", "--volume", "/tmp/.X11-unix", "--volume"].map(String::from));
    args.push(host.home.join(".ssh").join("known_hosts").display().to_string());
    args.push(format!(
        "--volume={}:{container_sock}",
        paths.ssh_auth_sock_link.display()
    ));
    args.push("--env".to_string());
    args.push(format!("SSH_AUTH_SOCK={container_sock}"));
    if let Some(display) = &host.display {
        args.push("--env".to_string());
        args.push(format!("DISPLAY={display}"));
    }
    args.push("--env".to_string());
    args.push(format!("USER={}", host.user));
    args.extend(["--network", "host", "--oyr-run-arg"].map(String::from));
    args.push(format!(
        "--detach --group-add=dialout --security-opt apparmor:unconfined --workdir {container_workspace}"
    ));
    if config.cuda {
        args.push("--cuda".to_string());
    }
    if config.no_cache {
        args.push("--nocache".to_string());
    }
    args.push(identity.intermediate_image_name());
    args.push("tail -f /dev/null".to_string());
    args
}

#[cfg(test)]
#[path = "create_tests.rs"]
mod tests;
