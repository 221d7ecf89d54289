use super::{build_environment, create_environment, launch_args, BuildState, CreateConfig};
use crate::descriptor::resolve;
use crate::engine::{BuildRequest, ContainerEngine, EngineStatus};
use crate::error::DrenvError;
use crate::host::HostContext;
use crate::staging::{ResourceSource, BIN_MANIFEST};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Build(BuildRequest),
    Run(Vec<String>),
    Exec(PathBuf, Vec<String>),
    RemoveImage(String),
}

/// Engine that records every call and answers with preset exit codes.
#[derive(Default)]
struct RecordingEngine {
    calls: Vec<Call>,
    build_code: i32,
    run_code: i32,
    exec_code: i32,
    remove_code: i32,
}

impl RecordingEngine {
    fn status(command: &str, code: i32) -> EngineStatus {
        EngineStatus {
            command: command.to_string(),
            code: Some(code),
        }
    }

    fn launches(&self) -> Vec<&Vec<String>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Run(args) => Some(args),
                _ => None,
            })
            .collect()
    }
}

impl ContainerEngine for RecordingEngine {
    fn build(&mut self, request: &BuildRequest) -> Result<EngineStatus, DrenvError> {
        self.calls.push(Call::Build(request.clone()));
        Ok(Self::status("docker build -", self.build_code))
    }

    fn run(&mut self, args: &[String]) -> Result<EngineStatus, DrenvError> {
        self.calls.push(Call::Run(args.to_vec()));
        Ok(Self::status("rocker", self.run_code))
    }

    fn exec(&mut self, helper: &Path, args: &[String]) -> Result<EngineStatus, DrenvError> {
        self.calls
            .push(Call::Exec(helper.to_path_buf(), args.to_vec()));
        Ok(Self::status("run_cmd", self.exec_code))
    }

    fn remove_image(&mut self, image: &str) -> Result<EngineStatus, DrenvError> {
        self.calls.push(Call::RemoveImage(image.to_string()));
        Ok(Self::status("docker rmi", self.remove_code))
    }
}

fn host(cwd: &Path) -> HostContext {
    HostContext {
        user: "dave".to_string(),
        home: PathBuf::from("/home/dave"),
        ssh_auth_sock: Some(PathBuf::from("/tmp/ssh-agent.dave/agent.42")),
        display: Some(":1".to_string()),
        cwd: cwd.to_path_buf(),
    }
}

fn config(distro: &str) -> CreateConfig {
    CreateConfig {
        distro: distro.to_string(),
        no_cache: false,
        no_gpu: false,
        cuda: false,
        tool_version: "0.3.0-test".to_string(),
    }
}

fn image_token_index(args: &[String]) -> usize {
    args.iter()
        .position(|arg| arg.ends_with("_tmp_intermediate"))
        .expect("intermediate image token")
}

#[test]
fn creates_named_environment_for_humble() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws").join("env");
    let mut engine = RecordingEngine::default();

    let report = create_environment(
        &root,
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect("create");

    assert_eq!(report.state, BuildState::SetupComplete);
    for name in BIN_MANIFEST {
        assert!(root.join("bin").join(name).is_file(), "missing bin/{name}");
    }
    for name in ["Dockerfile", "_container_setup.sh", "drenv_version.txt"] {
        assert!(root.join("resources").join(name).is_file(), "missing {name}");
    }
    let name = fs::read_to_string(root.join("docker_container_name")).expect("identity");
    let pattern = Regex::new("^humble_[0-9a-f]{24}.*").expect("regex");
    assert!(pattern.is_match(&name), "{name}");
    assert_eq!(report.descriptor.container_name(), name);
}

#[test]
fn steps_run_in_order_with_expected_arguments() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws").join("env");
    let mut engine = RecordingEngine::default();
    let report = create_environment(
        &root,
        &host(tmp.path()),
        &config("iron"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect("create");
    let descriptor = report.descriptor;
    let name = descriptor.container_name().to_string();
    let intermediate = format!("drenv:{name}_tmp_intermediate");

    assert_eq!(engine.calls.len(), 4);
    match &engine.calls[0] {
        Call::Build(request) => {
            assert_eq!(request.tag, intermediate);
            assert_eq!(request.network, "host");
            assert!(request
                .build_args
                .contains(&("ROS_DISTRO".to_string(), "iron".to_string())));
            assert!(request.labels.contains(&(
                "drenv_dir".to_string(),
                descriptor.paths.root.display().to_string()
            )));
            assert!(request
                .labels
                .contains(&("drenv_version".to_string(), "0.3.0-test".to_string())));
            assert_eq!(
                request.image_definition,
                fs::read_to_string(&descriptor.paths.image_definition).expect("dockerfile")
            );
        }
        other => panic!("expected build first, got {other:?}"),
    }
    assert!(matches!(&engine.calls[1], Call::Run(_)));
    assert_eq!(engine.calls[2], Call::RemoveImage(intermediate));
    assert_eq!(
        engine.calls[3],
        Call::Exec(
            descriptor.paths.run_cmd_script.clone(),
            vec![descriptor
                .paths
                .container_setup_script
                .display()
                .to_string()]
        )
    );

    let link = fs::read_link(&descriptor.paths.ssh_auth_sock_link).expect("socket link");
    assert_eq!(link, PathBuf::from("/tmp/ssh-agent.dave/agent.42"));
}

#[test]
fn launch_mounts_match_descriptor_paths() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws").join("env");
    let mut engine = RecordingEngine::default();
    let report = create_environment(
        &root,
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect("create");
    let paths = &report.descriptor.paths;
    let name = report.descriptor.container_name();
    let args = engine.launches()[0].clone();

    let workspace_mount = format!(
        "{}:{}",
        paths.workspace.display(),
        paths.container_workspace.display()
    );
    assert!(args.contains(&workspace_mount));
    assert!(args.contains(&format!(
        "--volume={}:/tmp/ssh_auth_sock",
        paths.ssh_auth_sock_link.display()
    )));
    assert!(args.contains(&"/home/dave/.ssh/known_hosts".to_string()));
    assert!(args.contains(&"DISPLAY=:1".to_string()));
    assert!(args.contains(&"USER=dave".to_string()));
    assert!(args.contains(&format!("drenv:{name}")));
    let run_arg = args
        .iter()
        .position(|arg| arg == "--oyr-run-arg")
        .expect("run arg flag");
    assert!(args[run_arg + 1].contains("--group-add=dialout"));
    assert!(args[run_arg + 1].ends_with(&format!(
        "--workdir {}",
        paths.container_workspace.display()
    )));
    assert_eq!(args.last().map(String::as_str), Some("tail -f /dev/null"));
}

#[test]
fn accelerator_flag_precedes_image_token_by_default() {
    let tmp = TempDir::new().expect("tempdir");
    let mut engine = RecordingEngine::default();
    create_environment(
        &tmp.path().join("ws/env"),
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect("create");

    let args = engine.launches()[0].clone();
    let nvidia: Vec<usize> = args
        .iter()
        .enumerate()
        .filter(|(_, arg)| arg.as_str() == "--nvidia")
        .map(|(index, _)| index)
        .collect();
    assert_eq!(nvidia.len(), 1);
    assert!(nvidia[0] < image_token_index(&args));
    assert!(!args.contains(&"--cuda".to_string()));
}

#[test]
fn no_gpu_drops_accelerator_flag() {
    let tmp = TempDir::new().expect("tempdir");
    let mut engine = RecordingEngine::default();
    let config = CreateConfig {
        no_gpu: true,
        ..config("humble")
    };
    create_environment(
        &tmp.path().join("ws/env"),
        &host(tmp.path()),
        &config,
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect("create");

    let args = engine.launches()[0].clone();
    assert!(!args.contains(&"--nvidia".to_string()));
}

#[test]
fn cuda_and_no_cache_flags_are_forwarded() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws/env");
    let descriptor = resolve(&root, &host(tmp.path())).expect("resolve");
    let config = CreateConfig {
        cuda: true,
        no_cache: true,
        ..config("noetic")
    };
    let identity = crate::naming::assign_name(&descriptor, "noetic");
    let args = launch_args(&descriptor, &host(tmp.path()), &config, &identity);

    assert_eq!(args[0], "--nvidia");
    let image = image_token_index(&args);
    let cuda = args.iter().position(|arg| arg == "--cuda").expect("cuda");
    let nocache = args.iter().position(|arg| arg == "--nocache").expect("nocache");
    assert!(cuda < image && nocache < image);
}

#[test]
fn build_failure_stops_before_launch_and_keeps_identity() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws/env");
    let mut engine = RecordingEngine {
        build_code: 1,
        ..RecordingEngine::default()
    };

    let err = create_environment(
        &root,
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect_err("build fails");

    match &err {
        DrenvError::BuildFailed {
            container, code, ..
        } => {
            let persisted = fs::read_to_string(root.join("docker_container_name")).expect("read");
            assert_eq!(container, &persisted);
            assert_eq!(*code, Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.calls.len(), 1);
    assert!(engine.launches().is_empty());
    assert!(root.join("docker_container_name").is_file());
    assert!(fs::symlink_metadata(root.join("resources/ssh_auth_sock")).is_err());
}

#[test]
fn launch_failure_keeps_intermediate_image() {
    let tmp = TempDir::new().expect("tempdir");
    let mut engine = RecordingEngine {
        run_code: 125,
        ..RecordingEngine::default()
    };

    let err = create_environment(
        &tmp.path().join("ws/env"),
        &host(tmp.path()),
        &config("foxy"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect_err("launch fails");

    assert!(matches!(err, DrenvError::LaunchFailed { code: Some(125), .. }));
    assert_eq!(err.exit_code(), 125);
    assert!(!engine
        .calls
        .iter()
        .any(|call| matches!(call, Call::RemoveImage(_) | Call::Exec(..))));
}

#[test]
fn failed_image_removal_is_not_fatal() {
    let tmp = TempDir::new().expect("tempdir");
    let mut engine = RecordingEngine {
        remove_code: 1,
        ..RecordingEngine::default()
    };

    let report = create_environment(
        &tmp.path().join("ws/env"),
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect("create despite rmi failure");

    assert_eq!(report.state, BuildState::SetupComplete);
    assert!(matches!(engine.calls.last(), Some(Call::Exec(..))));
}

#[test]
fn setup_failure_is_reported_after_launch() {
    let tmp = TempDir::new().expect("tempdir");
    let mut engine = RecordingEngine {
        exec_code: 2,
        ..RecordingEngine::default()
    };

    let err = create_environment(
        &tmp.path().join("ws/env"),
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect_err("setup fails");

    assert!(matches!(err, DrenvError::SetupFailed { code: Some(2), .. }));
    assert_eq!(engine.launches().len(), 1);
}

#[test]
fn missing_agent_socket_fails_before_naming() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws/env");
    let host = HostContext {
        ssh_auth_sock: None,
        ..host(tmp.path())
    };
    let descriptor = resolve(&root, &host).expect("resolve");
    crate::staging::stage(&descriptor, &ResourceSource::Embedded, "dev").expect("stage");
    let mut engine = RecordingEngine::default();

    let err = build_environment(descriptor, &host, &config("humble"), &mut engine)
        .expect_err("no agent socket");

    assert!(matches!(err, DrenvError::MissingCredential));
    assert!(engine.calls.is_empty());
    assert!(!root.join("docker_container_name").exists());
}

#[test]
fn missing_agent_socket_leaves_no_directory_behind() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws/env");
    let host = HostContext {
        ssh_auth_sock: None,
        ..host(tmp.path())
    };
    let mut engine = RecordingEngine::default();

    let err = create_environment(
        &root,
        &host,
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect_err("no agent socket");

    assert!(matches!(err, DrenvError::MissingCredential));
    assert!(!root.exists());
    assert!(engine.calls.is_empty());
}

#[test]
fn existing_root_is_rejected_without_engine_calls() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ws/env");
    fs::create_dir_all(&root).expect("mkdir");
    let mut engine = RecordingEngine::default();

    let err = create_environment(
        &root,
        &host(tmp.path()),
        &config("humble"),
        &ResourceSource::Embedded,
        &mut engine,
    )
    .expect_err("root exists");

    assert!(matches!(err, DrenvError::AlreadyExists(_)));
    assert!(engine.calls.is_empty());
}
