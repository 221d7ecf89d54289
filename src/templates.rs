pub const ACTIVATE: &str = include_str!("../resources/activate");
pub const REBUILD: &str = include_str!("../resources/rebuild");
pub const RUN_CMD: &str = include_str!("../resources/run_cmd");
pub const CLEANUP: &str = include_str!("../resources/cleanup");
pub const DELETE_ALL_CONTAINERS_SH: &str =
    include_str!("../resources/delete_all_drenv_containers.sh");
pub const DELETE_ALL_IMAGES_SH: &str = include_str!("../resources/delete_all_drenv_images.sh");
pub const DOCKERFILE: &str = include_str!("../resources/Dockerfile");
pub const CONTAINER_SETUP_SH: &str = include_str!("../resources/_container_setup.sh");

/// Look up a resource compiled into the binary by file name.
pub fn embedded(name: &str) -> Option<&'static str> {
    match name {
        "activate" => Some(ACTIVATE),
        "rebuild" => Some(REBUILD),
        "run_cmd" => Some(RUN_CMD),
        "cleanup" => Some(CLEANUP),
        "delete_all_drenv_containers.sh" => Some(DELETE_ALL_CONTAINERS_SH),
        "delete_all_drenv_images.sh" => Some(DELETE_ALL_IMAGES_SH),
        "Dockerfile" => Some(DOCKERFILE),
        "_container_setup.sh" => Some(CONTAINER_SETUP_SH),
        _ => None,
    }
}
