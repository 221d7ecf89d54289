//! User-facing workflows built on the environment primitives.
//!
//! `create` drives the full staging and container build; `info` is read-only.
mod create;
mod info;

pub use create::{create_environment, CreateConfig};
pub use info::{run_info, InfoFormat};
