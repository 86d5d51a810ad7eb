pub mod ci;
pub mod config;
pub mod docker;
pub mod env;
pub(crate) mod files;
pub mod git;
pub mod process;
pub mod registry;
pub mod resolver;
pub(crate) mod temp_path;
pub mod version;

pub mod cli;

pub type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;
