//! Container registries that images are pushed to and cache is stored in.

mod dockerhub;
mod ecr;
mod ghcr;

use clap::ValueEnum;
pub use dockerhub::*;
pub use ecr::*;
pub use ghcr::*;

use crate::{env::Env, process, Result};

pub trait Registry {
    /// The host name images are qualified with. Empty for images that only live locally.
    fn container_registry_host(&self) -> String;

    /// Authenticates the local docker daemon against the registry.
    fn login(&self) -> Result<()>;
}

/// A registry with no host. Images built against it are unqualified and stay on the local daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRegistry;

impl Registry for LocalRegistry {
    fn container_registry_host(&self) -> String {
        String::new()
    }

    fn login(&self) -> Result<()> {
        log::info!("local registry requires no login");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RegistryKind {
    /// No registry, images are referenced as `repository:tag`.
    #[default]
    Local,
    /// Docker Hub at docker.io.
    Dockerhub,
    /// GitHub Container Registry at ghcr.io.
    Ghcr,
    /// Amazon Elastic Container Registry.
    Ecr,
}

impl RegistryKind {
    /// Constructs the registry, reading its configuration from `env`.
    pub fn provider<'a>(self, env: &'a Env) -> Box<dyn Registry + 'a> {
        match self {
            RegistryKind::Local => Box::new(LocalRegistry),
            RegistryKind::Dockerhub => Box::new(DockerHub::new(env)),
            RegistryKind::Ghcr => Box::new(Ghcr::new(env)),
            RegistryKind::Ecr => Box::new(Ecr::new(env)),
        }
    }
}

pub(crate) const PLEASE_SET_USERNAME: &str = "PLEASE-SET-USERNAME";
pub(crate) const PLEASE_SET_PASSWORD: &str = "PLEASE-SET-PASSWORD";

/// Runs `docker login` with the password passed through stdin so it never shows up in the process
/// list or our debug logs.
fn docker_login(host: &str, username: &str, password: &str) -> Result<()> {
    process::command!(
        "docker",
        "login",
        "--username",
        username,
        "--password-stdin",
        host
    )
    .status_with_input(password.as_bytes().to_vec())?;
    Ok(())
}
