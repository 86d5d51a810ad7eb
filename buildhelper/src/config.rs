//! Configuration read from the environment that can be wrong in ways we refuse to guess around.

use std::fmt;

use clap::ValueEnum;

use crate::{env::Env, registry::RegistryKind};

pub const DOCKER_REGISTRY: &str = "DOCKER_REGISTRY";
pub const DOCKER_CACHE_REGISTRY: &str = "DOCKER_CACHE_REGISTRY";

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    UnknownRegistry { variable: &'static str, value: String },
    RegistryRequired { action: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownRegistry { variable, value } => {
                let possible = RegistryKind::value_variants()
                    .iter()
                    .filter_map(|kind| kind.to_possible_value())
                    .map(|value| value.get_name().to_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "`{variable}` is set to unknown registry {value:?}, expected one of: {possible}"
                )
            }
            ConfigError::RegistryRequired { action } => write!(
                f,
                "a container registry is required to {action}, please pass `--registry` or set `{DOCKER_REGISTRY}`"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Picks the registry kind from the command line, then from `variable`, then [`RegistryKind::Local`].
pub fn registry_kind(
    explicit: Option<RegistryKind>,
    env: &Env,
    variable: &'static str,
) -> Result<RegistryKind, ConfigError> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }
    match env.get(variable) {
        "" => Ok(RegistryKind::default()),
        value => RegistryKind::from_str(value, true).map_err(|_| ConfigError::UnknownRegistry {
            variable,
            value: value.to_owned(),
        }),
    }
}

/// Picks the cache registry kind like [`registry_kind`], except that it falls back to the image
/// registry kind instead of [`RegistryKind::Local`].
pub fn cache_registry_kind(
    explicit: Option<RegistryKind>,
    env: &Env,
    image_kind: RegistryKind,
) -> Result<RegistryKind, ConfigError> {
    match (explicit, env.get(DOCKER_CACHE_REGISTRY)) {
        (None, "") => Ok(image_kind),
        (explicit, _) => registry_kind(explicit, env, DOCKER_CACHE_REGISTRY),
    }
}
