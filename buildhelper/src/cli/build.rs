use std::{io::Write, path::Path};

use log::info;

use crate::{
    config::ConfigError,
    docker::{self, BuildArgs, Cache},
    resolver::Resolver,
    Result,
};

pub fn build(resolver: &Resolver, context: &Path, out: &mut dyn Write) -> Result<()> {
    let push = BuildArgs::push_from_env(resolver.env());
    if push && resolver.registry_host().is_empty() {
        return Err(ConfigError::RegistryRequired {
            action: "push images",
        }
        .into());
    }

    let cache = Cache::from_resolver(resolver);
    if matches!(cache, Cache::Registry { .. }) && resolver.cache_registry_host().is_empty() {
        return Err(ConfigError::RegistryRequired {
            action: "store build cache remotely",
        }
        .into());
    }

    let images = resolver.image_references();
    let output = docker::build(BuildArgs {
        images: &images,
        cache: &cache,
        push,
        context,
    })?;

    let image = resolver.image();
    match output.image_digest {
        Some(digest) if push => {
            info!("pushed {image}@{digest}");
            writeln!(out, "{image}@{digest}")?;
        }
        _ => writeln!(out, "{image}")?,
    }
    Ok(())
}
