mod build;
mod show;

use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};

use crate::{
    ci,
    config::{self, DOCKER_REGISTRY},
    env::Env,
    git::{Git, GitProvider},
    registry::RegistryKind,
    resolver::{Resolver, LATEST_BRANCH_HELP},
    version::VERSION,
    Result,
};

#[derive(Debug, Parser)]
#[command(version = VERSION, about, after_help = LATEST_BRANCH_HELP)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// The registry images are qualified with and pushed to. Falls back to `DOCKER_REGISTRY`, then
    /// `local`.
    #[arg(long = "registry", global = true, value_enum)]
    registry: Option<RegistryKind>,

    /// The registry build cache is stored in. Falls back to `DOCKER_CACHE_REGISTRY`, then the image
    /// registry.
    #[arg(long = "cache-registry", global = true, value_enum)]
    cache_registry: Option<RegistryKind>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the immutable image tag
    Tag,

    /// Print the image repository
    Repository,

    /// Print the fully qualified image reference
    Image {
        /// Also print the mutable references enabled by `DOCKER_MUTABLE_TAGS`
        #[arg(long = "all", default_value_t)]
        all: bool,
    },

    /// Print the registry cache references to import from
    CacheTags {
        /// Print the single reference to export to instead
        #[arg(long = "export", default_value_t)]
        export: bool,
    },

    /// Print the arguments passed to `docker` for a build
    BuildArgs {
        #[arg(default_value = ".")]
        context: PathBuf,
    },

    /// Print everything resolved from the environment as a table
    Info,

    /// Print the detected CI metadata as JSON
    Ci,

    /// Build the image with `docker buildx`, pushing it when `DOCKER_PUSH=true`
    Build {
        #[arg(default_value = ".")]
        context: PathBuf,
    },

    /// Log the docker daemon into the image registry
    Login,

    /// Lint every Dockerfile with hadolint
    Lint {
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Replace the local `from` build cache with the `to` cache of the last build
    RotateCache,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let env = Env::from_os();
        let git = Git::new();
        let mut stdout = std::io::stdout().lock();
        self.run_with(&env, &git, &mut stdout)
    }

    /// Runs the command against the given environment snapshot and git provider, writing results
    /// to `out`.
    pub fn run_with(self, env: &Env, git: &dyn GitProvider, out: &mut dyn Write) -> Result<()> {
        let ci = ci::detect(env);

        let registry_kind = config::registry_kind(self.registry, env, DOCKER_REGISTRY)?;
        let cache_registry_kind = config::cache_registry_kind(self.cache_registry, env, registry_kind)?;
        let registry = registry_kind.provider(env);
        let cache_registry = cache_registry_kind.provider(env);

        let resolver = Resolver::new(env, &*ci, git, &*registry).with_cache_registry(&*cache_registry);

        match self.command {
            Commands::Tag => writeln!(out, "{}", resolver.tag())?,
            Commands::Repository => writeln!(out, "{}", resolver.repository())?,
            Commands::Image { all } => show::image(&resolver, all, out)?,
            Commands::CacheTags { export } => show::cache_tags(&resolver, export, out)?,
            Commands::BuildArgs { context } => show::build_args(&resolver, &context, out)?,
            Commands::Info => show::info(&resolver, out)?,
            Commands::Ci => show::ci(&*ci, out)?,
            Commands::Build { context } => build::build(&resolver, &context, out)?,
            Commands::Login => registry.login()?,
            Commands::Lint { root } => crate::docker::lint(&root)?,
            Commands::RotateCache => crate::docker::rotate_cache(env)?,
        }

        Ok(())
    }
}
