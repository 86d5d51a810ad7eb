//! The `docker` command line: building, cache handling and linting.

use std::{
    ffi::OsStr,
    fmt, fs,
    path::{Path, PathBuf},
};

use image_tag::ImageReference;
use log::{debug, info, warn};

use crate::{env::Env, files, process, resolver::Resolver, temp_path::tmp_path, Result};

pub const DOCKER_PUSH: &str = "DOCKER_PUSH";
pub const DOCKER_REMOTE_CACHE: &str = "DOCKER_REMOTE_CACHE";
pub const DOCKER_BUILDX_FROM: &str = "DOCKER_BUILDX_FROM";
pub const DOCKER_BUILDX_TO: &str = "DOCKER_BUILDX_TO";

pub const DEFAULT_BUILDX_FROM: &str = "/tmp/.buildx-cache";
pub const DEFAULT_BUILDX_TO: &str = "/tmp/.buildx-cache-new";

const HADOLINT_IMAGE: &str = "hadolint/hadolint";

/// Where `docker buildx` imports cache from and exports cache to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cache {
    /// Cache images in a registry, see [`Resolver::cache_from`] and [`Resolver::cache_to`].
    Registry {
        from: Vec<ImageReference<'static>>,
        to: Option<ImageReference<'static>>,
    },
    /// Cache directories on the build machine. Exports go to `to`, which [`rotate_cache`] moves
    /// over `from` once the build is done.
    Local { from: PathBuf, to: PathBuf },
}

impl Cache {
    /// Registry cache when `DOCKER_REMOTE_CACHE` is `true`, local directories otherwise.
    pub fn from_resolver(resolver: &Resolver) -> Self {
        let env = resolver.env();
        if env.is_true(DOCKER_REMOTE_CACHE) {
            Cache::Registry {
                from: resolver.cache_from(),
                to: resolver.cache_to(),
            }
        } else {
            Cache::local(env)
        }
    }

    pub fn local(env: &Env) -> Self {
        let (from, to) = local_cache_dirs(env);
        Cache::Local { from, to }
    }

    /// The `--cache-from` and `--cache-to` arguments. Local directories that do not exist are not
    /// imported from.
    pub fn args(&self) -> Vec<String> {
        match self {
            Cache::Registry { from, to } => from
                .iter()
                .map(|reference| format!("--cache-from=type=registry,ref={reference}"))
                .chain(
                    to.iter()
                        .map(|reference| format!("--cache-to=type=registry,ref={reference},mode=max")),
                )
                .collect(),
            Cache::Local { from, to } => [from, to]
                .into_iter()
                .filter(|dir| files::is_dir(dir))
                .map(|dir| format!("--cache-from=type=local,src={}", dir.display()))
                .chain([format!("--cache-to=type=local,dest={}", to.display())])
                .collect(),
        }
    }
}

fn local_cache_dirs(env: &Env) -> (PathBuf, PathBuf) {
    (
        env.get_or(DOCKER_BUILDX_FROM, DEFAULT_BUILDX_FROM).into(),
        env.get_or(DOCKER_BUILDX_TO, DEFAULT_BUILDX_TO).into(),
    )
}

pub struct BuildArgs<'a> {
    /// The first reference is the immutable one; the rest are additional tags.
    pub images: &'a [ImageReference<'a>],
    pub cache: &'a Cache,
    pub push: bool,
    pub context: &'a Path,
}

impl BuildArgs<'_> {
    /// Reads `DOCKER_PUSH`.
    pub fn push_from_env(env: &Env) -> bool {
        env.is_true(DOCKER_PUSH)
    }

    /// Everything after `docker`, except for `--metadata-file`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "buildx".to_owned(),
            "build".to_owned(),
            if self.push { "--push" } else { "--load" }.to_owned(),
        ];
        args.extend(self.cache.args());
        for image in self.images {
            args.push("-t".to_owned());
            args.push(image.to_string());
        }
        args.push(self.context.display().to_string());
        args
    }
}

pub struct BuildOutput {
    pub image_digest: Option<String>,
}

/// Partial implementation of the JSON emitted by the `--metadata-file` option of `docker build`.
/// See https://docs.docker.com/reference/cli/docker/buildx/build/#metadata-file.
#[derive(serde::Deserialize)]
struct MetadataFile {
    #[serde(rename = "containerimage.digest", default)]
    containerimage_digest: Option<String>,
}

/// A build failure together with the image that was being built.
#[derive(Debug)]
pub struct BuildError {
    pub image: String,
    pub source: process::Error,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to build image `{}`: {}", self.image, self.source)
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub fn build(args: BuildArgs) -> Result<BuildOutput> {
    let image = args
        .images
        .first()
        .map(ToString::to_string)
        .ok_or("at least one image reference is required to build")?;
    let metadata_filepath = tmp_path("json");

    let mut build_args = args.to_args();
    let context = build_args.pop();
    build_args.push("--metadata-file".to_owned());
    build_args.push(metadata_filepath.display().to_string());
    build_args.extend(context);

    info!("building {image}");
    let status = process::Command::new("docker")
        .args(build_args.iter().map(OsStr::new))
        .status();
    let metadata = fs::read_to_string(&metadata_filepath);
    remove_metadata_file(&metadata_filepath);
    status.map_err(|source| BuildError {
        image: image.clone(),
        source,
    })?;

    let image_digest = match metadata {
        Ok(metadata_string) => {
            serde_json::from_str::<MetadataFile>(&metadata_string)?.containerimage_digest
        }
        Err(error) => {
            warn!("unable to read build metadata from {metadata_filepath:?}: {error}");
            None
        }
    };
    debug!("image_digest: {image_digest:?}");

    Ok(BuildOutput { image_digest })
}

fn remove_metadata_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => debug!("unable to remove build metadata {path:?}: {error}"),
    }
}

/// Replaces the `from` cache directory with the `to` directory written by the last build.
pub fn rotate_cache(env: &Env) -> Result<()> {
    let (from, to) = local_cache_dirs(env);

    if files::is_dir(&from) {
        debug!("removing {from:?}");
        fs::remove_dir_all(&from)?;
    } else {
        info!("no from directory to remove: {}", from.display());
    }

    if files::is_dir(&to) {
        debug!("renaming {to:?} to {from:?}");
        fs::rename(&to, &from)?;
    } else {
        info!("no to directory to rename: {}", to.display());
    }
    Ok(())
}

/// Lints every Dockerfile below `root` with hadolint. All files are linted before the last
/// failure is returned.
pub fn lint(root: &Path) -> Result<()> {
    let dockerfiles = files::all_with_extension(root, "dockerfile")?;
    if dockerfiles.is_empty() {
        info!("no Dockerfiles to lint");
        return Ok(());
    }

    let mut last_error: Option<Box<dyn std::error::Error + Send + Sync>> = None;
    for dockerfile in dockerfiles {
        info!("linting {}", dockerfile.display());
        let contents = match fs::read(root.join(&dockerfile)) {
            Ok(contents) => contents,
            Err(error) => {
                warn!("unable to open {dockerfile:?} for reading: {error}");
                last_error = Some(error.into());
                continue;
            }
        };
        if let Err(error) =
            process::command!("docker", "run", "-i", "--rm", HADOLINT_IMAGE).status_with_input(contents)
        {
            warn!("{}: {error}", dockerfile.display());
            last_error = Some(error.into());
        }
    }

    match last_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
