use std::{ffi::OsStr, path::PathBuf};

use log::debug;

use crate::process;

const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";

/// Remote URL prefixes that are stripped to obtain an `owner/project` slug.
const KNOWN_REMOTE_PREFIXES: &[&str] = &[
    "git@github.com:",
    "ssh://git@github.com/",
    "https://github.com/",
];

/// Source of git metadata for the working tree. Implementations return an empty string when the
/// information is not available.
pub trait GitProvider {
    /// The symbolic ref of `HEAD`, e.g. `refs/heads/main`. Empty when detached.
    fn git_ref(&self) -> String;

    /// The full commit hash of `HEAD`.
    fn git_sha(&self) -> String;

    /// The `owner/project` slug of the `origin` remote.
    fn remote_repository(&self) -> String;
}

/// Reads metadata by running the `git` command line.
#[derive(Debug, Default, Clone)]
pub struct Git {
    dir: Option<PathBuf>,
}

impl Git {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs git inside `dir` instead of the current working directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn git(&self) -> process::Command {
        let command = process::command!("git");
        match &self.dir {
            Some(dir) => command.current_dir(dir),
            None => command,
        }
    }

    /// Runs git and returns its trimmed stdout, or an empty string if anything went wrong.
    fn output_or_empty(&self, args: &[&str]) -> String {
        match self
            .git()
            .args(args.iter().map(OsStr::new))
            .output()
        {
            Ok(output) => output.stdout_trimmed(),
            Err(error) => {
                debug!("{error}");
                String::new()
            }
        }
    }
}

impl GitProvider for Git {
    fn git_ref(&self) -> String {
        self.output_or_empty(&["symbolic-ref", "HEAD"])
    }

    fn git_sha(&self) -> String {
        self.output_or_empty(&["rev-parse", "--verify", "HEAD"])
    }

    fn remote_repository(&self) -> String {
        let url = self.output_or_empty(&["config", "--get", "remote.origin.url"]);
        remote_repository_slug(&url).to_owned()
    }
}

/// Strips `refs/heads/` from a ref. Anything else is returned unchanged.
pub fn branch_name(git_ref: &str) -> &str {
    git_ref.strip_prefix(HEADS_PREFIX).unwrap_or(git_ref)
}

/// Returns the tag name if `git_ref` is a tag ref.
pub fn tag_name(git_ref: &str) -> Option<&str> {
    git_ref.strip_prefix(TAGS_PREFIX)
}

/// Extracts `owner/project` from remote URLs like `git@github.com:owner/project.git` or
/// `https://github.com/owner/project.git`. Returns an empty string for unrecognized hosts.
pub fn remote_repository_slug(url: &str) -> &str {
    let url = url.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);
    KNOWN_REMOTE_PREFIXES
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
        .unwrap_or_default()
}
