//! Metadata about the CI system running the build.
//!
//! Exactly one [`CiProvider`] is active per run. It is picked by [`detect`], which tries each entry
//! of [`DETECTORS`] in order against an [`Env`] snapshot and falls back to [`Local`].

mod github_actions;
mod local;

pub use github_actions::*;
pub use local::*;
use log::debug;
use serde::Serialize;

use crate::env::Env;

pub trait CiProvider {
    /// A number that increases with every build of the project.
    fn incremental_id(&self) -> &str;

    /// The git ref that triggered the build, e.g. `refs/heads/main`. Empty if unknown.
    fn git_ref(&self) -> &str;

    /// The commit being built. Empty if unknown.
    fn git_sha(&self) -> &str;

    /// The repository slug, e.g. `owner/project`. Empty if unknown.
    fn git_repository(&self) -> &str;

    /// A short name identifying the CI system.
    fn name(&self) -> &str;

    fn metadata(&self) -> CiMetadata {
        CiMetadata {
            name: self.name().to_owned(),
            incremental_id: self.incremental_id().to_owned(),
            git_ref: self.git_ref().to_owned(),
            git_sha: self.git_sha().to_owned(),
            git_repository: self.git_repository().to_owned(),
        }
    }
}

/// An owned snapshot of everything a [`CiProvider`] reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CiMetadata {
    pub name: String,
    pub incremental_id: String,
    pub git_ref: String,
    pub git_sha: String,
    pub git_repository: String,
}

pub type Detector = for<'a> fn(&'a Env) -> Option<Box<dyn CiProvider + 'a>>;

/// Detectors in priority order. The first one to recognize the environment wins.
pub const DETECTORS: &[Detector] = &[detect_github_actions];

pub fn detect(env: &Env) -> Box<dyn CiProvider + '_> {
    detect_with(DETECTORS, env)
}

pub fn detect_with<'a>(detectors: &[Detector], env: &'a Env) -> Box<dyn CiProvider + 'a> {
    let provider = detectors
        .iter()
        .find_map(|detector| detector(env))
        .unwrap_or_else(|| Box::new(Local::new(env)) as Box<dyn CiProvider + 'a>);
    debug!("detected ci provider: {}", provider.name());
    provider
}
