use super::CiProvider;
use crate::env::Env;

/// Reads the [default environment variables] of GitHub Actions.
///
/// [default environment variables]: https://docs.github.com/en/actions/learn-github-actions/variables#default-environment-variables
pub struct GithubActions<'a> {
    env: &'a Env,
}

impl<'a> GithubActions<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }
}

/// Recognizes a run inside GitHub Actions, which always sets `GITHUB_ACTIONS=true`.
pub fn detect_github_actions(env: &Env) -> Option<Box<dyn CiProvider + '_>> {
    if env.is_true("GITHUB_ACTIONS") {
        Some(Box::new(GithubActions::new(env)))
    } else {
        None
    }
}

impl CiProvider for GithubActions<'_> {
    fn incremental_id(&self) -> &str {
        self.env.get("GITHUB_RUN_NUMBER")
    }

    fn git_ref(&self) -> &str {
        self.env.get("GITHUB_REF")
    }

    fn git_sha(&self) -> &str {
        self.env.get("GITHUB_SHA")
    }

    fn git_repository(&self) -> &str {
        self.env.get("GITHUB_REPOSITORY")
    }

    fn name(&self) -> &str {
        "gh"
    }
}
