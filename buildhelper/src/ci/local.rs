use super::CiProvider;
use crate::env::Env;

/// The provider used when no CI system is detected. Git information is left to the git provider.
pub struct Local<'a> {
    env: &'a Env,
}

impl<'a> Local<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }
}

impl CiProvider for Local<'_> {
    fn incremental_id(&self) -> &str {
        self.env.get_or("BUILD_ID", "0")
    }

    fn git_ref(&self) -> &str {
        ""
    }

    fn git_sha(&self) -> &str {
        ""
    }

    fn git_repository(&self) -> &str {
        ""
    }

    fn name(&self) -> &str {
        "local"
    }
}
