use super::{docker_login, Registry, PLEASE_SET_PASSWORD, PLEASE_SET_USERNAME};
use crate::{env::Env, Result};

pub struct Ghcr<'a> {
    env: &'a Env,
}

impl<'a> Ghcr<'a> {
    pub const HOST: &'static str = "ghcr.io";

    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }

    /// `DOCKER_USERNAME` if set, otherwise the owner of `GITHUB_REPOSITORY`.
    pub fn username(&self) -> &str {
        let username = self.env.get("DOCKER_USERNAME");
        if !username.is_empty() {
            return username;
        }
        match self.env.get("GITHUB_REPOSITORY").split_once('/') {
            Some((owner, _)) => owner,
            None => PLEASE_SET_USERNAME,
        }
    }

    fn password(&self) -> &str {
        self.env.get_or("GHCR_PAT", PLEASE_SET_PASSWORD)
    }
}

impl Registry for Ghcr<'_> {
    fn container_registry_host(&self) -> String {
        Self::HOST.to_owned()
    }

    fn login(&self) -> Result<()> {
        docker_login(Self::HOST, self.username(), self.password())
    }
}
