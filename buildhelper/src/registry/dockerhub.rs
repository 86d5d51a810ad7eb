use super::{docker_login, Registry, PLEASE_SET_PASSWORD, PLEASE_SET_USERNAME};
use crate::{env::Env, Result};

pub struct DockerHub<'a> {
    env: &'a Env,
}

impl<'a> DockerHub<'a> {
    pub const HOST: &'static str = "docker.io";

    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }

    pub fn username(&self) -> &str {
        self.env.get_or("DOCKERHUB_USERNAME", PLEASE_SET_USERNAME)
    }

    fn password(&self) -> &str {
        self.env.get_or("DOCKERHUB_PASSWORD", PLEASE_SET_PASSWORD)
    }
}

impl Registry for DockerHub<'_> {
    fn container_registry_host(&self) -> String {
        Self::HOST.to_owned()
    }

    fn login(&self) -> Result<()> {
        docker_login(Self::HOST, self.username(), self.password())
    }
}
