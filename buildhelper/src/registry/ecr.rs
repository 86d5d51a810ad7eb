use super::Registry;
use crate::{env::Env, process, Result};

/// Amazon ECR. The account and region are read once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ecr {
    pub aws_default_region: String,
    pub account_id: String,
}

impl Ecr {
    pub fn new(env: &Env) -> Self {
        Self {
            aws_default_region: env.get_or("AWS_DEFAULT_REGION", "us-west-2").to_owned(),
            account_id: env.get_or("AWS_ACCOUNT_ID", "0").to_owned(),
        }
    }
}

impl Registry for Ecr {
    fn container_registry_host(&self) -> String {
        format!(
            "{account}.dkr.ecr.{region}.amazonaws.com",
            account = self.account_id,
            region = self.aws_default_region
        )
    }

    /// Equivalent to `aws ecr get-login-password --region R | docker login --username=AWS
    /// --password-stdin HOST`.
    fn login(&self) -> Result<()> {
        process::pipe(
            process::command!(
                "aws",
                "ecr",
                "get-login-password",
                "--region",
                self.aws_default_region,
            ),
            process::command!(
                "docker",
                "login",
                "--username=AWS",
                "--password-stdin",
                self.container_registry_host(),
            ),
        )?;
        Ok(())
    }
}
