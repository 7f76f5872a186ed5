use clap::Args;

use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Whoami;

#[async_trait::async_trait]
impl crate::cli::op::Op for Whoami {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let credential = &session.credential;

        let identity = match credential.identity() {
            Some(identity) => match &identity.name {
                Some(name) => format!("{} ({})", identity.id, name),
                None => identity.id.clone(),
            },
            None => "-".to_string(),
        };

        Ok(format!(
            "role:     {}\nidentity: {}\nscope:    {:?}",
            credential.role(),
            identity,
            credential.predicate()
        ))
    }
}
