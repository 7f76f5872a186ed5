use clap::Args;
use common::store::ListMode;
use common::RegistryError;
use futures::TryStreamExt;

use super::entry_line;
use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Directory to list, or a folder inside an archive (defaults to root)
    #[arg(default_value = "")]
    pub path: String,

    /// List every file below the path
    #[arg(long, short)]
    pub recursive: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let mode = if self.recursive {
            ListMode::Nested
        } else {
            ListMode::Flat
        };

        let mut path = self.path.clone();
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }

        let entries: Vec<_> = session
            .registry
            .list(&path, mode, &session.credential)
            .await?
            .try_collect()
            .await?;

        if entries.is_empty() {
            return Ok("No items found".to_string());
        }
        Ok(entries.iter().map(entry_line).collect::<Vec<_>>().join("\n"))
    }
}
