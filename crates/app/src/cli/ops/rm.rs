use clap::Args;
use common::bulk::Selection;
use common::RegistryError;

use super::report_line;
use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// File to delete, or a directory (ending in `/`) to delete recursively
    pub path: String,

    /// Only delete these names under the path
    #[arg(long = "item")]
    pub items: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;

        let report = if self.items.is_empty() {
            session
                .registry
                .delete(&self.path, &session.credential)
                .await?
        } else {
            let selection = Selection::items(self.path.as_str(), self.items.iter().cloned());
            session
                .registry
                .bulk_delete(&selection, &session.credential)
                .await?
        };

        Ok(report_line("deleted", &report))
    }
}
