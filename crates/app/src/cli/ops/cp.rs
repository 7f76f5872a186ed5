use clap::Args;
use common::bulk::Selection;
use common::RegistryError;

use super::report_line;
use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Cp {
    /// Source file, archive member, or directory (ending in `/`)
    pub from: String,

    /// Target path. A target ending in `/` keeps source names.
    pub to: String,

    /// Only copy these names under the source directory
    #[arg(long = "item")]
    pub items: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CpError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cp {
    type Error = CpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;

        let report = if self.items.is_empty() {
            session
                .registry
                .copy(&self.from, &self.to, &session.credential)
                .await?
        } else {
            let selection = Selection::items(self.from.as_str(), self.items.iter().cloned());
            session
                .registry
                .bulk_copy(&selection, &self.to, &session.credential)
                .await?
        };

        Ok(report_line("copied", &report))
    }
}
