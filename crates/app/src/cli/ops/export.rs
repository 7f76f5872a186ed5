use std::path::PathBuf;

use clap::Args;
use common::bulk::Selection;
use common::RegistryError;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Export {
    /// Directory (or archive folder) to export
    #[arg(default_value = "")]
    pub path: String,

    /// Only export these names under the path
    #[arg(long = "item")]
    pub items: Vec<String>,

    /// Output file (defaults to `<dir>.tar.gz` in the current directory)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Export {
    type Error = ExportError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;

        let selection = if self.items.is_empty() {
            Selection::subtree(self.path.as_str())
        } else {
            Selection::items(self.path.as_str(), self.items.iter().cloned())
        };
        let export = session
            .registry
            .bulk_export(&selection, &session.credential)?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&export.file_name));
        let mut file = tokio::fs::File::create(&output).await?;

        let mut body = export.body;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(RegistryError::from)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(format!("wrote {} ({} bytes)", output.display(), written))
    }
}
