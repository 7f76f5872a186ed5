use std::path::PathBuf;

use clap::Args;
use common::RegistryError;
use futures::{StreamExt, TryStreamExt};
use storage::StorageError;
use tokio_util::io::ReaderStream;

use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Local file to upload
    pub file: PathBuf,

    /// Registry path to store it at. A path ending in `/` keeps the file name.
    pub path: String,

    /// Content type to record (guessed from the extension otherwise)
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} has no file name")]
    NoFileName(PathBuf),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Put {
    type Error = PutError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = if self.path.ends_with('/') {
            let name = self
                .file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| PutError::NoFileName(self.file.clone()))?;
            format!("{}{}", self.path, name)
        } else {
            self.path.clone()
        };

        let file = tokio::fs::File::open(&self.file).await?;
        let size = file.metadata().await?.len();
        let body = ReaderStream::new(file).map_err(StorageError::Io).boxed();

        let session = ctx.session().await?;
        session
            .registry
            .put(&target, body, self.content_type.as_deref(), &session.credential)
            .await?;

        Ok(format!("stored {} ({} bytes)", target, size))
    }
}
