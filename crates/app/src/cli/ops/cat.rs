use std::path::PathBuf;

use clap::Args;
use common::RegistryError;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// File or archive member to read
    pub path: String,

    /// Write to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let content = session
            .registry
            .get(&self.path, &session.credential)
            .await?;

        let mut writer: Box<dyn tokio::io::AsyncWrite + Send + Unpin> = match &self.output {
            Some(path) => Box::new(tokio::fs::File::create(path).await?),
            None => Box::new(tokio::io::stdout()),
        };

        let mut body = content.body;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(RegistryError::from)?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;

        match &self.output {
            Some(path) => Ok(format!("wrote {} bytes to {}", written, path.display())),
            None => Ok(String::new()),
        }
    }
}
