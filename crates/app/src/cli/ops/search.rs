use clap::Args;
use common::search::SearchQuery;
use common::RegistryError;
use futures::TryStreamExt;

use crate::cli::op::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Search {
    /// Directory (or archive folder) to search under
    #[arg(default_value = "")]
    pub path: String,

    /// File glob(s); several may be joined with `,` or `;`
    #[arg(long = "files", short = 'f')]
    pub files: Vec<String>,

    /// Case-insensitive content pattern(s), matched line by line
    #[arg(long = "content", short = 'c')]
    pub content: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Search {
    type Error = SearchError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let query = SearchQuery::new(&self.files, &self.content);

        let mut path = self.path.clone();
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }

        let mut found: Vec<String> = session
            .registry
            .search(&path, query, &session.credential)
            .await?
            .map_ok(|entry| entry.path)
            .try_collect()
            .await?;
        found.sort();

        if found.is_empty() {
            return Ok("No matches".to_string());
        }
        Ok(found.join("\n"))
    }
}
