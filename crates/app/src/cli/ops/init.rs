use std::path::PathBuf;

use clap::Args;
use common::RegistryConfig;
use storage::StorageConfig;

use crate::state::{AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Serve objects from this local directory instead of memory
    #[arg(long)]
    pub local: Option<PathBuf>,

    /// Owner token written to the config
    #[arg(long)]
    pub owner_token: Option<String>,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = RegistryConfig::in_memory("");
        config.owner_token = self.owner_token.clone().filter(|t| !t.is_empty());
        if let Some(path) = &self.local {
            std::fs::create_dir_all(path)?;
            config.storage = StorageConfig::Local { path: path.clone() };
        }

        let state = AppState::init(ctx.config_path.clone(), config)?;
        Ok(format!(
            "wrote {}; edit [identity] and [storage] before use",
            state.config_path.display()
        ))
    }
}
