use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use common::auth::{Credential, Token, TokenSource};
use common::{Registry, RegistryError};

use crate::state::{AppState, StateError};

#[derive(Clone)]
pub struct OpContext {
    /// Optional custom config directory (defaults to ~/.cos-registry)
    pub config_path: Option<PathBuf>,
    /// Token from the command line or environment
    pub token: Option<Token>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>, token: Option<Token>) -> Self {
        Self { config_path, token }
    }

    /// Load the config, build the registry and authenticate.
    ///
    /// Without an explicit token the configured owner token is used.
    pub async fn session(&self) -> Result<Session, SessionError> {
        let state = AppState::load(self.config_path.clone())?;
        let token = self.token.clone().or_else(|| {
            state
                .config
                .owner_token
                .as_deref()
                .map(|secret| Token::new(secret, TokenSource::AuthHeader))
        });

        let registry = Registry::new(state.config).await?;
        let credential = registry.authenticate(token.as_ref()).await?;
        tracing::debug!(role = %credential.role(), "session ready");

        Ok(Session {
            registry,
            credential,
        })
    }
}

/// An authenticated registry handle for one command.
pub struct Session {
    pub registry: Registry,
    pub credential: Arc<Credential>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
