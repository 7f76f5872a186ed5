pub use clap::Parser;

use std::path::PathBuf;

use common::auth::{Token, TokenSource};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "cos-registry")]
#[command(about = "Browse and manage an access-controlled object storage registry")]
pub struct Args {
    /// Path to the config directory (defaults to ~/.cos-registry)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// API key to act as (defaults to the configured owner token)
    #[arg(
        long,
        global = true,
        env = "COS_REGISTRY_TOKEN",
        hide_env_values = true,
        value_parser = parse_token
    )]
    pub token: Option<Token>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: crate::Command,
}

fn parse_token(value: &str) -> Result<Token, String> {
    Token::from_access_key(value.trim()).ok_or_else(|| "token must not be empty".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls() {
        let args = Args::try_parse_from([
            "cos-registry",
            "--token",
            "s3cret",
            "ls",
            "maven/",
            "--recursive",
        ])
        .unwrap();

        assert_eq!(args.token.as_ref().map(Token::secret), Some("s3cret"));
        assert_eq!(args.token.as_ref().map(Token::source), Some(TokenSource::AccessKey));
        assert!(!format!("{:?}", args).contains("s3cret"));
        assert!(matches!(args.command, crate::Command::Ls(_)));
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = Args::try_parse_from(["cos-registry", "--token", " ", "whoami"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        let args =
            Args::try_parse_from(["cos-registry", "--log-level", "debug", "version"]).unwrap();
        assert_eq!(args.log_level, LevelFilter::DEBUG);
    }
}
