use std::{fs, path::PathBuf};

use common::RegistryConfig;

pub const APP_NAME: &str = "cos-registry";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: RegistryConfig,
}

impl AppState {
    /// The config directory (custom or default ~/.cos-registry)
    pub fn dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Write a fresh config file.
    pub fn init(custom_path: Option<PathBuf>, config: RegistryConfig) -> Result<Self, StateError> {
        let dir = Self::dir(custom_path)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load the config file from the config directory.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let dir = Self::dir(custom_path)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: RegistryConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("registry config not found. Run 'cos-registry init' first")]
    NotInitialized,

    #[error("registry config already exists")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
