use async_trait::async_trait;
use base64::Engine;
use reqwest::{header::HeaderMap, header::HeaderValue, Client};
use serde::{Deserialize, Serialize};
use url::Url;

use super::token::Token;
use crate::config::IdentityConfig;

/// API key details as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form text; carries the key settings as JSON
    #[serde(default)]
    pub description: Option<String>,
    /// Identity (service id) the key belongs to
    pub iam_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("invalid header value")]
    InvalidHeader,
}

/// Remote verification of API keys.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Look a token up. `Ok(None)` means the service does not know it.
    async fn lookup(&self, token: &Token) -> Result<Option<IdentityRecord>, IdentityError>;
}

/// IAM style `apikeys/details` client.
#[derive(Debug, Clone)]
pub struct HttpIdentityService {
    details_url: Url,
    client: Client,
}

impl HttpIdentityService {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("apikey:{}", config.service_api_key));
        let mut authorization = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|_| IdentityError::InvalidHeader)?;
        authorization.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        default_headers.insert("Authorization", authorization);
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            details_url: config.api_url.join("apikeys/details")?,
            client,
        })
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn lookup(&self, token: &Token) -> Result<Option<IdentityRecord>, IdentityError> {
        let mut key =
            HeaderValue::from_str(token.secret()).map_err(|_| IdentityError::InvalidHeader)?;
        key.set_sensitive(true);

        let response = self
            .client
            .get(self.details_url.clone())
            .header("IAM-Apikey", key)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "identity service rejected key");
            return Ok(None);
        }

        Ok(response.json::<Option<IdentityRecord>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let record: IdentityRecord = serde_json::from_str(
            r#"{"id": "ApiKey-1", "iam_id": "iam-ServiceId-1", "extra": true}"#,
        )
        .unwrap();

        assert!(!record.locked);
        assert!(!record.disabled);
        assert!(record.description.is_none());
    }

    #[test]
    fn test_details_url() {
        let config = IdentityConfig {
            api_url: Url::parse("https://iam.example.com/v1/").unwrap(),
            service_api_key: "svc".to_string(),
            resource_iam_id: "iam-1".to_string(),
        };
        let service = HttpIdentityService::new(&config).unwrap();
        assert_eq!(
            service.details_url.as_str(),
            "https://iam.example.com/v1/apikeys/details"
        );
    }
}
