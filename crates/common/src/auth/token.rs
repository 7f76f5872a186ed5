use base64::Engine;
use serde::{Deserialize, Serialize};

/// Where a token was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// `?accessKey=` query parameter
    AccessKey,
    /// `Authorization` header
    AuthHeader,
}

/// Opaque bearer secret. Never printed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token {
    secret: String,
    source: TokenSource,
}

impl Token {
    pub fn new(secret: impl Into<String>, source: TokenSource) -> Self {
        Self {
            secret: secret.into(),
            source,
        }
    }

    /// Extract a token from an `Authorization` header value.
    ///
    /// `Bearer <token>` carries the token directly; `Basic` carries it as the
    /// password of `user:password`. Anything else yields no token.
    pub fn from_authorization(header: &str) -> Option<Self> {
        let secret = if let Some(token) = header.strip_prefix("Bearer ") {
            token.trim().to_string()
        } else if let Some(encoded) = header.strip_prefix("Basic ") {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .ok()?;
            let decoded = String::from_utf8(decoded).ok()?;
            match decoded.find(':') {
                Some(p) => decoded[p + 1..].to_string(),
                None => decoded,
            }
        } else {
            return None;
        };

        (!secret.is_empty()).then(|| Self::new(secret, TokenSource::AuthHeader))
    }

    /// Token from the `accessKey` query parameter.
    pub fn from_access_key(value: &str) -> Option<Self> {
        (!value.is_empty()).then(|| Self::new(value, TokenSource::AccessKey))
    }

    /// Resolve the token for a request: the query parameter wins over the header.
    pub fn from_request(access_key: Option<&str>, authorization: Option<&str>) -> Option<Self> {
        match access_key {
            Some(value) => Self::from_access_key(value),
            None => authorization.and_then(Self::from_authorization),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}
