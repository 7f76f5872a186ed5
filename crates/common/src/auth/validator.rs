use std::sync::Arc;

use chrono::{Duration, Utc};

use super::cache::CredentialCache;
use super::credential::{Credential, Identity};
use super::identity::{IdentityRecord, IdentityService};
use super::role::Role;
use super::settings::KeySettings;
use super::token::Token;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::path::PathPredicate;

/// Turns tokens into credentials.
///
/// Lookups for the same uncached token are not coalesced: two concurrent
/// requests may both call the identity service. The second result simply
/// overwrites the first in the cache.
#[derive(Clone)]
pub struct TokenValidator {
    identity: Arc<dyn IdentityService>,
    cache: CredentialCache,
    owner_token: Option<String>,
    resource_iam_id: String,
    ttl: Duration,
}

impl TokenValidator {
    pub fn new(config: &RegistryConfig, identity: Arc<dyn IdentityService>) -> Self {
        let ttl =
            Duration::from_std(config.auth_cache.ttl()).unwrap_or_else(|_| Duration::minutes(10));
        Self {
            identity,
            cache: CredentialCache::new(&config.auth_cache),
            owner_token: config.owner_token.clone().filter(|t| !t.is_empty()),
            resource_iam_id: config.identity.resource_iam_id.clone(),
            ttl,
        }
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Validate a token.
    ///
    /// Fails with `Unauthenticated` only when no usable token was presented.
    /// Unknown, locked or foreign keys produce a `Role::None` credential.
    pub async fn validate(&self, token: Option<&Token>) -> Result<Arc<Credential>> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(RegistryError::Unauthenticated),
        };
        let expires_at = Utc::now() + self.ttl;

        if self.owner_token.as_deref() == Some(token.secret()) {
            return Ok(Arc::new(Credential::new(
                Role::Owner,
                PathPredicate::allow_all(),
                token.clone(),
                None,
                expires_at,
            )));
        }

        if let Some(credential) = self.cache.get(token.secret()) {
            return Ok(credential);
        }

        let record = self
            .identity
            .lookup(token)
            .await
            .map_err(|e| RegistryError::Identity(e.to_string()))?;

        let credential = Arc::new(self.derive(token, record, expires_at));
        tracing::debug!(
            role = %credential.role(),
            identity = ?credential.identity().map(|i| &i.id),
            "validated token"
        );
        self.cache.insert(token.secret(), credential.clone());

        Ok(credential)
    }

    fn derive(
        &self,
        token: &Token,
        record: Option<IdentityRecord>,
        expires_at: chrono::DateTime<Utc>,
    ) -> Credential {
        let Some(record) = record else {
            return Credential::denied(token.clone(), None, expires_at);
        };

        let identity = Identity {
            id: record.id.clone(),
            name: record.name.clone(),
        };

        if record.locked || record.disabled || record.iam_id != self.resource_iam_id {
            tracing::debug!(
                id = %record.id,
                locked = record.locked,
                disabled = record.disabled,
                "key not usable for this registry"
            );
            return Credential::denied(token.clone(), Some(identity), expires_at);
        }

        let settings = KeySettings::parse(record.description.as_deref());
        Credential::new(
            settings.role(),
            settings.predicate(),
            token.clone(),
            Some(identity),
            expires_at,
        )
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("cache", &self.cache)
            .field("resource_iam_id", &self.resource_iam_id)
            .finish()
    }
}
