use super::credential::Credential;
use super::role::Role;
use crate::error::{RegistryError, Result};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No token was presented; answer with an authentication challenge
    Unauthenticated,
    /// A token was presented but it does not cover the request
    Forbidden,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Unauthenticated => Err(RegistryError::Unauthenticated),
            Decision::Forbidden => Err(RegistryError::Forbidden),
        }
    }
}

/// Per-operation authorization: role hierarchy plus path predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    pub fn authorize(credential: Option<&Credential>, required: Role, path: &str) -> Decision {
        let Some(credential) = credential else {
            return Decision::Unauthenticated;
        };

        if !credential.role().satisfies(required) {
            return Decision::Forbidden;
        }

        let allowed = if path.ends_with('/') {
            credential.predicate().matches_dir(path)
        } else {
            credential.allows(path)
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Forbidden
        }
    }
}
