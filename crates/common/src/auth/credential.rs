use chrono::{DateTime, Utc};

use super::role::Role;
use super::token::{Token, TokenSource};
use crate::path::PathPredicate;

/// Identity details kept on a credential for display and auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: Option<String>,
}

/// A validated token: its role and the paths it may touch.
///
/// Built once by the validator and shared; never mutated afterwards.
#[derive(Clone)]
pub struct Credential {
    role: Role,
    predicate: PathPredicate,
    token: Token,
    identity: Option<Identity>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        role: Role,
        predicate: PathPredicate,
        token: Token,
        identity: Option<Identity>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        // Owners are never scoped by path rules
        let predicate = if role == Role::Owner {
            PathPredicate::allow_all()
        } else {
            predicate
        };

        Self {
            role,
            predicate,
            token,
            identity,
            expires_at,
        }
    }

    /// A credential for a token that grants nothing.
    pub fn denied(token: Token, identity: Option<Identity>, expires_at: DateTime<Utc>) -> Self {
        Self::new(
            Role::None,
            PathPredicate::allow_all(),
            token,
            identity,
            expires_at,
        )
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn predicate(&self) -> &PathPredicate {
        &self.predicate
    }

    /// Whether the credential's path rules allow `path`.
    pub fn allows(&self, path: &str) -> bool {
        self.predicate.matches(path)
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn source(&self) -> TokenSource {
        self.token.source()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("role", &self.role)
            .field("predicate", &self.predicate)
            .field("source", &self.token.source())
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
