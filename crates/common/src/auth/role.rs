use serde::{Deserialize, Serialize};

/// Access level granted by a credential.
///
/// Roles are totally ordered: `None < Reader < Writer < Owner`, so a
/// requirement is met by any role at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// No access; a token was presented but grants nothing
    None,
    /// List and read objects
    Reader,
    /// Reader plus put, delete and copy
    Writer,
    /// The registry's own secret; bypasses path rules
    Owner,
}

impl Role {
    /// Whether this role meets `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::None => write!(f, "none"),
            Role::Reader => write!(f, "reader"),
            Role::Writer => write!(f, "writer"),
            Role::Owner => write!(f, "owner"),
        }
    }
}
