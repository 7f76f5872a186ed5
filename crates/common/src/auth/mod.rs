mod cache;
mod credential;
mod gate;
mod identity;
mod role;
mod settings;
mod token;
mod validator;

pub use cache::CredentialCache;
pub use credential::{Credential, Identity};
pub use gate::{AccessGate, Decision};
pub use identity::{HttpIdentityService, IdentityError, IdentityRecord, IdentityService};
pub use role::Role;
pub use settings::{GlobList, KeySettings};
pub use token::{Token, TokenSource};
pub use validator::TokenValidator;
