/**
 * Token handling, credential caching and
 *  role/path based authorization.
 */
pub mod auth;
/**
 * Zip archives stored in the bucket, presented
 *  as browsable sub-trees via ranged reads.
 */
pub mod archive;
/**
 * Delete, copy, export and upload over a
 *  selection of paths.
 */
pub mod bulk;
pub mod config;
pub mod error;
/**
 * Glob based path predicates and the rules
 *  for which paths bulk operations may touch.
 */
pub mod path;
/**
 * The collaborator-facing facade tying
 *  authorization to storage operations.
 */
pub mod registry;
pub mod search;
/**
 * Path oriented adapter over the key/value
 *  backend: listing, streaming, batched deletes.
 */
pub mod store;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use registry::Registry;

pub mod prelude {
    pub use crate::auth::{Credential, Decision, Role, Token};
    pub use crate::bulk::{BulkReport, Selection};
    pub use crate::config::RegistryConfig;
    pub use crate::error::{RegistryError, Result};
    pub use crate::registry::Registry;
    pub use crate::store::{Entry, EntryStream, ListMode};
}
