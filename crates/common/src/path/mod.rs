mod matcher;
mod valid;

pub use matcher::{PathMatcher, PathPredicate};
pub use valid::{file_name, normalize, valid_path};
