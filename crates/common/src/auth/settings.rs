//! Per-key settings carried as JSON in the identity record's free-form
//! description, e.g.
//!
//! ```json
//! { "role": "writer", "include": ["maven/**", "nuget/**"], "exclude": "maven/private/**" }
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::role::Role;
use crate::path::PathPredicate;

/// A glob or list of globs. Non-string list items are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobList(Vec<String>);

impl GlobList {
    pub fn patterns(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for GlobList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let patterns = match Value::deserialize(deserializer)? {
            Value::String(pattern) => vec![pattern],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(pattern) => Some(pattern),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self(patterns))
    }
}

/// Settings attached to an API key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeySettings {
    /// Requested role; only `reader` and `writer` are grantable
    #[serde(default)]
    role: Option<Value>,
    #[serde(default)]
    pub include: GlobList,
    #[serde(default)]
    pub exclude: GlobList,
}

impl KeySettings {
    /// Parse the description text of an identity record.
    ///
    /// Missing or blank text yields the defaults. Text that is not a JSON
    /// object is logged and also yields the defaults.
    pub fn parse(description: Option<&str>) -> Self {
        let Some(text) = description.filter(|text| !text.trim().is_empty()) else {
            return Self::default();
        };

        let value = match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                tracing::warn!("key settings are not a JSON object, using defaults");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed key settings, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_value(value) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "malformed key settings, using defaults");
                Self::default()
            }
        }
    }

    /// The role these settings grant.
    pub fn role(&self) -> Role {
        match &self.role {
            None | Some(Value::Null) => Role::Reader,
            Some(Value::String(role)) if role == "reader" => Role::Reader,
            Some(Value::String(role)) if role == "writer" => Role::Writer,
            Some(other) => {
                tracing::debug!(role = %other, "key settings request an ungrantable role");
                Role::None
            }
        }
    }

    /// Compile the include/exclude rules.
    pub fn predicate(&self) -> PathPredicate {
        PathPredicate::build(self.include.patterns(), self.exclude.patterns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_description() {
        let settings = KeySettings::parse(None);
        assert_eq!(settings.role(), Role::Reader);
        assert!(settings.predicate().is_allow_all());

        let settings = KeySettings::parse(Some("   "));
        assert_eq!(settings.role(), Role::Reader);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let settings = KeySettings::parse(Some("deploy key for CI"));
        assert_eq!(settings.role(), Role::Reader);
        assert!(settings.predicate().is_allow_all());

        let settings = KeySettings::parse(Some("[1, 2]"));
        assert_eq!(settings.role(), Role::Reader);
    }

    #[test]
    fn test_arrays_grant_nothing_extra() {
        for text in [r#"["writer"]"#, r#"["writer", ["**"], []]"#, "\"writer\"", "7"] {
            let settings = KeySettings::parse(Some(text));
            assert_eq!(settings.role(), Role::Reader, "description {}", text);
            assert!(settings.predicate().is_allow_all(), "description {}", text);
        }
    }

    #[test]
    fn test_roles() {
        assert_eq!(
            KeySettings::parse(Some(r#"{"role": "writer"}"#)).role(),
            Role::Writer
        );
        assert_eq!(
            KeySettings::parse(Some(r#"{"role": "reader"}"#)).role(),
            Role::Reader
        );
        assert_eq!(
            KeySettings::parse(Some(r#"{"role": "owner"}"#)).role(),
            Role::None
        );
        assert_eq!(KeySettings::parse(Some(r#"{"role": 7}"#)).role(), Role::None);
    }

    #[test]
    fn test_glob_lists() {
        let settings = KeySettings::parse(Some(
            r#"{"include": ["a/**", 5, null, "b/*"], "exclude": "a/secret"}"#,
        ));
        assert_eq!(settings.include.patterns(), &["a/**", "b/*"]);
        assert_eq!(settings.exclude.patterns(), &["a/secret"]);

        let predicate = settings.predicate();
        assert!(predicate.matches("a/x/y"));
        assert!(predicate.matches("b/z"));
        assert!(!predicate.matches("a/secret"));
        assert!(!predicate.matches("c/z"));
    }

    #[test]
    fn test_non_list_globs_are_ignored() {
        let settings = KeySettings::parse(Some(r#"{"include": {"x": 1}, "exclude": 3}"#));
        assert!(settings.predicate().is_allow_all());
    }
}
