//! Token validation and authorization through the registry facade
mod common;

use ::common::auth::{Role, Token, TokenSource};
use ::common::prelude::*;
use crate::common::{body, key_record, ScriptedIdentity, TestRegistry};

#[tokio::test]
async fn test_unknown_token_is_denied_and_cached() {
    let t = TestRegistry::standard();

    let first = t.credential("never-issued").await;
    assert_eq!(first.role(), Role::None);
    assert_eq!(t.identity.calls(), 1);

    let second = t.credential("never-issued").await;
    assert_eq!(second.role(), Role::None);
    assert_eq!(t.identity.calls(), 1, "second lookup must come from the cache");
}

#[tokio::test]
async fn test_owner_token_needs_no_lookup() {
    let t = TestRegistry::standard();

    let owner = t.owner().await;
    assert_eq!(owner.role(), Role::Owner);
    assert_eq!(t.identity.calls(), 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let t = TestRegistry::standard();

    let err = t.registry.authenticate(None).await.unwrap_err();
    assert!(matches!(err, RegistryError::Unauthenticated));

    let empty = Token::new("", TokenSource::AccessKey);
    let err = t.registry.authenticate(Some(&empty)).await.unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_role_hierarchy() {
    let t = TestRegistry::standard();
    let writer = t.credential("writer").await;
    let reader = t.credential("reader").await;

    assert_eq!(
        t.registry.authorize(Some(writer.as_ref()), Role::Reader, "docs/a.md"),
        Decision::Allow
    );
    assert_eq!(
        t.registry.authorize(Some(reader.as_ref()), Role::Writer, "docs/a.md"),
        Decision::Forbidden
    );
    assert_eq!(
        t.registry.authorize(None, Role::Reader, "docs/a.md"),
        Decision::Unauthenticated
    );
}

#[tokio::test]
async fn test_scoped_key() {
    let t = TestRegistry::standard();
    let maven = t.credential("maven").await;

    assert!(t
        .registry
        .authorize(Some(maven.as_ref()), Role::Writer, "/maven/com/acme/a.jar")
        .is_allowed());
    assert!(t
        .registry
        .authorize(Some(maven.as_ref()), Role::Reader, "maven/")
        .is_allowed());
    assert_eq!(
        t.registry.authorize(Some(maven.as_ref()), Role::Reader, "nuget/a.nupkg"),
        Decision::Forbidden
    );

    let err = t
        .registry
        .put("nuget/a.nupkg", body(b"x"), None, &maven)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Forbidden));
}

#[tokio::test]
async fn test_foreign_and_locked_keys_grant_nothing() {
    let mut locked = key_record("ApiKey-l", Some(r#"{"role":"writer"}"#));
    locked.locked = true;
    let mut foreign = key_record("ApiKey-f", Some(r#"{"role":"writer"}"#));
    foreign.iam_id = "iam-ServiceId-other".to_string();

    let t = TestRegistry::new(
        ScriptedIdentity::default()
            .with_key("locked", locked)
            .with_key("foreign", foreign),
    );

    for secret in ["locked", "foreign"] {
        let credential = t.credential(secret).await;
        assert_eq!(credential.role(), Role::None);
        assert_eq!(
            t.registry.authorize(Some(credential.as_ref()), Role::Reader, "a"),
            Decision::Forbidden
        );
    }
}

#[tokio::test]
async fn test_reader_cannot_write() {
    let t = TestRegistry::standard();
    let reader = t.credential("reader").await;

    let err = t
        .registry
        .put("docs/a.md", body(b"# a"), None, &reader)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}
