//! Browsing and reading zip archives stored in the bucket
mod common;

use ::common::prelude::*;
use crate::common::{names, read_all, zip_fixture, TestRegistry};

const POM: &[u8] = b"<project>\n  <version>1.2.0</version>\n</project>\n";

async fn with_archive(files: &[(&str, &[u8])]) -> TestRegistry {
    let t = TestRegistry::standard();
    t.backend
        .seed("libs/bundle.zip", &zip_fixture(files))
        .await;
    t
}

#[tokio::test]
async fn test_archive_root_synthesizes_folders() {
    let t = with_archive(&[("x.txt", b"x"), ("y/z.txt", b"z")]).await;
    let owner = t.owner().await;

    let flat = t
        .registry
        .list("libs/bundle.zip/", ListMode::Flat, &owner)
        .await
        .unwrap();
    assert_eq!(names(flat).await, vec!["x.txt", "y/"]);

    let nested = t
        .registry
        .list("libs/bundle.zip/", ListMode::Nested, &owner)
        .await
        .unwrap();
    assert_eq!(names(nested).await, vec!["x.txt", "y/z.txt"]);

    let inner = t
        .registry
        .list("libs/bundle.zip/y/", ListMode::Flat, &owner)
        .await
        .unwrap();
    assert_eq!(names(inner).await, vec!["z.txt"]);
}

#[tokio::test]
async fn test_folder_records_are_not_duplicated() {
    let t = with_archive(&[
        ("META-INF/", b""),
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
        ("META-INF/maven/pom.xml", POM),
        ("a.class", b"\xca\xfe\xba\xbe"),
    ])
    .await;
    let owner = t.owner().await;

    let flat = t
        .registry
        .list("libs/bundle.zip/", ListMode::Flat, &owner)
        .await
        .unwrap();
    assert_eq!(names(flat).await, vec!["META-INF/", "a.class"]);
}

#[tokio::test]
async fn test_member_content_and_metadata() {
    // Index 0 is deflated, index 1 stored
    let t = with_archive(&[("META-INF/maven/pom.xml", POM), ("readme.txt", b"plain")]).await;
    let reader = t.credential("reader").await;

    let content = t
        .registry
        .get("/libs/bundle.zip/META-INF/maven/pom.xml", &reader)
        .await
        .unwrap();
    assert_eq!(content.size, Some(POM.len() as u64));
    assert_eq!(content.content_type.as_deref(), Some("text/xml"));
    assert_eq!(read_all(content.body).await, POM);

    let stored = t
        .registry
        .get("libs/bundle.zip/readme.txt", &reader)
        .await
        .unwrap();
    assert_eq!(read_all(stored.body).await, b"plain");

    let entry = t
        .registry
        .head("libs/bundle.zip/readme.txt", &reader)
        .await
        .unwrap();
    assert!(entry.is_file);
    assert!(entry.is_archive_member());
    assert_eq!(entry.name, "readme.txt");
    assert_eq!(entry.size, Some(5));
}

#[tokio::test]
async fn test_members_are_read_with_ranges() {
    let t = with_archive(&[("a.txt", b"alpha"), ("b.txt", b"beta")]).await;
    let owner = t.owner().await;

    let content = t
        .registry
        .get("libs/bundle.zip/b.txt", &owner)
        .await
        .unwrap();
    assert_eq!(read_all(content.body).await, b"beta");

    assert_eq!(t.backend.get_count(), 0, "archive must never be fetched whole");
    assert!(t.backend.range_reads() >= 3);
}

#[tokio::test]
async fn test_missing_member_and_missing_archive() {
    let t = with_archive(&[("a.txt", b"alpha")]).await;
    let owner = t.owner().await;

    let err = t
        .registry
        .get("libs/bundle.zip/nope.txt", &owner)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // No such archive: plain path handling, which finds nothing either
    let err = t
        .registry
        .get("libs/other.zip/a.txt", &owner)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let listed = t
        .registry
        .list("libs/other.zip/", ListMode::Flat, &owner)
        .await
        .unwrap();
    assert!(names(listed).await.is_empty());

    let err = t
        .registry
        .list_archive_entries("libs/other.zip", "", ListMode::Flat, &owner)
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_archive_object_itself_is_a_file() {
    let data = zip_fixture(&[("a.txt", b"alpha")]);
    let t = TestRegistry::standard();
    t.backend.seed("libs/bundle.zip", &data).await;
    let owner = t.owner().await;

    let content = t.registry.get("libs/bundle.zip", &owner).await.unwrap();
    assert_eq!(read_all(content.body).await, data);
}

#[tokio::test]
async fn test_corrupt_archive() {
    let t = TestRegistry::standard();
    t.backend.seed("libs/broken.jar", b"definitely not a zip").await;
    let owner = t.owner().await;

    let err = t
        .registry
        .list("libs/broken.jar/", ListMode::Flat, &owner)
        .await
        .err()
        .expect("corrupt archive must not list");
    assert!(matches!(err, RegistryError::InvalidArchive(_)));
}

#[tokio::test]
async fn test_member_visibility_follows_key_scope() {
    let t = TestRegistry::new(
        crate::common::ScriptedIdentity::default().with_key(
            "scoped",
            crate::common::key_record(
                "ApiKey-s",
                Some(r#"{"include":"libs/**","exclude":"libs/bundle.zip/secret/**"}"#),
            ),
        ),
    );
    t.backend
        .seed(
            "libs/bundle.zip",
            &zip_fixture(&[("public/a.txt", b"a"), ("secret/b.txt", b"b")]),
        )
        .await;
    let scoped = t.credential("scoped").await;

    let nested = t
        .registry
        .list("libs/bundle.zip/", ListMode::Nested, &scoped)
        .await
        .unwrap();
    assert_eq!(names(nested).await, vec!["public/a.txt"]);

    let err = t
        .registry
        .get("libs/bundle.zip/secret/b.txt", &scoped)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Forbidden));
}

#[tokio::test]
async fn test_directory_agrees_with_zip_reader() {
    use std::io::{Cursor, Write};

    // A long comment hides the end record from the first tail read
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    let deflated = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    writer.add_directory("docs/", stored).unwrap();
    writer.start_file("docs/guide.md", deflated).unwrap();
    writer.write_all(&b"# guide\n".repeat(300)).unwrap();
    writer.start_file("bin/tool", stored).unwrap();
    writer.write_all(&[7u8; 5000]).unwrap();
    writer.set_comment("c".repeat(8000));
    let data = writer.finish().unwrap().into_inner();

    let t = TestRegistry::standard();
    t.backend.seed("libs/commented.zip", &data).await;

    let directory = ::common::archive::ZipDirectory::read(
        &*t.backend,
        "libs/commented.zip",
        data.len() as u64,
    )
    .await
    .unwrap();
    assert_eq!(t.backend.range_reads(), 2, "tail read plus one wider read");

    let mut reference = zip::ZipArchive::new(Cursor::new(data.clone())).unwrap();
    let mut expected = Vec::new();
    for index in 0..reference.len() {
        let file = reference.by_index_raw(index).unwrap();
        expected.push((
            file.name().to_string(),
            file.compressed_size(),
            file.size(),
            file.header_start(),
            matches!(file.compression(), zip::CompressionMethod::Stored),
        ));
    }
    expected.sort();

    let actual: Vec<_> = directory
        .entries()
        .iter()
        .map(|entry| {
            (
                entry.path.clone(),
                entry.compressed_size,
                entry.uncompressed_size,
                entry.local_header_offset,
                entry.method == 0,
            )
        })
        .collect();
    assert_eq!(actual, expected);

    let owner = t.owner().await;
    let content = t
        .registry
        .get("libs/commented.zip/docs/guide.md", &owner)
        .await
        .unwrap();
    assert_eq!(read_all(content.body).await, b"# guide\n".repeat(300));
}
