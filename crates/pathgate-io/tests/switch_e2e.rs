//! End-to-end tests through [`GatewaySwitch`].
//!
//! Both backends sit behind one switch: a local gateway over a temp
//! directory and a SAF gateway over an in-memory document provider with a
//! single persisted grant on `primary:`.

use std::sync::Arc;

use futures::TryStreamExt;
use pathgate_io::{
    APathGateway, GatewayError, GatewayExt, GatewaySwitch, LocalConfig, LocalGateway,
    MemoryDocumentProvider, MemoryPermissionStore, SafConfig, SafGateway, UriPermission,
    match_permission,
};
use pathgate_types::{APath, APathLookup, FileType, LocalPath, SafPath, segs};
use tempfile::TempDir;

const AUTHORITY: &str = "com.android.externalstorage.documents";

// ============================================================================
// Shared test setup
// ============================================================================

struct Fixture {
    switch: GatewaySwitch,
    provider: MemoryDocumentProvider,
    local_root: APath,
    saf_root: APath,
    _dir: TempDir,
}

fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let provider = MemoryDocumentProvider::new(AUTHORITY);
    provider.insert_dir("primary:");
    let tree = provider.tree("primary:").unwrap();
    let store = MemoryPermissionStore::new().with_grant(UriPermission::full(tree.clone()));

    let saf = SafGateway::new(
        Arc::new(provider.clone()),
        Arc::new(store),
        SafConfig::default(),
    );
    let switch = GatewaySwitch::new()
        .with_local(LocalGateway::new(LocalConfig::default()))
        .with_saf(saf);

    Fixture {
        switch,
        provider,
        local_root: LocalPath::new(dir.path()).into(),
        saf_root: SafPath::new(tree, Vec::new()).into(),
        _dir: dir,
    }
}

async fn walk_names(switch: &GatewaySwitch, start: APath) -> Vec<(String, FileType)> {
    let found: Vec<APathLookup> = switch.walk(start).into_stream().try_collect().await.unwrap();
    found
        .into_iter()
        .map(|l| (l.lookedup.name(), l.file_type))
        .collect()
}

// ============================================================================
// Local backend
// ============================================================================

#[tokio::test]
async fn test_create_dir_then_lookup() {
    let fx = setup();
    let path = fx.local_root.child(["sdcard", "test"]);

    assert!(fx.switch.create_dir(&path).await.unwrap());
    assert!(fx.switch.exists(&path).await.unwrap());

    let lookup = fx.switch.lookup(&path).await.unwrap();
    assert_eq!(lookup.file_type, FileType::Directory);
    assert_eq!(lookup.lookedup, path);
}

#[tokio::test]
async fn test_local_walk_emits_directory_first() {
    let fx = setup();
    let sub = fx.local_root.child(["sub"]);
    fx.switch.create_file(&sub.child(["one"])).await.unwrap();
    fx.switch.create_file(&sub.child(["two"])).await.unwrap();

    let found = walk_names(&fx.switch, fx.local_root.clone()).await;
    assert_eq!(
        found,
        vec![
            ("sub".to_string(), FileType::Directory),
            ("one".to_string(), FileType::File),
            ("two".to_string(), FileType::File),
        ]
    );
}

#[tokio::test]
async fn test_local_content_roundtrip_and_delete_all() {
    let fx = setup();
    let file = fx.local_root.child(["notes", "today.txt"]);

    fx.switch.write_all(&file, b"remember the milk").await.unwrap();
    assert_eq!(fx.switch.read_all(&file).await.unwrap(), b"remember the milk");
    assert_eq!(fx.switch.lookup(&file).await.unwrap().size, 17);

    let notes = fx.local_root.child(["notes"]);
    assert!(fx.switch.delete_all(&notes, None).await.unwrap());
    assert!(!fx.switch.exists(&notes).await.unwrap());
}

// ============================================================================
// SAF backend
// ============================================================================

#[tokio::test]
async fn test_saf_write_creates_missing_parents() {
    let fx = setup();
    let file = fx.saf_root.child(["Music", "mix.txt"]);

    fx.switch.write_all(&file, b"track list").await.unwrap();

    let music = fx.provider.document("primary:Music").unwrap();
    assert!(music.is_directory());
    assert_eq!(fx.provider.content("primary:Music/mix.txt").unwrap(), b"track list");
    assert_eq!(fx.switch.read_all(&file).await.unwrap(), b"track list");
}

#[tokio::test]
async fn test_saf_walk_matches_local_walk() {
    let fx = setup();
    fx.provider.insert_dir("primary:sub");
    fx.provider.insert_file("primary:sub/one", "1");
    fx.provider.insert_file("primary:sub/two", "2");

    let local_sub = fx.local_root.child(["sub"]);
    fx.switch.create_file(&local_sub.child(["one"])).await.unwrap();
    fx.switch.create_file(&local_sub.child(["two"])).await.unwrap();

    let saf = walk_names(&fx.switch, fx.saf_root.clone()).await;
    let local = walk_names(&fx.switch, fx.local_root.clone()).await;
    assert_eq!(saf, local);
}

#[tokio::test]
async fn test_nested_path_reports_missing_segments() {
    let fx = setup();
    let target = SafPath::build(
        fx.saf_root.as_saf().unwrap().tree_root().as_str(),
        ["Android", "data", "com.app", "files"],
    )
    .unwrap();

    let grants = fx.switch.saf_gateway().unwrap().permissions().await;
    let matched = match_permission(&grants, &target).unwrap();
    assert_eq!(matched.missing, segs(["Android", "data", "com.app", "files"]));

    let target: APath = target.into();
    assert!(fx.switch.create_dir(&target).await.unwrap());
    assert!(fx.provider.document("primary:Android/data/com.app/files").is_some());
}

#[tokio::test]
async fn test_released_grant_blocks_access() {
    let fx = setup();
    let docs = fx.saf_root.child(["docs"]);
    fx.switch.create_dir(&docs).await.unwrap();

    fx.switch.release_resources(&docs).await.unwrap();

    assert!(!fx.switch.can_read(&docs).await.unwrap());
    let err = fx.switch.lookup(&docs).await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingCapabilityGrant { .. }));
}

#[tokio::test]
async fn test_saf_du_through_switch() {
    let fx = setup();
    fx.provider.insert_dir("primary:Music");
    fx.provider.insert_file("primary:Music/a.mp3", "abc");
    fx.provider.insert_dir("primary:Music/live");
    fx.provider.insert_file("primary:Music/live/b.mp3", "de");

    assert_eq!(fx.switch.du(&fx.saf_root.child(["Music"])).await.unwrap(), 5);
    assert_eq!(fx.switch.du(&fx.saf_root.child(["Music", "a.mp3"])).await.unwrap(), 3);
}

// ============================================================================
// Cross-variant behaviour
// ============================================================================

#[tokio::test]
async fn test_lookup_serializes_with_path_type() {
    let fx = setup();
    let file = fx.saf_root.child(["a.txt"]);
    fx.switch.create_file(&file).await.unwrap();

    let lookup = fx.switch.lookup(&file).await.unwrap();
    let json = serde_json::to_value(&lookup).unwrap();
    assert_eq!(json["lookedup"]["pathType"], "SAF");
    assert_eq!(json["fileType"], "FILE");

    let back: APathLookup = serde_json::from_value(json).unwrap();
    assert_eq!(back, lookup);
}

#[tokio::test]
async fn test_symlink_across_backends_is_rejected() {
    let fx = setup();
    let link = fx.local_root.child(["link"]);
    let target = fx.saf_root.child(["target"]);

    let err = fx.switch.create_symlink(&link, &target).await.unwrap_err();
    assert!(matches!(err, GatewayError::ArgumentMismatch(_)));
    assert!(!fx.switch.exists(&link).await.unwrap());
}
