//! Integration tests for mapping-history cache keys against real git.

use std::path::Path;
use std::process::Command;

use buildtools_core::{derive_cache_key, BuildError, CacheKey, Repository, VersionInfo};

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit_file(dir: &Path, file: &str, content: &str) -> String {
    let path = dir.join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "-q", "-m", &format!("update {file}")]);
    git(dir, &["rev-parse", "HEAD"])
}

fn init_build_data() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q", "-b", "master"]);
    git(dir.path(), &["config", "user.name", "test-user"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    dir
}

#[tokio::test]
async fn test_key_follows_latest_mapping_commit() {
    let dir = init_build_data();
    let info = VersionInfo::default();
    let paths = info.governed_paths();

    commit_file(dir.path(), "mappings/bukkit-1.8.at", "public net/minecraft/server/Foo\n");
    let mapping_commit = commit_file(dir.path(), "mappings/bukkit-1.8-cl.csrg", "a Foo\n");

    let repo = Repository::open(dir.path()).await.unwrap();
    let key = derive_cache_key(&repo, &paths).await.unwrap();
    assert_eq!(key, CacheKey::from_commit_ids([&mapping_commit]).unwrap());

    // Commits outside the governed files leave the key alone.
    commit_file(dir.path(), "README.md", "docs\n");
    let unchanged = derive_cache_key(&repo, &paths).await.unwrap();
    assert_eq!(unchanged, key);

    // Any governed file moves it.
    let package_commit = commit_file(dir.path(), "mappings/package.srg", "PK: ./ net/minecraft/server\n");
    let changed = derive_cache_key(&repo, &paths).await.unwrap();
    assert_ne!(changed, key);
    assert_eq!(changed, CacheKey::from_commit_ids([&package_commit]).unwrap());
}

#[tokio::test]
async fn test_missing_history_is_fatal() {
    let dir = init_build_data();
    commit_file(dir.path(), "README.md", "no mappings here\n");

    let repo = Repository::open(dir.path()).await.unwrap();
    let err = derive_cache_key(&repo, &VersionInfo::default().governed_paths())
        .await
        .unwrap_err();
    assert!(
        matches!(err, BuildError::NoMappingHistory { .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_version_info_selects_governed_files() {
    let dir = init_build_data();
    std::fs::write(
        dir.path().join("info.json"),
        r#"{
            "minecraftVersion": "1.8.3",
            "accessTransforms": "bukkit-1.8.3.at",
            "classMappings": "bukkit-1.8.3-cl.csrg",
            "memberMappings": "bukkit-1.8.3-members.csrg",
            "packageMappings": "package.srg"
        }"#,
    )
    .unwrap();
    let old_layout = commit_file(dir.path(), "mappings/bukkit-1.8-cl.csrg", "a Foo\n");
    let new_layout = commit_file(dir.path(), "mappings/bukkit-1.8.3-cl.csrg", "a Foo\n");
    commit_file(dir.path(), "mappings/bukkit-1.8-cl.csrg", "a Bar\n");

    let info = VersionInfo::load_or_default(dir.path()).unwrap();
    assert_eq!(info.minecraft_version, "1.8.3");

    let repo = Repository::open(dir.path()).await.unwrap();
    let key = derive_cache_key(&repo, &info.governed_paths()).await.unwrap();
    assert_eq!(key, CacheKey::from_commit_ids([&new_layout]).unwrap());
    assert_ne!(key, CacheKey::from_commit_ids([&old_layout]).unwrap());
}
