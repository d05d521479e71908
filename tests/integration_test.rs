use predicates::prelude::*;
use std::fs;


use test_utils::{PackFile, TestPack};

// ============================================================================
// Install and update
// ============================================================================

#[test]
fn test_fresh_install() {
    let mut pack = TestPack::new();
    let files = [
        PackFile::new("./", "README.md", "readme"),
        PackFile::new("./mods/", "a.jar", "a-v1"),
    ];
    for file in &files {
        pack.host(file);
    }
    let manifest = pack.write_manifest("1.0.0", &files);

    pack.install_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Downloaded 2 successful, 0 failed, 0 incomplete.",
        ))
        .stdout(predicate::str::contains("Installed 1.0.0"));

    assert_eq!(pack.read_installed("README.md"), "readme");
    assert_eq!(pack.read_installed("mods/a.jar"), "a-v1");
    assert_eq!(pack.read_installed("version.json"), manifest);
}

#[test]
fn test_update_changes_adds_and_removes_files() {
    let mut pack = TestPack::new();
    let v1 = [
        PackFile::new("./mods/", "a.jar", "a-v1"),
        PackFile::new("./config/old/", "x.cfg", "x"),
        PackFile::new("./", "README.md", "readme"),
    ];
    for file in &v1 {
        pack.host(file);
    }
    pack.write_manifest("1.0.0", &v1);
    pack.install_cmd().assert().success();
    assert!(pack.installed("config/old/x.cfg").exists());

    // mods/a.jar changes content, mods/b.jar is added, config/old/x.cfg is dropped
    pack.unhost_all();
    let v2 = [
        PackFile::new("./mods/", "a.jar", "a-v2"),
        PackFile::new("./mods/", "b.jar", "b"),
        PackFile::new("./", "README.md", "readme"),
    ];
    for file in &v2[..2] {
        pack.host(file);
    }
    let manifest = pack.write_manifest("1.1.0", &v2);

    pack.install_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "This install has 1 files changed, 1 new files and 1 deleted files",
        ))
        .stdout(predicate::str::contains("Downloaded 2 successful"));

    assert_eq!(pack.read_installed("mods/a.jar"), "a-v2");
    assert_eq!(pack.read_installed("mods/b.jar"), "b");
    assert!(!pack.installed("config/old/x.cfg").exists());
    assert!(!pack.installed("config").exists(), "emptied directories are removed");
    assert_eq!(pack.read_installed("version.json"), manifest);
}

#[test]
fn test_update_with_integrity_restores_modified_file() {
    let mut pack = TestPack::new();
    let files = [PackFile::new("./config/", "server.cfg", "original")];
    pack.host(&files[0]);
    pack.write_manifest("1.0.0", &files);
    pack.install_cmd().assert().success();

    fs::write(pack.installed("config/server.cfg"), "edited by hand").unwrap();

    // Same manifest again: only the integrity check notices the edit, and
    // --auto accepts the default of overwriting it.
    pack.install_cmd()
        .arg("--integrity")
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded 1 successful"));

    assert_eq!(pack.read_installed("config/server.cfg"), "original");
}

#[test]
fn test_failed_download_is_reported() {
    let mut pack = TestPack::new();
    let hosted = PackFile::new("./mods/", "a.jar", "a");
    pack.host(&hosted);
    pack.write_manifest(
        "1.0.0",
        &[hosted, PackFile::new("./mods/", "missing.jar", "never served")],
    );

    pack.install_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Downloaded 1 successful, 1 failed, 0 incomplete.",
        ));
}

#[test]
fn test_invalid_manifest_fails_before_any_change() {
    let pack = TestPack::new();
    fs::write(&pack.manifest_path, "{ this is not json").unwrap();

    pack.install_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid manifest"));

    assert!(!pack.installed("version.json").exists());
}

#[test]
fn test_duplicate_paths_are_rejected() {
    let pack = TestPack::new();
    pack.write_manifest(
        "1.0.0",
        &[
            PackFile::new("./mods/", "a.jar", "one"),
            PackFile::new("mods", "a.jar", "two"),
        ],
    );

    pack.install_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate path 'mods/a.jar'"));
}

#[test]
fn test_install_requires_a_source() {
    let pack = TestPack::new();
    pack.cmd()
        .arg("install")
        .arg("--path")
        .arg(&pack.root)
        .assert()
        .failure();
}

// ============================================================================
// Verify and plan
// ============================================================================

#[test]
fn test_verify_detects_drift() {
    let mut pack = TestPack::new();
    let files = [
        PackFile::new("./mods/", "a.jar", "a"),
        PackFile::new("./mods/", "b.jar", "b"),
    ];
    for file in &files {
        pack.host(file);
    }
    pack.write_manifest("1.0.0", &files);
    pack.install_cmd().assert().success();

    pack.cmd()
        .arg("verify")
        .arg("--path")
        .arg(&pack.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("All files verified"));

    fs::write(pack.installed("mods/a.jar"), "tampered").unwrap();
    fs::remove_file(pack.installed("mods/b.jar")).unwrap();

    pack.cmd()
        .arg("verify")
        .arg("--path")
        .arg(&pack.root)
        .assert()
        .failure()
        .stdout(predicate::str::contains("modified: mods/a.jar"))
        .stdout(predicate::str::contains("missing:  mods/b.jar"));
}

#[test]
fn test_plan_is_a_dry_run() {
    let mut pack = TestPack::new();
    let v1 = [PackFile::new("./mods/", "a.jar", "a")];
    pack.host(&v1[0]);
    pack.write_manifest("1.0.0", &v1);
    pack.install_cmd().assert().success();

    pack.write_manifest("1.1.0", &[PackFile::new("./mods/", "b.jar", "b")]);

    pack.cmd()
        .arg("plan")
        .arg("--path")
        .arg(&pack.root)
        .arg("--localpack")
        .arg(&pack.manifest_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("+ mods/b.jar"))
        .stdout(predicate::str::contains("- mods/a.jar"));

    assert!(pack.installed("mods/a.jar").exists());
    assert!(!pack.installed("mods/b.jar").exists());
}

// ============================================================================
// Config and completions
// ============================================================================

#[test]
fn test_config_set_and_show() {
    let pack = TestPack::new();

    pack.cmd()
        .args(["config", "set", "download.threads", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration saved"));

    let saved = fs::read_to_string(pack.config_dir.join("config.toml")).unwrap();
    assert!(saved.contains("threads = 3"));

    pack.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Threads:"))
        .stdout(predicate::str::contains("3"));
}

#[test]
fn test_config_set_unknown_key() {
    let pack = TestPack::new();
    pack.cmd()
        .args(["config", "set", "registry.url", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_completions() {
    let pack = TestPack::new();
    pack.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("serverpack"));
}
