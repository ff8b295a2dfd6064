//! End-to-end tests for `srcstrap build`

use super::Workspace;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;

const CACHED_DEMO: &str = r#"
[[package]]
name = "demo"
url = "http://downloads.example.invalid/demo-1.0.tar.gz"
commands = [
    "echo configured > configured.txt",
    ["sh", "-c", "echo %(GREETING)s > greeting.txt"],
]

[package.settings]
GREETING = "hello"
"#;

#[cfg(unix)]
#[test]
fn build_runs_commands_in_source_dir() {
    let ws = Workspace::new(CACHED_DEMO);
    fs::write(ws.path("downloads/demo-1.0.tar.gz"), b"not used").unwrap();
    fs::create_dir_all(ws.path("code/demo-1.0")).unwrap();

    ws.srcstrap()
        .args(["build", "demo"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(
        fs::read_to_string(ws.path("code/demo-1.0/configured.txt")).unwrap(),
        "configured\n"
    );
    assert_eq!(
        fs::read_to_string(ws.path("code/demo-1.0/greeting.txt")).unwrap(),
        "hello\n"
    );
    assert!(ws.path("local").is_dir());
}

#[cfg(unix)]
#[test]
fn set_overrides_catalog_settings() {
    let ws = Workspace::new(CACHED_DEMO);
    fs::write(ws.path("downloads/demo-1.0.tar.gz"), b"not used").unwrap();
    fs::create_dir_all(ws.path("code/demo-1.0")).unwrap();

    ws.srcstrap()
        .args(["build", "demo", "--set", "GREETING=bonjour"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(ws.path("code/demo-1.0/greeting.txt")).unwrap(),
        "bonjour\n"
    );
}

#[cfg(unix)]
#[test]
fn build_extracts_patches_and_builds() {
    let ws = Workspace::new(
        r#"
[[package]]
name = "log4cpp"
url = "http://downloads.example.invalid/log4cpp-1.1.2rc1.tar.gz?r=mirror"
source_dir = "log4cpp"
commands = ["grep -c '^/\\*#define int64_t __int64\\*/$' include/config-win32.h > count.txt"]

[[package.patch]]
file = "include/config-win32.h"
rules = [
    { pattern = '^#define int64_t __int64$', replacement = '/*#define int64_t __int64*/' },
]
"#,
    );

    // A release tarball whose top-level directory is not the archive stem.
    let staging = ws.path("staging");
    fs::create_dir_all(staging.join("log4cpp/include")).unwrap();
    fs::write(
        staging.join("log4cpp/include/config-win32.h"),
        "#define int64_t __int64\n#define X 1\n",
    )
    .unwrap();
    let status = std::process::Command::new("tar")
        .arg("-czf")
        .arg(ws.path("downloads/log4cpp-1.1.2rc1.tar.gz"))
        .arg("-C")
        .arg(&staging)
        .arg("log4cpp")
        .status()
        .unwrap();
    assert!(status.success());

    ws.srcstrap()
        .args(["build", "log4cpp"])
        .assert()
        .success()
        .stderr(predicate::str::contains("extracting"));

    let header = ws.path("code/log4cpp/include/config-win32.h");
    assert_eq!(
        fs::read_to_string(&header).unwrap(),
        "/*#define int64_t __int64*/\n#define X 1\n"
    );
    assert_eq!(
        fs::read_to_string(ws.path("code/log4cpp/include/config-win32.h.orig")).unwrap(),
        "#define int64_t __int64\n#define X 1\n"
    );
    assert_eq!(
        fs::read_to_string(ws.path("code/log4cpp/count.txt")).unwrap(),
        "1\n"
    );

    // A second run finds everything in place and leaves the patch alone.
    ws.srcstrap()
        .args(["build", "log4cpp"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(
        fs::read_to_string(&header).unwrap(),
        "/*#define int64_t __int64*/\n#define X 1\n"
    );
}

#[test]
fn installer_is_only_downloaded() {
    let ws = Workspace::new(
        r#"
[[package]]
name = "7zip"
url = "http://www.7-zip.org/a/7z1514.exe"
"#,
    );
    fs::write(ws.path("downloads/7z1514.exe"), b"MZ").unwrap();

    ws.srcstrap()
        .args(["build", "7zip"])
        .assert()
        .success()
        .stderr(predicate::str::contains("run it manually"));
    assert!(!ws.path("code/7z1514").exists());
}

#[test]
fn build_creates_missing_tools_root() {
    let ws = Workspace::new("");
    fs::remove_dir_all(ws.path("tools")).unwrap();

    ws.srcstrap()
        .args(["build", "nothing-here"])
        .assert()
        .success();
    assert!(ws.path("tools").is_dir());
    assert!(ws.root().join("code").is_dir());
}
