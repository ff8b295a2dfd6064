//! Unit tests for command functions
//!
//! Runs the orchestrator against small in-memory catalogs with a recording
//! runner and a counting fetcher.

use super::*;
use crate::errors::BootstrapError;
use crate::testing::Host;
use rstest::*;
use std::fs;

const CATALOG: &str = r#"
[[package]]
name = "rapidee"
url = "http://www.rapidee.com/download/RapidEE_setup.exe"

[[package]]
name = "zlib"
url = "http://zlib.net/zlib-1.2.8.tar.gz"
commands = ["./configure --prefix=%(PREFIX)s", ["make", "install"]]

[package.settings]
PREFIX = "/usr/local"

[[package]]
name = "7zip"
url = "http://www.7-zip.org/a/7z1514.exe"
"#;

#[fixture]
fn registry() -> Registry {
    Registry::from_toml(CATALOG).unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[rstest]
#[tokio::test]
async fn test_unknown_name_is_skipped(registry: Registry) {
    let host = Host::new();
    let summary = build_command(&registry, &names(&["nope", "rapidee", "7zip"]), &[], &host.ctx())
        .await
        .unwrap();

    assert_eq!(summary.built, vec!["rapidee", "7zip"]);
    assert_eq!(summary.unknown, vec!["nope"]);
    assert_eq!(host.fetcher.downloads(), 2);
}

#[rstest]
#[tokio::test]
async fn test_failure_stops_remaining_packages(registry: Registry) {
    let host = Host::with_statuses(&[1]);
    let zlib = registry.lookup("zlib").unwrap();
    fs::create_dir_all(zlib.source_path(&host.layout)).unwrap();

    let err = build_command(&registry, &names(&["zlib", "rapidee"]), &[], &host.ctx())
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::CommandFailed { status: 1, .. }));
    assert_eq!(host.runner.calls().len(), 1);
    // rapidee was never fetched.
    assert_eq!(host.fetcher.downloads(), 1);
}

#[rstest]
#[tokio::test]
async fn test_overrides_apply_to_requested_packages(registry: Registry) {
    let host = Host::new();
    let zlib = registry.lookup("zlib").unwrap();
    fs::create_dir_all(zlib.source_path(&host.layout)).unwrap();

    let overrides = vec![("PREFIX".to_string(), "/opt/zlib".to_string())];
    build_command(&registry, &names(&["zlib"]), &overrides, &host.ctx())
        .await
        .unwrap();

    let calls = host.runner.calls();
    assert_eq!(calls[0].args, vec!["-c", "./configure --prefix=/opt/zlib"]);
    assert_eq!(calls[1].args, vec!["install"]);
    // The registry itself is untouched.
    assert_eq!(zlib.settings().get("PREFIX"), Some("/usr/local"));
}

#[rstest]
#[tokio::test]
async fn test_build_prepares_layout(registry: Registry) {
    let host = Host::new();
    fs::remove_dir_all(&host.layout.tool_root).unwrap();

    build_command(&registry, &[], &[], &host.ctx()).await.unwrap();
    assert!(host.layout.tool_root.is_dir());
}

#[rstest]
fn test_list_command(registry: Registry) {
    let mut out = Vec::new();
    list_command(&registry, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("NAME"));
    assert!(lines[2].starts_with("zlib"));
    assert!(lines[2].contains("http://zlib.net/zlib-1.2.8.tar.gz"));
}

#[rstest]
fn test_show_command_text(registry: Registry) {
    let mut out = Vec::new();
    show_command(&registry, "zlib", false, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("source dir:   zlib-1.2.8"));
    assert!(text.contains("archive:      tar.gz"));
    assert!(text.contains("  PREFIX = /usr/local"));
    assert!(text.contains("  1. ./configure --prefix=%(PREFIX)s"));
    assert!(text.contains("  2. make install"));
}

#[rstest]
fn test_show_command_json(registry: Registry) {
    let mut out = Vec::new();
    show_command(&registry, "zlib", true, &mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(value["archive_file"], "zlib-1.2.8.tar.gz");
    assert_eq!(value["archive"], "tar.gz");
    assert_eq!(value["settings"]["PREFIX"], "/usr/local");
    assert_eq!(value["commands"][1][0], "make");
}

#[rstest]
fn test_show_unknown_package(registry: Registry) {
    let mut out = Vec::new();
    let err = show_command(&registry, "nope", false, &mut out).unwrap_err();
    assert!(err.is_config_error());
    assert!(out.is_empty());
}
