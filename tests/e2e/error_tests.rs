//! End-to-end tests for error handling and exit codes

use super::Workspace;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;

const FAILING: &str = r#"
[[package]]
name = "broken"
url = "http://downloads.example.invalid/broken-2.0.zip"
commands = ["exit 7", "touch never.txt"]

[[package]]
name = "after"
url = "http://downloads.example.invalid/after-1.0.zip"
commands = ["touch ran.txt"]
"#;

fn prepare_cached(ws: &Workspace) {
    for name in ["broken-2.0", "after-1.0"] {
        fs::write(ws.path(&format!("downloads/{name}.zip")), b"PK").unwrap();
        fs::create_dir_all(ws.path(&format!("code/{name}"))).unwrap();
    }
}

#[cfg(unix)]
#[test]
fn failing_command_propagates_status_and_stops_run() {
    let ws = Workspace::new(FAILING);
    prepare_cached(&ws);

    ws.srcstrap()
        .args(["build", "broken", "after"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("exit 7"));

    assert!(!ws.path("code/broken-2.0/never.txt").exists());
    assert!(!ws.path("code/after-1.0/ran.txt").exists());
}

#[cfg(unix)]
#[test]
fn unknown_package_is_skipped() {
    let ws = Workspace::new(FAILING);
    prepare_cached(&ws);

    ws.srcstrap()
        .args(["build", "nope", "after"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No such package: nope"));

    assert!(ws.path("code/after-1.0/ran.txt").exists());
}

#[test]
fn unresolved_placeholder_fails_before_running_anything() {
    let ws = Workspace::new(
        r#"
[[package]]
name = "typo"
url = "http://downloads.example.invalid/typo-1.0.tar.gz"
commands = ["./configure --prefix=%(PERFIX)s"]

[package.settings]
PREFIX = "/usr/local"
"#,
    );

    ws.srcstrap()
        .args(["list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("PERFIX"));
}

#[test]
fn unknown_archive_suffix_is_rejected() {
    let ws = Workspace::new(
        r#"
[[package]]
name = "odd"
url = "http://downloads.example.invalid/odd-1.0.rar"
"#,
    );

    ws.srcstrap()
        .args(["show", "odd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized archive suffix"));
}

#[test]
fn malformed_catalog_shows_error() {
    let ws = Workspace::new("[[package]\nname = ");

    ws.srcstrap()
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load catalog"));
}

#[test]
fn show_unknown_package_fails() {
    let ws = Workspace::new("");

    ws.srcstrap()
        .args(["show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No such package"));
}

#[test]
fn invalid_subcommand_shows_help() {
    let ws = Workspace::new("");

    ws.srcstrap().arg("invalid-command").assert().failure().stderr(
        predicate::str::contains("invalid-command").or(predicate::str::contains("unrecognized")),
    );
}
