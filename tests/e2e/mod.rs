//! End-to-end test modules for the srcstrap CLI
//!
//! These tests run the binary against a temporary catalog and a layout
//! rooted in a temporary directory. Archives are placed in the download cache
//! up front, so no test touches the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub mod build_tests;
pub mod error_tests;

/// A build host rooted in a temporary directory.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(catalog: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("catalog.toml"), catalog).unwrap();
        for sub in ["code", "tools", "downloads"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// `srcstrap` with the catalog and every layout directory pointed into
    /// the workspace.
    pub fn srcstrap(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("srcstrap"));
        cmd.arg("--catalog")
            .arg(self.path("catalog.toml"))
            .arg("--config")
            .arg(self.path("no-such-config.toml"))
            .env("SRCSTRAP_CODE_ROOT", self.path("code"))
            .env("SRCSTRAP_TOOL_ROOT", self.path("tools"))
            .env("SRCSTRAP_DOWNLOAD_DIR", self.path("downloads"))
            .env("SRCSTRAP_INSTALL_PREFIX", self.path("local"))
            .env_remove("RUST_LOG");
        cmd
    }
}
