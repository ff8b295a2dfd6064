//! Filesystem layout of a build host.
//!
//! Values come from, in increasing priority: built-in platform defaults, an
//! optional TOML file, and `SRCSTRAP_*` environment variables (for example
//! `SRCSTRAP_CODE_ROOT` or `SRCSTRAP_SHELL="bash -lc"`).

use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use directories::{BaseDirs, UserDirs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{BootstrapError, Result};
use crate::runner::Invocation;

pub const ENV_PREFIX: &str = "SRCSTRAP";

/// Where sources are unpacked, tools live, downloads are cached and builds
/// install to, plus the shell that runs single-line build commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Workspace root; every source directory is a direct child.
    pub code_root: PathBuf,
    /// Installed tools root, created before any build runs.
    pub tool_root: PathBuf,
    /// Download cache.
    pub download_dir: PathBuf,
    pub install_prefix: PathBuf,
    /// Program and leading arguments for shell-line commands.
    pub shell: Vec<String>,
}

impl Layout {
    /// Loads the layout from `config_file` (or the per-user default file, if
    /// it exists) and the process environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = config_file.map(Path::to_path_buf).or_else(default_config_file);
        Self::load_from(file.as_deref(), None)
    }

    /// Like [`Layout::load`], with the environment given explicitly.
    pub fn load_from(
        config_file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let defaults = Layout::platform_default();
        let mut builder = Config::builder()
            .set_default("code_root", path_value(&defaults.code_root))?
            .set_default("tool_root", path_value(&defaults.tool_root))?
            .set_default("download_dir", path_value(&defaults.download_dir))?
            .set_default("install_prefix", path_value(&defaults.install_prefix))?
            .set_default("shell", defaults.shell)?;

        if let Some(path) = config_file {
            debug!("Reading layout from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("shell")
                .source(env),
        );

        let layout: Layout = builder.build()?.try_deserialize()?;
        if layout.shell.is_empty() {
            return Err(BootstrapError::config("shell must name at least a program"));
        }
        Ok(layout)
    }

    /// Built-in defaults for this platform.
    pub fn platform_default() -> Self {
        let (code_root, tool_root) = if cfg!(windows) {
            (PathBuf::from(r"C:\Code"), PathBuf::from(r"C:\Tools"))
        } else {
            let base = BaseDirs::new()
                .map(|dirs| dirs.data_dir().join("srcstrap"))
                .unwrap_or_else(|| PathBuf::from(".srcstrap"));
            (base.join("code"), base.join("tools"))
        };

        let download_dir = UserDirs::new()
            .map(|dirs| {
                dirs.download_dir()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dirs.home_dir().join("Downloads"))
            })
            .unwrap_or_else(|| PathBuf::from("Downloads"));

        Self {
            code_root,
            tool_root,
            download_dir,
            install_prefix: PathBuf::from("/usr/local"),
            shell: vec!["sh".to_string(), "-c".to_string()],
        }
    }

    /// Everything under one directory; used by tests and throwaway builds.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            code_root: root.join("code"),
            tool_root: root.join("tools"),
            download_dir: root.join("downloads"),
            install_prefix: root.join("local"),
            shell: vec!["sh".to_string(), "-c".to_string()],
        }
    }

    /// Creates the tools root, workspace root and download cache if absent.
    pub fn prepare(&self) -> Result<()> {
        info!("Download directory: {}", self.download_dir.display());
        for dir in [&self.tool_root, &self.code_root, &self.download_dir] {
            ensure_dir(dir)?;
        }
        Ok(())
    }

    pub fn ensure_install_prefix(&self) -> Result<()> {
        ensure_dir(&self.install_prefix)
    }

    /// Runs `line` through the configured shell from `cwd`.
    pub fn shell_invocation(&self, line: String, cwd: &Path) -> Result<Invocation> {
        let (program, leading) = self
            .shell
            .split_first()
            .ok_or_else(|| BootstrapError::config("shell must name at least a program"))?;
        Ok(Invocation::new(program.as_str(), cwd)
            .args(leading.iter().cloned())
            .arg(line))
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        info!("Directory {} already exists.", dir.display());
    } else {
        info!("Creating {} directory...", dir.display());
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn default_config_file() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("srcstrap").join("config.toml"))
        .filter(|path| path.exists())
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
