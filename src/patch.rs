//! Source-file rewrites applied after unpacking and before building.
//!
//! A patch rewrites one file in place with an ordered list of regex rules.
//! The pristine file is kept once as `<file>.orig`; later runs rewrite the
//! current content again, so rules must leave already-patched text unchanged.

use std::borrow::Cow;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{BootstrapError, Result};
use crate::settings::{Settings, Template};

/// One pattern and its replacement. Both may reference settings; setting
/// values are matched and inserted literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: Template,
    pub replacement: Template,
}

impl Rule {
    pub fn new(pattern: Template, replacement: Template) -> Self {
        Self {
            pattern,
            replacement,
        }
    }

    fn compile(&self, settings: &Settings) -> Result<(Regex, String)> {
        let pattern = self
            .pattern
            .render_with(settings, |value| Cow::Owned(regex::escape(value)))?;
        let replacement = self.replacement.render_with(settings, |value| {
            if value.contains('$') {
                Cow::Owned(value.replace('$', "$$"))
            } else {
                Cow::Borrowed(value)
            }
        })?;
        let regex = RegexBuilder::new(&pattern)
            .multi_line(true)
            .crlf(true)
            .build()?;
        Ok((regex, replacement))
    }
}

/// Rewrite rules for one file, relative to the package's source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub file: PathBuf,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// What applying a patch did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    /// The pristine file was saved as `<file>.orig` on this run.
    pub backed_up: bool,
    /// The rules changed the content.
    pub changed: bool,
}

impl Patch {
    pub fn new<P: Into<PathBuf>>(file: P, rules: Vec<Rule>) -> Self {
        Self {
            file: file.into(),
            rules,
        }
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.rules
            .iter()
            .flat_map(|rule| [&rule.pattern, &rule.replacement])
    }

    /// Checks that the target stays inside the source directory and that
    /// every rule compiles against `settings`.
    pub fn validate(&self, settings: &Settings) -> Result<()> {
        let escapes = self.file.as_os_str().is_empty()
            || self
                .file
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(BootstrapError::config(format!(
                "patch target {} must be a relative path inside the source directory",
                self.file.display()
            )));
        }
        for rule in &self.rules {
            rule.compile(settings)?;
        }
        Ok(())
    }

    /// Runs every rule over `content`, in order, replacing all matches.
    pub fn transform(&self, content: &[u8], settings: &Settings) -> Result<Vec<u8>> {
        let mut current = content.to_vec();
        for rule in &self.rules {
            let (regex, replacement) = rule.compile(settings)?;
            if let Cow::Owned(next) = regex.replace_all(&current, replacement.as_bytes()) {
                current = next;
            }
        }
        Ok(current)
    }

    /// Rewrites `source_dir/file` in place.
    pub fn apply(&self, source_dir: &Path, settings: &Settings) -> Result<PatchOutcome> {
        let target = source_dir.join(&self.file);
        let content = fs::read(&target).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                BootstrapError::patch(target.display().to_string(), "target file not found")
            }
            _ => BootstrapError::patch(target.display().to_string(), e.to_string()),
        })?;
        let patched = self.transform(&content, settings)?;

        let backup = backup_path(&target);
        let backed_up = if backup.exists() {
            debug!("Backup {} already exists", backup.display());
            false
        } else {
            fs::rename(&target, &backup).map_err(|e| {
                BootstrapError::patch(
                    target.display().to_string(),
                    format!("cannot back up to {}: {}", backup.display(), e),
                )
            })?;
            true
        };

        write_target(&target, &backup, &patched)?;

        let changed = patched != content;
        info!(
            "Patched {} ({} rule(s), {})",
            target.display(),
            self.rules.len(),
            if changed { "changed" } else { "unchanged" }
        );
        Ok(PatchOutcome { backed_up, changed })
    }
}

/// Writes the patched content. The target may already have been renamed to
/// `backup`, so a failure names where the pristine file is.
fn write_target(target: &Path, backup: &Path, content: &[u8]) -> Result<()> {
    fs::write(target, content).map_err(|e| {
        BootstrapError::patch(
            target.display().to_string(),
            format!("{e}; the original is kept at {}", backup.display()),
        )
    })
}

/// `<file>.orig`, next to the file.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".orig");
    PathBuf::from(name)
}
