//! Archive kinds recognised by file-name suffix, and how each one is unpacked.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{BootstrapError, Result};
use crate::paths::posix_path;
use crate::runner::Invocation;

/// How a downloaded file turns into a source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveKind {
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "tar.bz2")]
    TarBz2,
    #[serde(rename = "7z")]
    SevenZip,
    #[serde(rename = "zip")]
    Zip,
    /// Self-contained installer; fetched only.
    #[serde(rename = "installer")]
    Installer,
}

// Longest suffix first so `.tar.gz` is never mistaken for something shorter.
const SUFFIXES: &[(&str, ArchiveKind)] = &[
    (".tar.bz2", ArchiveKind::TarBz2),
    (".tar.gz", ArchiveKind::TarGz),
    (".tgz", ArchiveKind::TarGz),
    (".7z", ArchiveKind::SevenZip),
    (".zip", ArchiveKind::Zip),
    (".exe", ArchiveKind::Installer),
];

/// `tar` exits with 2 for warnings such as unrepresentable permission bits.
const TAR_WARNING_STATUS: i32 = 2;

impl ArchiveKind {
    /// Recognises the kind from a file name's suffix (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        split_suffix(file_name)
            .map(|(_, kind)| kind)
            .ok_or_else(|| {
                BootstrapError::config(format!(
                    "unrecognized archive suffix in {file_name:?} (expected one of {})",
                    SUFFIXES
                        .iter()
                        .map(|(suffix, _)| *suffix)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    /// The command that unpacks `archive` into `code_root`, or `None` for
    /// installers.
    ///
    /// `tar` and `unzip` come from the MSYS shell layer and get a POSIX-style
    /// path; `7z` is a native tool and gets the path unchanged.
    pub fn extract_invocation(&self, archive: &Path, code_root: &Path) -> Option<Invocation> {
        let invocation = match self {
            ArchiveKind::TarGz => Invocation::new("tar", code_root)
                .args(["--no-same-owner", "-xzf"])
                .arg(posix_path(archive)),
            ArchiveKind::TarBz2 => Invocation::new("tar", code_root)
                .args(["--no-same-owner", "-xjf"])
                .arg(posix_path(archive)),
            ArchiveKind::SevenZip => Invocation::new("7z", code_root)
                .args(["x", "-y"])
                .arg(archive.to_string_lossy()),
            ArchiveKind::Zip => Invocation::new("unzip", code_root)
                .args(["-q", "-o"])
                .arg(posix_path(archive)),
            ArchiveKind::Installer => return None,
        };
        Some(invocation)
    }

    /// Whether a non-zero extraction status is only a warning.
    pub fn tolerates(&self, status: i32) -> bool {
        matches!(self, ArchiveKind::TarGz | ArchiveKind::TarBz2) && status == TAR_WARNING_STATUS
    }

    pub fn is_installer(&self) -> bool {
        matches!(self, ArchiveKind::Installer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::TarBz2 => "tar.bz2",
            ArchiveKind::SevenZip => "7z",
            ArchiveKind::Zip => "zip",
            ArchiveKind::Installer => "installer",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveKind {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" => Ok(ArchiveKind::TarGz),
            "tar.bz2" => Ok(ArchiveKind::TarBz2),
            "7z" => Ok(ArchiveKind::SevenZip),
            "zip" => Ok(ArchiveKind::Zip),
            "installer" | "exe" => Ok(ArchiveKind::Installer),
            other => Err(BootstrapError::config(format!("unknown archive kind {other:?}"))),
        }
    }
}

fn split_suffix(file_name: &str) -> Option<(&str, ArchiveKind)> {
    let lower = file_name.to_ascii_lowercase();
    SUFFIXES.iter().find_map(|(suffix, kind)| {
        lower
            .ends_with(suffix)
            .then(|| (&file_name[..file_name.len() - suffix.len()], *kind))
    })
}

/// Strips a known archive suffix; names without one come back unchanged.
///
/// ```
/// use srcstrap::archive::strip_known_suffix;
///
/// assert_eq!(strip_known_suffix("boost_1_42_0.7z"), "boost_1_42_0");
/// assert_eq!(strip_known_suffix("xerces-c-3.1.2.tar.gz"), "xerces-c-3.1.2");
/// ```
pub fn strip_known_suffix(file_name: &str) -> &str {
    split_suffix(file_name).map_or(file_name, |(stem, _)| stem)
}
