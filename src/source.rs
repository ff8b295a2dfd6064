//! Where a package comes from: a download transport or a version-control checkout.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{BootstrapError, Result};
use crate::runner::Invocation;

/// Version-control systems a package can be checked out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    Git,
    Svn,
}

impl Vcs {
    /// The checkout command for `url` into `directory`, run from `code_root`.
    pub fn checkout_invocation(&self, url: &str, directory: &str, code_root: &Path) -> Invocation {
        match self {
            Vcs::Git => Invocation::new("git", code_root).args(["clone", url, directory]),
            Vcs::Svn => Invocation::new("svn", code_root).args(["checkout", url, directory]),
        }
    }
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vcs::Git => write!(f, "git"),
            Vcs::Svn => write!(f, "svn"),
        }
    }
}

/// A package's remote location, classified once when the descriptor loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Streamed HTTP(S) download
    Http(Url),
    /// Whole-file FTP retrieval
    Ftp(Url),
    /// Checkout into the workspace, never downloaded to the cache
    VersionControl { vcs: Vcs, url: String },
}

impl Source {
    /// Classifies `url`. An explicit `vcs` wins; otherwise the scheme decides
    /// (`http`/`https`, `ftp`, `git`/`git+…`, `svn`/`svn+…`).
    pub fn classify(url: &str, vcs: Option<Vcs>) -> Result<Self> {
        if let Some(vcs) = vcs {
            return Ok(Source::VersionControl {
                vcs,
                url: checkout_url(vcs, url),
            });
        }

        let parsed = Url::parse(url)
            .map_err(|e| BootstrapError::config(format!("invalid URL {url:?}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(Source::Http(parsed)),
            "ftp" => Ok(Source::Ftp(parsed)),
            scheme if scheme == "git" || scheme.starts_with("git+") => Ok(Source::VersionControl {
                vcs: Vcs::Git,
                url: checkout_url(Vcs::Git, url),
            }),
            scheme if scheme == "svn" || scheme.starts_with("svn+") => Ok(Source::VersionControl {
                vcs: Vcs::Svn,
                url: url.to_string(),
            }),
            other => Err(BootstrapError::config(format!(
                "unsupported URL scheme {other:?} in {url:?}"
            ))),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Source::Http(url) | Source::Ftp(url) => url.as_str(),
            Source::VersionControl { url, .. } => url,
        }
    }

    pub fn is_checkout(&self) -> bool {
        matches!(self, Source::VersionControl { .. })
    }

    /// Short label for listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Http(_) => "http",
            Source::Ftp(_) => "ftp",
            Source::VersionControl { vcs: Vcs::Git, .. } => "git",
            Source::VersionControl { vcs: Vcs::Svn, .. } => "svn",
        }
    }

    /// Last non-empty path segment of the URL. Query strings and fragments
    /// are not part of the name.
    pub fn file_name(&self) -> Option<String> {
        let last_segment = |url: &Url| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        };
        match self {
            Source::Http(url) | Source::Ftp(url) => last_segment(url),
            Source::VersionControl { url, .. } => match Url::parse(url) {
                Ok(parsed) => last_segment(&parsed),
                Err(_) => url
                    .trim_end_matches('/')
                    .rsplit(['/', '\\', ':'])
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            },
        }
    }
}

/// `git+https://…` is a hint for us, not a URL git understands.
fn checkout_url(vcs: Vcs, url: &str) -> String {
    match vcs {
        Vcs::Git => url.strip_prefix("git+").unwrap_or(url).to_string(),
        Vcs::Svn => url.to_string(),
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.url())
    }
}
