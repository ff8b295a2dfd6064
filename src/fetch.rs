//! Retrieves remote archives into the local download cache.
//!
//! A destination that already exists is never fetched again. New downloads go
//! to a temporary sibling file first and are renamed into place only once the
//! transfer completed, so an interrupted run never leaves a truncated archive
//! that later runs would mistake for a cached one.

use std::fs;
use std::future::Future;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use url::Url;

use crate::errors::{BootstrapError, Result};

/// What a fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination already existed; nothing was transferred.
    Cached,
    Downloaded { bytes: u64 },
}

/// Resolves a URL to a local file.
pub trait Fetch {
    /// Makes sure `destination` holds the resource at `url`, downloading it
    /// only when the file is absent.
    fn fetch(
        &self,
        url: &Url,
        destination: &Path,
    ) -> impl Future<Output = Result<FetchOutcome>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Http,
    Ftp,
}

impl Transport {
    fn for_url(url: &Url) -> Result<Self> {
        match url.scheme() {
            "http" | "https" => Ok(Transport::Http),
            "ftp" => Ok(Transport::Ftp),
            other => Err(BootstrapError::config(format!(
                "no download transport for scheme {other:?} ({url})"
            ))),
        }
    }
}

/// Downloads over HTTP(S) with minreq and over FTP with suppaftp.
#[derive(Debug, Clone, Copy)]
pub struct Fetcher {
    show_progress: bool,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Fetcher {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

impl Fetch for Fetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<FetchOutcome> {
        if destination.exists() {
            info!("{} already downloaded", destination.display());
            return Ok(FetchOutcome::Cached);
        }

        let transport = Transport::for_url(url)?;
        info!("Downloading {} to {}", url, destination.display());

        let url = url.clone();
        let dest: PathBuf = destination.to_path_buf();
        let show_progress = self.show_progress;
        let bytes = tokio::task::spawn_blocking(move || match transport {
            Transport::Http => download_http(&url, &dest, show_progress),
            Transport::Ftp => download_ftp(&url, &dest),
        })
        .await??;

        debug!("Wrote {} bytes to {}", bytes, destination.display());
        Ok(FetchOutcome::Downloaded { bytes })
    }
}

fn download_http(url: &Url, destination: &Path, show_progress: bool) -> Result<u64> {
    let response = minreq::get(url.as_str())
        .send_lazy()
        .map_err(|e| BootstrapError::network(url.as_str(), e.to_string()))?;

    if !(200..300).contains(&response.status_code) {
        return Err(BootstrapError::network(
            url.as_str(),
            format!("HTTP {} {}", response.status_code, response.reason_phrase),
        ));
    }

    let total = response
        .headers
        .get("content-length")
        .and_then(|value| value.trim().parse::<u64>().ok());
    let progress = progress_bar(total, show_progress);

    let bytes = write_atomically(destination, progress.wrap_read(response));
    progress.finish_and_clear();
    bytes
}

fn download_ftp(url: &Url, destination: &Path) -> Result<u64> {
    let ftp_error = |e: suppaftp::FtpError| BootstrapError::network(url.as_str(), e.to_string());

    let host = url
        .host_str()
        .ok_or_else(|| BootstrapError::network(url.as_str(), "missing host"))?;
    let port = url.port_or_known_default().unwrap_or(21);
    let user = match url.username() {
        "" => "anonymous",
        name => name,
    };
    let password = url.password().unwrap_or("anonymous@");

    let mut ftp = suppaftp::FtpStream::connect((host, port)).map_err(ftp_error)?;
    ftp.login(user, password).map_err(ftp_error)?;
    ftp.transfer_type(suppaftp::types::FileType::Binary)
        .map_err(ftp_error)?;
    let contents = ftp.retr_as_buffer(url.path()).map_err(ftp_error)?;
    if let Err(e) = ftp.quit() {
        debug!("FTP quit for {} failed: {}", url, e);
    }

    write_atomically(destination, contents)
}

/// Streams `reader` into a temporary file next to `destination`, then renames
/// it into place.
fn write_atomically<R: Read>(destination: &Path, mut reader: R) -> Result<u64> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut part = tempfile::Builder::new()
        .prefix(".srcstrap-")
        .suffix(".part")
        .tempfile_in(parent)?;
    let bytes = io::copy(&mut reader, part.as_file_mut())?;
    part.as_file().sync_all()?;
    part.persist(destination).map_err(|e| BootstrapError::Io(e.error))?;
    Ok(bytes)
}

fn progress_bar(total: Option<u64>, show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }

    match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        }
    }
}
