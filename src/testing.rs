//! Fakes for the pipeline's external collaborators.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::TempDir;
use url::Url;

use crate::configuration::Layout;
use crate::errors::Result;
use crate::fetch::{Fetch, FetchOutcome};
use crate::package::BuildContext;
use crate::runner::{CommandOutput, CommandRunner, Invocation};

/// Records every invocation and answers with scripted exit statuses
/// (zero once the script runs out).
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    statuses: Mutex<VecDeque<i32>>,
}

impl RecordingRunner {
    pub fn with_statuses(statuses: &[i32]) -> Self {
        Self {
            calls: Mutex::default(),
            statuses: Mutex::new(statuses.iter().copied().collect()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(0);
        Ok(CommandOutput {
            status,
            ..Default::default()
        })
    }
}

/// Writes a placeholder file instead of downloading and counts transfers.
#[derive(Default)]
pub struct CountingFetcher {
    downloads: AtomicUsize,
}

impl CountingFetcher {
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl Fetch for CountingFetcher {
    async fn fetch(&self, _url: &Url, destination: &Path) -> Result<FetchOutcome> {
        if destination.exists() {
            return Ok(FetchOutcome::Cached);
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(destination, b"archive")?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(FetchOutcome::Downloaded { bytes: 7 })
    }
}

/// A throwaway build host: layout under a temporary directory plus fakes.
pub struct Host {
    _root: TempDir,
    pub layout: Layout,
    pub runner: RecordingRunner,
    pub fetcher: CountingFetcher,
}

impl Host {
    pub fn new() -> Self {
        Self::with_statuses(&[])
    }

    pub fn with_statuses(statuses: &[i32]) -> Self {
        let root = TempDir::new().unwrap();
        let layout = Layout::rooted_at(root.path());
        layout.prepare().unwrap();
        Self {
            _root: root,
            layout,
            runner: RecordingRunner::with_statuses(statuses),
            fetcher: CountingFetcher::default(),
        }
    }

    pub fn ctx(&self) -> BuildContext<'_, RecordingRunner, CountingFetcher> {
        BuildContext::new(&self.layout, &self.runner, &self.fetcher)
    }
}
