//! srcstrap - download, unpack, patch and build third-party source packages
//!
//! A package is described declaratively (URL, archive naming, settings,
//! patches, build commands) in a TOML catalog. Building one runs a fixed,
//! idempotent pipeline:
//!
//! 1. fetch the archive into the download cache unless it is already there
//! 2. unpack it into the workspace unless its source directory exists
//! 3. apply each patch (backing the original file up once)
//! 4. run each build command in the source directory, stopping at the first
//!    failure
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use srcstrap::{BuildContext, Fetcher, Layout, Registry, SystemRunner};
//!
//! # async fn example() -> srcstrap::Result<()> {
//! let registry = Registry::bundled()?;
//! let layout = Layout::load(None)?;
//! layout.prepare()?;
//!
//! let (runner, fetcher) = (SystemRunner::new(), Fetcher::new(true));
//! let ctx = BuildContext::new(&layout, &runner, &fetcher);
//! registry.lookup("log4cpp")?.build(&ctx).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every stage returns [`Result<T>`] with a [`BootstrapError`], so callers
//! can tell configuration problems ([`BootstrapError::is_config_error`]) from
//! I/O, network and tool failures. [`BootstrapError::exit_code`] maps a
//! failed run to the process exit status.

pub mod archive;
pub mod catalog;
pub mod commands;
pub mod configuration;
pub mod errors;
pub mod fetch;
pub mod package;
pub mod patch;
pub mod paths;
pub mod runner;
pub mod settings;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use catalog::Registry;
pub use configuration::Layout;
pub use errors::{BootstrapError, Result};
pub use fetch::{Fetch, Fetcher};
pub use package::{BuildContext, Package, PackageDescriptor};
pub use runner::{CommandRunner, SystemRunner};
pub use settings::{Settings, Template};
