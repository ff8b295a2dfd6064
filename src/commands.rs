//! Command implementations for the srcstrap CLI.
//!
//! - [`build_command`]: build the requested packages, in order
//! - [`list_command`]: print the catalog
//! - [`show_command`]: print one package as resolved from its descriptor
//!
//! # Examples
//!
//! ```rust,no_run
//! use srcstrap::catalog::Registry;
//! use srcstrap::commands::build_command;
//! use srcstrap::configuration::Layout;
//! use srcstrap::fetch::Fetcher;
//! use srcstrap::package::BuildContext;
//! use srcstrap::runner::SystemRunner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::bundled()?;
//! let layout = Layout::load(None)?;
//! let (runner, fetcher) = (SystemRunner::new(), Fetcher::new(true));
//! let ctx = BuildContext::new(&layout, &runner, &fetcher);
//!
//! build_command(&registry, &["xerces-c".to_string()], &[], &ctx).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use tabular::{Row, Table};
use tracing::{error, info};

use crate::archive::ArchiveKind;
use crate::catalog::Registry;
use crate::errors::{BootstrapError, Result};
use crate::fetch::Fetch;
use crate::package::{BuildContext, CommandTemplate, Package};
use crate::patch::Patch;
use crate::runner::CommandRunner;
use crate::settings::{Settings, Template};

#[cfg(test)]
mod tests;

/// What a build run got through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub built: Vec<String>,
    /// Requested names that are not in the catalog.
    pub unknown: Vec<String>,
}

/// Builds each requested package in turn.
///
/// Unknown names are logged and skipped. The first package whose pipeline
/// fails ends the run with that error; later names are not attempted.
/// `overrides` are merged into every package's settings before it builds.
pub async fn build_command<R, F>(
    registry: &Registry,
    names: &[String],
    overrides: &[(String, String)],
    ctx: &BuildContext<'_, R, F>,
) -> Result<RunSummary>
where
    R: CommandRunner,
    F: Fetch,
{
    ctx.layout.prepare()?;

    let mut summary = RunSummary::default();
    for name in names {
        let package = match registry.lookup(name) {
            Ok(package) => package,
            Err(e) => {
                error!("{}", e);
                summary.unknown.push(name.clone());
                continue;
            }
        };

        let mut package = package.clone();
        if !overrides.is_empty() {
            package.update(overrides.iter().cloned())?;
        }
        package.build(ctx).await?;
        summary.built.push(name.clone());
    }

    info!(
        "Built {} package(s), skipped {} unknown",
        summary.built.len(),
        summary.unknown.len()
    );
    Ok(summary)
}

/// Prints name, source kind and URL for every catalog entry.
pub fn list_command<W: Write>(registry: &Registry, out: &mut W) -> Result<()> {
    let mut table = Table::new("{:<}  {:<}  {:<}");
    table.add_row(Row::new().with_cell("NAME").with_cell("SOURCE").with_cell("URL"));
    for package in registry.iter() {
        table.add_row(
            Row::new()
                .with_cell(package.name())
                .with_cell(package.source().kind())
                .with_cell(package.source().url()),
        );
    }
    write!(out, "{table}")?;
    Ok(())
}

#[derive(Serialize)]
struct PackageView<'a> {
    name: &'a str,
    source: &'a str,
    url: &'a str,
    archive_file: &'a str,
    source_dir: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<ArchiveKind>,
    settings: &'a Settings,
    env: &'a BTreeMap<String, Template>,
    patches: &'a [Patch],
    commands: &'a [CommandTemplate],
}

impl<'a> From<&'a Package> for PackageView<'a> {
    fn from(package: &'a Package) -> Self {
        Self {
            name: package.name(),
            source: package.source().kind(),
            url: package.source().url(),
            archive_file: package.archive_file(),
            source_dir: package.source_dir(),
            archive: package.archive(),
            settings: package.settings(),
            env: package.env(),
            patches: package.patches(),
            commands: package.commands(),
        }
    }
}

/// Prints one package with its derived names, as text or JSON.
pub fn show_command<W: Write>(registry: &Registry, name: &str, json: bool, out: &mut W) -> Result<()> {
    let package = registry.lookup(name)?;
    let view = PackageView::from(package);

    if json {
        let text = serde_json::to_string_pretty(&view)
            .map_err(|e| BootstrapError::config(e.to_string()))?;
        writeln!(out, "{text}")?;
        return Ok(());
    }

    writeln!(out, "name:         {}", view.name)?;
    writeln!(out, "source:       {} {}", view.source, view.url)?;
    writeln!(out, "archive file: {}", view.archive_file)?;
    writeln!(out, "source dir:   {}", view.source_dir)?;
    if let Some(kind) = view.archive {
        writeln!(out, "archive:      {kind}")?;
    }
    if !view.settings.is_empty() {
        writeln!(out, "settings:")?;
        for (key, value) in view.settings.iter() {
            writeln!(out, "  {key} = {value}")?;
        }
    }
    if !view.env.is_empty() {
        writeln!(out, "env:")?;
        for (key, value) in view.env {
            writeln!(out, "  {key} = {value}")?;
        }
    }
    if !view.patches.is_empty() {
        writeln!(out, "patches:")?;
        for patch in view.patches {
            writeln!(out, "  {} ({} rule(s))", patch.file.display(), patch.rules.len())?;
        }
    }
    if !view.commands.is_empty() {
        writeln!(out, "commands:")?;
        for (i, command) in view.commands.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, command)?;
        }
    }
    Ok(())
}
