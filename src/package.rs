//! Package descriptors and the build pipeline.
//!
//! A [`PackageDescriptor`] is the declarative catalog entry. [`Package`] is the
//! validated form: source and archive kind classified, archive and source
//! directory names derived, and every placeholder checked against settings.
//! [`Package::build`] runs unpack, patch and the build commands in order and
//! stops at the first failure.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::archive::{strip_known_suffix, ArchiveKind};
use crate::configuration::Layout;
use crate::errors::{BootstrapError, Result};
use crate::fetch::Fetch;
use crate::patch::Patch;
use crate::runner::{CommandOutput, CommandRunner, Invocation};
use crate::settings::{Settings, Template};
use crate::source::{Source, Vcs};

/// One build step: a shell line, or a program with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandTemplate {
    Shell(Template),
    Args(Vec<Template>),
}

impl CommandTemplate {
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        match self {
            CommandTemplate::Shell(line) => std::slice::from_ref(line).iter(),
            CommandTemplate::Args(args) => args.iter(),
        }
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTemplate::Shell(line) => write!(f, "{line}"),
            CommandTemplate::Args(args) => {
                let parts: Vec<&str> = args.iter().map(Template::as_str).collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

/// A catalog entry as written in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Builder, Validate)]
#[builder(setter(into, strip_option), default)]
#[serde(deny_unknown_fields)]
pub struct PackageDescriptor {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub url: String,
    /// Forces a version-control checkout regardless of the URL scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<Vcs>,
    /// Cached file name; defaults to the URL's last path segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_file: Option<String>,
    /// Directory the archive unpacks to; defaults to the archive name minus
    /// its suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,
    /// Overrides suffix-based archive detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveKind>,
    #[serde(default)]
    pub settings: Settings,
    /// Extra environment for build commands.
    #[serde(default)]
    pub env: BTreeMap<String, Template>,
    #[serde(default, rename = "patch")]
    pub patches: Vec<Patch>,
    #[serde(default)]
    pub commands: Vec<CommandTemplate>,
}

/// Collaborators the pipeline needs.
pub struct BuildContext<'a, R, F> {
    pub layout: &'a Layout,
    pub runner: &'a R,
    pub fetcher: &'a F,
}

impl<'a, R, F> BuildContext<'a, R, F>
where
    R: CommandRunner,
    F: Fetch,
{
    pub fn new(layout: &'a Layout, runner: &'a R, fetcher: &'a F) -> Self {
        Self {
            layout,
            runner,
            fetcher,
        }
    }
}

/// What [`Package::unpack`] found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// The source directory already existed.
    AlreadyPresent,
    Extracted,
    CheckedOut,
    /// An installer was fetched; there is nothing to unpack.
    DownloadOnly,
}

/// A validated, buildable package.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    name: String,
    source: Source,
    archive_file: String,
    source_dir: String,
    archive: Option<ArchiveKind>,
    settings: Settings,
    env: BTreeMap<String, Template>,
    patches: Vec<Patch>,
    commands: Vec<CommandTemplate>,
}

impl TryFrom<PackageDescriptor> for Package {
    type Error = BootstrapError;

    fn try_from(descriptor: PackageDescriptor) -> Result<Self> {
        Package::from_descriptor(descriptor)
    }
}

impl Package {
    pub fn from_descriptor(descriptor: PackageDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let in_package = |e: BootstrapError| match e {
            BootstrapError::Config(msg) => {
                BootstrapError::Config(format!("package {}: {}", descriptor.name, msg))
            }
            other => other,
        };

        let source = Source::classify(&descriptor.url, descriptor.vcs).map_err(in_package)?;
        let archive_file = match descriptor.archive_file.clone().or_else(|| source.file_name()) {
            Some(file) => file,
            None => {
                return Err(in_package(BootstrapError::config(format!(
                    "cannot derive a file name from {}; set archive_file",
                    descriptor.url
                ))))
            }
        };

        let archive = if source.is_checkout() {
            None
        } else {
            match descriptor.archive {
                Some(kind) => Some(kind),
                None => Some(ArchiveKind::from_file_name(&archive_file).map_err(in_package)?),
            }
        };

        let source_dir = descriptor.source_dir.clone().unwrap_or_else(|| {
            if source.is_checkout() {
                archive_file.trim_end_matches(".git").to_string()
            } else {
                strip_known_suffix(&archive_file).to_string()
            }
        });
        if !is_single_segment(&source_dir) {
            return Err(in_package(BootstrapError::config(format!(
                "source directory {source_dir:?} must be a single path segment"
            ))));
        }

        if archive.is_some_and(|kind| kind.is_installer())
            && (!descriptor.patches.is_empty() || !descriptor.commands.is_empty())
        {
            return Err(in_package(BootstrapError::config(
                "installers are download-only and cannot have patches or commands",
            )));
        }

        let package = Self {
            name: descriptor.name,
            source,
            archive_file,
            source_dir,
            archive,
            settings: descriptor.settings,
            env: descriptor.env,
            patches: descriptor.patches,
            commands: descriptor.commands,
        };
        package.check_templates()?;
        Ok(package)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    #[must_use]
    pub fn archive_file(&self) -> &str {
        &self.archive_file
    }

    #[must_use]
    pub fn source_dir(&self) -> &str {
        &self.source_dir
    }

    /// `None` for version-control checkouts.
    #[must_use]
    pub fn archive(&self) -> Option<ArchiveKind> {
        self.archive
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, Template> {
        &self.env
    }

    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    #[must_use]
    pub fn commands(&self) -> &[CommandTemplate] {
        &self.commands
    }

    /// Merges settings; later values win for the same name.
    pub fn update<I, K, V>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.settings.update(entries);
        self.check_templates()
    }

    pub fn source_path(&self, layout: &Layout) -> PathBuf {
        layout.code_root.join(&self.source_dir)
    }

    pub fn archive_path(&self, layout: &Layout) -> PathBuf {
        layout.download_dir.join(&self.archive_file)
    }

    /// Every placeholder in commands, env and patches must name a setting,
    /// and every patch must compile.
    fn check_templates(&self) -> Result<()> {
        let commands = self.commands.iter().flat_map(CommandTemplate::templates);
        let mut missing: Vec<&str> = commands
            .chain(self.env.values())
            .chain(self.patches.iter().flat_map(Patch::templates))
            .flat_map(|template| template.missing(&self.settings))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if !missing.is_empty() {
            return Err(BootstrapError::config(format!(
                "package {} references undefined setting(s): {}",
                self.name,
                missing.join(", ")
            )));
        }

        if self
            .commands
            .iter()
            .any(|c| matches!(c, CommandTemplate::Args(args) if args.is_empty()))
        {
            return Err(BootstrapError::config(format!(
                "package {} has an empty command",
                self.name
            )));
        }

        for patch in &self.patches {
            patch.validate(&self.settings).map_err(|e| match e {
                BootstrapError::Config(msg) => {
                    BootstrapError::Config(format!("package {}: {}", self.name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// The build commands with settings substituted, ready to run from the
    /// source directory.
    pub fn invocations(&self, layout: &Layout) -> Result<Vec<Invocation>> {
        let cwd = self.source_path(layout);
        let env = self
            .env
            .iter()
            .map(|(key, value)| -> Result<(String, String)> {
                Ok((key.clone(), value.render(&self.settings)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        self.commands
            .iter()
            .map(|command| -> Result<Invocation> {
                let invocation = match command {
                    CommandTemplate::Shell(line) => {
                        layout.shell_invocation(line.render(&self.settings)?, &cwd)?
                    }
                    CommandTemplate::Args(args) => {
                        let mut rendered = args
                            .iter()
                            .map(|arg| arg.render(&self.settings))
                            .collect::<Result<Vec<_>>>()?
                            .into_iter();
                        let program = rendered.next().ok_or_else(|| {
                            BootstrapError::config(format!("package {} has an empty command", self.name))
                        })?;
                        Invocation::new(program, &cwd).args(rendered)
                    }
                };
                Ok(invocation.envs(env.clone()))
            })
            .collect()
    }

    /// Fetches (or checks out) the source and extracts it unless the source
    /// directory already exists.
    pub async fn unpack<R, F>(&self, ctx: &BuildContext<'_, R, F>) -> Result<UnpackOutcome>
    where
        R: CommandRunner,
        F: Fetch,
    {
        let layout = ctx.layout;
        let source_path = self.source_path(layout);

        let url = match &self.source {
            Source::VersionControl { vcs, url } => {
                if source_path.exists() {
                    info!("{}: {} already exists.", self.name, source_path.display());
                    return Ok(UnpackOutcome::AlreadyPresent);
                }
                info!("{}: checking out {} into {}", self.name, url, source_path.display());
                let invocation = vcs.checkout_invocation(url, &self.source_dir, &layout.code_root);
                run_checked(ctx.runner, &invocation, |_| false).await?;
                return Ok(UnpackOutcome::CheckedOut);
            }
            Source::Http(url) | Source::Ftp(url) => url,
        };

        let kind = self.archive.ok_or_else(|| {
            BootstrapError::config(format!("package {} has no archive kind", self.name))
        })?;
        let archive = self.archive_path(layout);
        ctx.fetcher.fetch(url, &archive).await?;

        if kind.is_installer() {
            info!(
                "{}: {} is an installer; run it manually",
                self.name,
                archive.display()
            );
            return Ok(UnpackOutcome::DownloadOnly);
        }

        if source_path.exists() {
            info!("{}: {} already exists.", self.name, source_path.display());
            return Ok(UnpackOutcome::AlreadyPresent);
        }

        info!(
            "{}: {} does not exist, extracting...",
            self.name,
            source_path.display()
        );
        let Some(invocation) = kind.extract_invocation(&archive, &layout.code_root) else {
            return Err(BootstrapError::config(format!(
                "package {}: no extraction command for {kind}",
                self.name
            )));
        };
        run_checked(ctx.runner, &invocation, |status| kind.tolerates(status)).await?;

        if !source_path.exists() {
            warn!(
                "{}: extracting {} did not create {}; check source_dir",
                self.name,
                self.archive_file,
                source_path.display()
            );
        }
        Ok(UnpackOutcome::Extracted)
    }

    /// Applies every patch, in order, inside the source directory.
    pub fn apply_patches(&self, layout: &Layout) -> Result<()> {
        let source_path = self.source_path(layout);
        for patch in &self.patches {
            patch.apply(&source_path, &self.settings)?;
        }
        Ok(())
    }

    /// Runs the build commands in order; the first failure stops the rest.
    pub async fn run_commands<R, F>(&self, ctx: &BuildContext<'_, R, F>) -> Result<()>
    where
        R: CommandRunner,
        F: Fetch,
    {
        for invocation in self.invocations(ctx.layout)? {
            run_checked(ctx.runner, &invocation, |_| false).await?;
        }
        Ok(())
    }

    /// Unpack, patch, build.
    pub async fn build<R, F>(&self, ctx: &BuildContext<'_, R, F>) -> Result<()>
    where
        R: CommandRunner,
        F: Fetch,
    {
        info!("Building {}", self.name);
        if self.unpack(ctx).await? == UnpackOutcome::DownloadOnly {
            return Ok(());
        }

        if !self.patches.is_empty() {
            info!("{}: applying {} patch(es)", self.name, self.patches.len());
            self.apply_patches(ctx.layout)?;
        }

        if !self.commands.is_empty() {
            ctx.layout.ensure_install_prefix()?;
            self.run_commands(ctx).await?;
        }
        info!("{} built", self.name);
        Ok(())
    }
}

/// Runs `invocation` and turns a non-zero, non-tolerated status into
/// [`BootstrapError::CommandFailed`].
async fn run_checked<R, T>(runner: &R, invocation: &Invocation, tolerated: T) -> Result<CommandOutput>
where
    R: CommandRunner,
    T: Fn(i32) -> bool,
{
    debug!("CWD={} {}", invocation.cwd.display(), invocation.display());
    let output = runner.run(invocation).await?;
    debug!("`{}` exited with status {}", invocation.display(), output.status);

    if output.success() {
        return Ok(output);
    }
    if tolerated(output.status) {
        warn!(
            "`{}` exited with status {}; continuing",
            invocation.display(),
            output.status
        );
        return Ok(output);
    }

    error!(
        "`{}` failed with status {}",
        invocation.display(),
        output.status
    );
    Err(BootstrapError::CommandFailed {
        command: invocation.display(),
        status: output.status,
    })
}

fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
