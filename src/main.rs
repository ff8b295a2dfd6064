use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use tracing::{debug, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use srcstrap::commands;
use srcstrap::{BootstrapError, BuildContext, Fetcher, Layout, Registry, SystemRunner};


/// Download, unpack, patch and build third-party source packages.
#[derive(Parser)]
#[clap(author, version = clap::crate_version!(), max_term_width = 100, about)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Package catalog to use instead of the bundled one
    #[clap(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Layout configuration file
    #[clap(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log everything, including trace output
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease logging level (-q: info, -qq: warn, -qqq: error)
    #[clap(short, long, global = true, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// Print help in markdown format (for documentation generation)
    #[clap(long, hide = true)]
    markdown_help: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Downloads, unpacks, patches and builds packages, in order
    Build {
        /// Package names from the catalog
        #[clap(required = true)]
        names: Vec<String>,

        /// Override a setting for every requested package
        #[clap(long = "set", value_name = "NAME=VALUE", value_parser = parse_setting)]
        set: Vec<(String, String)>,

        /// Hide download progress bars
        #[clap(long)]
        no_progress: bool,
    },
    /// Lists the packages in the catalog
    List,
    /// Shows one package with its derived names
    Show {
        name: String,

        /// Print as JSON
        #[clap(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn parse_setting(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {arg:?}"))?;
    if name.is_empty() {
        return Err(format!("missing setting name in {arg:?}"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Debug by default; `-q` steps down, `-v` goes to trace.
fn log_level(verbose: u8, quiet: u8) -> Level {
    if verbose > 0 {
        return Level::TRACE;
    }
    match quiet {
        0 => Level::DEBUG,
        1 => Level::INFO,
        2 => Level::WARN,
        _ => Level::ERROR,
    }
}

fn init_tracing(level: Level) -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn load_registry(catalog: Option<&Path>) -> anyhow::Result<Registry> {
    match catalog {
        Some(path) => Registry::from_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display())),
        None => Registry::bundled().context("Failed to load bundled catalog"),
    }
}

/// Logging and catalog setup shared by the commands that read the catalog.
fn init(cli: &Cli) -> anyhow::Result<Registry> {
    init_tracing(log_level(cli.verbose, cli.quiet))?;
    debug!("Argument parsing complete.");

    let registry = load_registry(cli.catalog.as_deref())?;
    debug!("Catalog has {} package(s)", registry.len());
    Ok(registry)
}

async fn run(mut cli: Cli) -> anyhow::Result<()> {
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command.take() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "srcstrap", &mut std::io::stdout());
        }
        Commands::Build {
            names,
            set,
            no_progress,
        } => {
            let registry = init(&cli)?;
            let layout = Layout::load(cli.config.as_deref())
                .context("Failed to load layout configuration")?;
            debug!("{:?}", layout);

            let runner = SystemRunner::new();
            let fetcher = Fetcher::new(!no_progress);
            let ctx = BuildContext::new(&layout, &runner, &fetcher);
            let summary = commands::build_command(&registry, &names, &set, &ctx).await?;
            if !summary.unknown.is_empty() {
                warn!("Unknown package(s): {}", summary.unknown.join(", "));
            }
        }
        Commands::List => {
            let registry = init(&cli)?;
            commands::list_command(&registry, &mut std::io::stdout())?;
        }
        Commands::Show { name, json } => {
            let registry = init(&cli)?;
            commands::show_command(&registry, &name, json, &mut std::io::stdout())?;
        }
    }

    Ok(())
}

/// A failing build tool's status becomes the process status.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BootstrapError>()
        .map(BootstrapError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code(&err))
        }
    }
}
