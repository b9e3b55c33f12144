use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use medtrack_core::{Instant, TaskBoard};
use medtrack_defs::{LoadMode, load_sources};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod server;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "medtrack", version, about = "Track recurring obligations and when they are next due")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Flags that override values from the config file.
#[derive(Args, Debug)]
struct Overrides {
    /// Host to listen on
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'P', long, global = true)]
    port: Option<u16>,

    /// Task definitions directory
    #[arg(short = 'D', long, global = true)]
    task_directory: Option<PathBuf>,

    /// Single task definition file to load (repeatable)
    #[arg(short = 'T', long = "task-file", global = true)]
    task_files: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short = 'C', long, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve task status over HTTP (default)
    Serve,

    /// Print every task's status once
    Status {
        /// Evaluate at this time instead of now (RFC 3339, or "YYYY-MM-DD HH:MM" local)
        #[arg(long)]
        at: Option<String>,
    },

    /// Load task definitions and validate their dependencies
    Check,

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file
    Init,

    /// Print the effective configuration (file + flags)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medtrack=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let cfg = effective_config(&cli.overrides)?;
            let board = load_board(&cfg)?;
            server::serve(cfg, board).await?;
        }

        Command::Status { at } => {
            let cfg = effective_config(&cli.overrides)?;
            let tz = cfg.display.tz()?;
            let now = match at {
                Some(s) => render::parse_at(&s, tz)?,
                None => Instant::now(),
            };
            let board = load_board(&cfg)?;
            print!("{}", render::status_lines(&board.reports(now), tz));
        }

        Command::Check => {
            let cfg = effective_config(&cli.overrides)?;
            let board = load_board(&cfg)?;
            println!("OK: {} task(s), dependency graph is acyclic", board.len());
            for task in board.iter() {
                let deps: Vec<&str> = task.dependencies().into_iter().map(|d| d.as_str()).collect();
                if deps.is_empty() {
                    println!("- {}", task.id());
                } else {
                    println!("- {} (after {})", task.id(), deps.join(", "));
                }
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(&cli.overrides.config)?,
            ConfigCommand::Show => {
                let cfg = effective_config(&cli.overrides)?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn effective_config(o: &Overrides) -> Result<Config> {
    let mut cfg = config::load_config(&o.config)?;

    if let Some(host) = &o.host {
        cfg.server.host = host.clone();
    }
    if let Some(port) = o.port {
        cfg.server.port = port;
    }
    if let Some(dir) = &o.task_directory {
        cfg.tasks.directory = Some(dir.clone());
    }
    cfg.tasks.files.extend(o.task_files.iter().cloned());

    cfg.display.tz()?;
    Ok(cfg)
}

fn load_board(cfg: &Config) -> Result<TaskBoard> {
    let mode = if cfg.tasks.lenient {
        LoadMode::Lenient
    } else {
        LoadMode::Strict
    };

    let report = load_sources(cfg.tasks.directory.as_deref(), &cfg.tasks.files, mode)
        .context("loading task definitions")?;

    for path in &report.files {
        tracing::debug!("Loaded {}", path.display());
    }
    for skipped in &report.skipped {
        tracing::warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    let board = TaskBoard::new(report.tasks).context("invalid task set")?;
    tracing::info!(
        "Loaded {} task(s) from {} file(s)",
        board.len(),
        report.files.len()
    );
    Ok(board)
}
