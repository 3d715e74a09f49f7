//! postgrab CLI
//!
//! Command-line interface for postgrab - collect social post links, parse
//! them through the parser service and manage the saved posts.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use postgrab_core::{Config, FileStore, Store};

mod commands;
mod editor;
mod input;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "postgrab")]
#[command(about = "postgrab - Collect and parse social post links")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the post links found in text (arguments or stdin)
    Extract {
        /// Text to scan
        text: Vec<String>,
    },
    /// Parse post links and save the results
    Parse {
        /// Text or links to parse (reads stdin when omitted)
        text: Vec<String>,
        /// Review the links in $EDITOR before parsing
        #[arg(short, long)]
        edit: bool,
        /// Use the single-response endpoint instead of streaming progress
        #[arg(long)]
        no_stream: bool,
    },
    /// List saved items
    #[command(alias = "ls")]
    List,
    /// Show item details
    Show {
        /// Item ID (full ID or prefix)
        id: String,
    },
    /// Move items to the trash
    #[command(alias = "rm")]
    Delete {
        /// Item IDs (full ID or prefix)
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Manage trashed items
    Trash {
        #[command(subcommand)]
        command: Option<TrashCommands>,
    },
    /// Manage the todo queue
    Todo {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Show recently requested links
    History,
    /// Show collection counts and storage information
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Download item archives (text and images) from the parser service
    Download {
        /// Item IDs (full ID or prefix)
        #[arg(required = true)]
        ids: Vec<String>,
        /// Only include these image positions, e.g. 0,2
        #[arg(long, value_delimiter = ',')]
        images: Option<Vec<usize>>,
    },
}

#[derive(Subcommand)]
enum TrashCommands {
    /// List trashed items
    #[command(alias = "ls")]
    List,
    /// Move items back to the saved list
    Restore {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Permanently delete trashed items
    Purge {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Permanently delete everything in the trash
    Empty,
}

#[derive(Subcommand)]
enum TodoCommands {
    /// Queue links found in text (arguments or stdin)
    Add {
        text: Vec<String>,
        /// Compose the links in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },
    /// Show the queue
    #[command(alias = "ls")]
    List,
    /// Remove links from the queue
    Rm {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Parse every unparsed queued link
    Parse {
        /// Use the single-response endpoint instead of streaming progress
        #[arg(long)]
        no_stream: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, parser_url, streaming, download_dir, download_delay_ms, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Commands that don't need the store
    match cli.command {
        Commands::Config { command } => {
            return handle_config_command(command, config_path, &output);
        }
        Commands::Extract { text } => return commands::extract::run(text, &output),
        _ => {}
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    let mut store = Store::load(FileStore::new(config.data_dir.clone()))
        .context("Failed to open data store")?;

    match cli.command {
        Commands::Config { .. } | Commands::Extract { .. } => unreachable!(), // Handled above
        Commands::Parse {
            text,
            edit,
            no_stream,
        } => commands::parse::run(&mut store, &config, text, edit, no_stream, &output).await,
        Commands::List => commands::items::list(&store, &output),
        Commands::Show { id } => commands::items::show(&store, id, &output),
        Commands::Delete { ids } => commands::items::delete(&mut store, ids, &output),
        Commands::Trash { command } => handle_trash_command(command, &mut store, &output),
        Commands::Todo { command } => {
            handle_todo_command(command, &mut store, &config, &output).await
        }
        Commands::History => commands::history::show(&store, &output),
        Commands::Status => commands::status::show(&store, &config, &output),
        Commands::Download { ids, images } => {
            commands::download::run(&store, &config, ids, images, &output).await
        }
    }
}

fn handle_trash_command(
    command: Option<TrashCommands>,
    store: &mut commands::AppStore,
    output: &Output,
) -> Result<()> {
    match command {
        Some(TrashCommands::List) | None => commands::trash::list(store, output),
        Some(TrashCommands::Restore { ids }) => commands::trash::restore(store, ids, output),
        Some(TrashCommands::Purge { ids }) => commands::trash::purge(store, ids, output),
        Some(TrashCommands::Empty) => commands::trash::empty(store, output),
    }
}

async fn handle_todo_command(
    command: TodoCommands,
    store: &mut commands::AppStore,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        TodoCommands::Add { text, edit } => commands::todo::add(store, text, edit, output),
        TodoCommands::List => commands::todo::list(store, output),
        TodoCommands::Rm { urls } => commands::todo::remove(store, urls, output),
        TodoCommands::Parse { no_stream } => {
            commands::todo::parse(store, config, no_stream, output).await
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize file logging
///
/// Only initializes if the POSTGRAB_LOG environment variable is set.
/// Logs to config.log_file or {data_dir}/postgrab.log.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("POSTGRAB_LOG") else {
        return;
    };

    let log_path = config.log_path();

    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "postgrab_core={},postgrab_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
