//! nbviewerbot - Main Entry Point
//!
//! Streams new comments and submissions from the configured subreddits and
//! replies to GitHub notebook links with nbviewer mirrors.

use clap::{ArgAction, Parser, Subcommand};
use nbviewerbot::bot::{BotLifecycle, FileReplyStore};
use nbviewerbot::config::{load_env_file, BotConfig, SubredditSet};
use nbviewerbot::observability::init_default_logging;
use nbviewerbot::transport::reddit::{RedditClient, RedditStream};
use nbviewerbot::transport::ItemSource;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};

/// Reddit bot that replies to GitHub Jupyter Notebook links with nbviewer mirrors
#[derive(Parser)]
#[command(name = "nbviewerbot")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, action = ArgAction::SetTrue, conflicts_with = "quiet")]
    verbose: bool,

    /// Error-level console logging only
    #[arg(short, long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Subreddit set to watch (relevant, test, all)
    #[arg(short, long, value_name = "SET")]
    subreddits: Option<SubredditSet>,

    /// .env file with Reddit credentials
    #[arg(short, long = "env", value_name = "FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default)
    Run,
    /// List the built-in subreddit sets
    Subreddits,
    /// Validate configuration
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level_override = if cli.verbose {
        Some(Some(Level::DEBUG))
    } else if cli.quiet {
        Some(Some(Level::ERROR))
    } else {
        None
    };
    // Dropped on return, flushing the log file
    let _log_guard = init_default_logging(level_override);

    match run_command(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_configuration(&cli.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    if let Some(set) = cli.subreddits {
        config.bot.subreddit_set = set;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(config, cli.env_file).await,
        Commands::Subreddits => {
            print_subreddits(&config);
            Ok(())
        }
        Commands::Config { show } => handle_config_command(&config, show),
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<BotConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BotConfig::load_from_file(path)?)
        }
        None => {
            for path_str in ["nbviewerbot.toml", "config/nbviewerbot.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BotConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using defaults");
            Ok(BotConfig::default())
        }
    }
}

async fn run_bot(
    config: BotConfig,
    env_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting nbviewerbot v{}", env!("CARGO_PKG_VERSION"));

    load_env_file(env_file.as_deref())?;
    let credentials = config.reddit_credentials()?;

    let client = RedditClient::from_config(credentials, &config.reddit)?;
    client.authenticate().await?;
    let client = Arc::new(client);

    let subreddits = config.active_subreddits();
    info!(
        set = %config.bot.subreddit_set,
        count = subreddits.len(),
        "Watching subreddits: {}",
        subreddits.join(", ")
    );

    let sources: Vec<Box<dyn ItemSource>> = vec![
        Box::new(RedditStream::comments(client.clone(), &subreddits)),
        Box::new(RedditStream::submissions(client.clone(), &subreddits)),
    ];
    let store = FileReplyStore::new(&config.bot.reply_log_path);

    let mut bot = BotLifecycle::new(&config, client, sources, store);
    bot.run_until(shutdown_signal()).await?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Could not listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

fn print_subreddits(config: &BotConfig) {
    for (set, subreddits) in config.subreddit_sets() {
        println!("{set}:");
        for sub in subreddits {
            println!("  {sub}");
        }
    }
}

fn handle_config_command(config: &BotConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    info!("Configuration is valid");

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
