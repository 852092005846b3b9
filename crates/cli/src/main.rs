//! honyaku command-line entry point.
//!
//! Drives the offline worker against the configured origin and runs the
//! translator chat against an OpenAI-compatible engine. Logging goes to
//! stderr so command output on stdout stays clean.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use honyaku_core::AppConfig;

mod commands;

/// Offline-first translator shell and chat client
#[derive(Parser)]
#[command(name = "honyaku")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the static assets for the current version and activate it
    Install,
    /// List cache buckets with their entry counts
    Buckets,
    /// Show how a URL would be routed
    Classify {
        url: String,
    },
    /// Send a request through the worker
    Fetch {
        url: String,
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,
    },
    /// Simulate a share navigation
    Share {
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// Open an application window at this URL before sharing
        #[arg(long)]
        client: Option<String>,
    },
    /// Interactive translator chat (Ctrl-C stops the current reply)
    Chat {
        /// Page URL the chat starts from; share fields in it prefill the first message
        #[arg(long)]
        startup_url: Option<String>,
    },
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = AppConfig::load()?;
    tracing::debug!(version = %config.cache_version, origin = %config.origin, "configuration loaded");

    match cli.command {
        Commands::Install => commands::worker::install(&config).await,
        Commands::Buckets => commands::worker::buckets(&config).await,
        Commands::Classify { url } => commands::worker::classify(&config, &url),
        Commands::Fetch { url, method } => commands::worker::fetch(&config, &url, &method).await,
        Commands::Share { text, title, url, client } => {
            let fields = commands::worker::ShareFields { text, title, url };
            commands::worker::share(&config, fields, client.as_deref()).await
        }
        Commands::Chat { startup_url } => commands::chat::run(&config, startup_url.as_deref()).await,
    }
}
