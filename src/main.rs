mod app;
mod client;
mod commands;
mod config;
mod conversation;
mod error;
mod events;
mod logging;
mod session;
mod storage;
mod streaming;
mod ui;
mod voice;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use session::FileSessionProvider;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rmp-chat")]
#[command(version)]
#[command(about = "Rate My Professor support chat in your terminal", long_about = None)]
struct Cli {
    /// App home holding config, history, session and logs
    #[arg(long, env = "RMP_CHAT_HOME", global = true)]
    home: Option<PathBuf>,

    /// Chat endpoint, overriding the config file
    #[arg(long, env = "RMP_CHAT_ENDPOINT", global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the streamed reply
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Print the stored conversation
    History,
    /// Export the stored conversation as text
    Export {
        /// Destination file instead of the export directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Clear the stored conversation
    Clear,
    /// Start a session as the given user
    Login { name: String },
    /// End the current session
    Logout,
    /// Show the effective configuration
    Config {
        /// Write the configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.home)?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    logging::init_tracing(&config.log_dir())?;
    tracing::debug!(endpoint = %config.endpoint, home = %config.home.display(), "Loaded config");

    let sessions = Arc::new(FileSessionProvider::new(config.session_path()));

    match cli.command {
        None => app::run(config, sessions).await,
        Some(Commands::Ask { message }) => {
            commands::ask(&config, sessions.as_ref(), &message.join(" ")).await
        }
        Some(Commands::History) => commands::history(&config),
        Some(Commands::Export { output }) => commands::export(&config, output),
        Some(Commands::Clear) => commands::clear(&config),
        Some(Commands::Login { name }) => commands::login(&config, &name),
        Some(Commands::Logout) => commands::logout(&config),
        Some(Commands::Config { init }) => commands::show_config(&config, init),
    }
}
