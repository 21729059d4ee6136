use crate::client::ChatClient;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::session::{FileSessionProvider, SessionProvider, SessionState};
use crate::storage::{HistoryStore, write_export};
use crate::streaming::drain_into;
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

/// Send one message and stream the reply to stdout; the turn is persisted
/// like it would be in the chat view
pub async fn ask(config: &Config, sessions: &dyn SessionProvider, message: &str) -> Result<()> {
    let SessionState::SignedIn(identity) = sessions.current() else {
        anyhow::bail!("Not signed in. Run 'rmp-chat login <name>' first.");
    };

    let store = HistoryStore::new(config.history_path());
    let mut conversation = Conversation::restore(&store);
    let payload = conversation.begin_turn(message)?;
    tracing::info!(user = %identity.user, "Asking from the command line");

    let client = ChatClient::new(config)?;
    let result = match client.stream_reply(&payload).await {
        Ok(fragments) => {
            let mut stdout = io::stdout();
            drain_into(fragments, &mut conversation, |fragment| {
                let _ = write!(stdout, "{fragment}");
                let _ = stdout.flush();
            })
            .await
        }
        Err(e) => Err(e),
    };
    println!();

    tracing::debug!(
        chars = conversation.last().map(|m| m.content.len()).unwrap_or(0),
        "Reply received"
    );
    store.save(conversation.messages());

    if let Err(e) = &result {
        tracing::error!("Error: {}", e);
    }
    result.with_context(|| format!("Chat request to {} failed", client.endpoint()))
}

/// Print the stored conversation
pub fn history(config: &Config) -> Result<()> {
    let store = HistoryStore::new(config.history_path());
    let Some(messages) = store.load() else {
        println!("📭 No chat history yet. Run 'rmp-chat' to start a conversation!");
        return Ok(());
    };

    for message in messages {
        println!("{}:", message.role.display_name());
        println!("{}", message.content);
        println!();
    }
    Ok(())
}

/// Write the stored conversation to a text file
pub fn export(config: &Config, output: Option<PathBuf>) -> Result<()> {
    let store = HistoryStore::new(config.history_path());
    let conversation = Conversation::restore(&store);
    let path = output.unwrap_or_else(|| config.export_path());

    let path = write_export(&path, &conversation.export_text())?;
    println!("📄 Chat exported to {}", path.display());
    Ok(())
}

/// Erase the stored conversation
pub fn clear(config: &Config) -> Result<()> {
    let store = HistoryStore::new(config.history_path());
    store.remove();
    println!("🧹 Chat history cleared ({})", store.path().display());
    Ok(())
}

pub fn login(config: &Config, name: &str) -> Result<()> {
    let sessions = FileSessionProvider::new(config.session_path());
    let identity = sessions.sign_in(name)?;
    println!("✅ Signed in as {}", identity.user);
    Ok(())
}

pub fn logout(config: &Config) -> Result<()> {
    let sessions = FileSessionProvider::new(config.session_path());
    match sessions.current() {
        SessionState::SignedIn(identity) => {
            sessions.sign_out()?;
            println!("👋 Signed out {}", identity.user);
        }
        SessionState::SignedOut => println!("Not signed in."),
    }
    Ok(())
}

/// Print the effective configuration, optionally writing it to disk first
pub fn show_config(config: &Config, init: bool) -> Result<()> {
    if init {
        let path = config.save()?;
        println!("📝 Wrote {}", path.display());
        println!();
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("# home: {}", config.home.display());
    print!("{content}");
    Ok(())
}
