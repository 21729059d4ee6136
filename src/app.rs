//! Terminal application: owns the terminal and switches between the landing
//! and chat views according to the session provider.

use crate::client::ChatClient;
use crate::config::Config;
use crate::session::{SessionProvider, SessionState};
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::ui::landing::{LandingAction, LandingView};
use crate::voice::{CommandRecognizer, SpeechRecognizer, VoiceInput};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(50);

enum View {
    Landing,
    Chat(Box<ConversationManager>),
}

/// Restores the terminal when dropped, including on early return
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
            .context("Failed to enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .context("Failed to create terminal")?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            DisableBracketedPaste,
            LeaveAlternateScreen
        );
        let _ = self.terminal.show_cursor();
    }
}

struct App {
    config: Config,
    sessions: Arc<dyn SessionProvider>,
    client: ChatClient,
    view: View,
}

impl App {
    fn new(config: Config, sessions: Arc<dyn SessionProvider>) -> Result<Self> {
        let client = ChatClient::new(&config).context("Failed to create HTTP client")?;
        let mut app = Self {
            config,
            sessions,
            client,
            view: View::Landing,
        };
        app.refresh_session();
        Ok(app)
    }

    /// Re-read the session and switch views if it changed
    fn refresh_session(&mut self) {
        let in_chat = matches!(self.view, View::Chat(_));
        match self.sessions.current() {
            SessionState::SignedIn(identity) if !in_chat => {
                let recognizer = CommandRecognizer::detect(&self.config.voice)
                    .map(|recognizer| Box::new(recognizer) as Box<dyn SpeechRecognizer>);
                let manager = ConversationManager::new(
                    &self.config,
                    identity,
                    self.client.clone(),
                    VoiceInput::new(recognizer),
                );
                self.view = View::Chat(Box::new(manager));
            }
            SessionState::SignedOut if in_chat => {
                tracing::info!("Session ended, showing landing view");
                self.view = View::Landing;
            }
            _ => {}
        }
    }

    /// Returns false once the app should exit
    fn handle_event(&mut self, event: Event) -> bool {
        match &mut self.view {
            View::Chat(manager) => {
                let action = match event {
                    Event::Key(key) => manager.handle_key(key),
                    Event::Paste(text) => {
                        manager.handle_paste(&text);
                        ConversationAction::None
                    }
                    _ => ConversationAction::None,
                };

                match action {
                    ConversationAction::None => {}
                    ConversationAction::Exit => return false,
                    ConversationAction::SignOut => {
                        if let Err(e) = self.sessions.sign_out() {
                            tracing::error!("Sign out failed: {:#}", e);
                        }
                        self.refresh_session();
                    }
                }
            }
            View::Landing => {
                if let Event::Key(key) = event {
                    match LandingView::handle_key(key) {
                        LandingAction::None => {}
                        LandingAction::Exit => return false,
                        LandingAction::Refresh => self.refresh_session(),
                    }
                }
            }
        }
        true
    }

    fn tick(&mut self) {
        if let View::Chat(manager) = &mut self.view {
            manager.tick();
        }
    }
}

/// Run the terminal UI until the user quits
pub async fn run(config: Config, sessions: Arc<dyn SessionProvider>) -> Result<()> {
    let mut app = App::new(config, sessions)?;
    let mut guard = TerminalGuard::enter()?;
    tracing::info!("Terminal UI started");

    loop {
        app.tick();

        guard.terminal.draw(|frame| {
            let area = frame.size();
            match &mut app.view {
                View::Landing => frame.render_widget(&LandingView, area),
                View::Chat(manager) => manager.render(area, frame.buffer_mut()),
            }
        })?;

        // Input polling is short and synchronous; yield so turn tasks keep running
        if event::poll(TICK).context("Failed to poll terminal events")? {
            let event = event::read().context("Failed to read terminal event")?;
            if !app.handle_event(event) {
                break;
            }
        }
        tokio::task::yield_now().await;
    }

    // Dropping the chat view aborts any reply still streaming
    app.view = View::Landing;
    drop(guard);
    tracing::info!("Terminal UI stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FileSessionProvider;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn app_in(dir: &tempfile::TempDir) -> (App, Arc<FileSessionProvider>) {
        let config = Config::default().with_home(dir.path());
        let sessions = Arc::new(FileSessionProvider::new(config.session_path()));
        let app = App::new(config, sessions.clone()).unwrap();
        (app, sessions)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_signed_out_shows_landing() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app_in(&dir);
        assert!(matches!(app.view, View::Landing));
    }

    #[test]
    fn test_refresh_after_login_opens_chat() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, sessions) = app_in(&dir);

        sessions.sign_in("jordan").unwrap();
        assert!(app.handle_event(key(KeyCode::Char('r'))));
        assert!(matches!(app.view, View::Chat(_)));
    }

    #[test]
    fn test_signout_command_returns_to_landing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_home(dir.path());
        let sessions = Arc::new(FileSessionProvider::new(config.session_path()));
        sessions.sign_in("jordan").unwrap();
        let mut app = App::new(config, sessions.clone()).unwrap();
        assert!(matches!(app.view, View::Chat(_)));

        for c in "/signout".chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
        app.handle_event(key(KeyCode::Enter));
        app.handle_event(key(KeyCode::Enter));

        assert!(matches!(app.view, View::Landing));
        assert_eq!(sessions.current(), SessionState::SignedOut);
    }

    #[test]
    fn test_quit_keys_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_in(&dir);
        assert!(!app.handle_event(key(KeyCode::Char('q'))));
    }
}
