use crate::client::ChatClient;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::events::StreamEvent;
use crate::session::Identity;
use crate::storage::{HistoryStore, write_export};
use crate::streaming::TurnHandle;
use crate::ui::chrome::{self, MicState};
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::{
    ConversationComposer, ConversationHistory, ParsedCommand, SlashCommand, StatusLine,
    get_help_text,
};
use crate::voice::{VoiceInput, VoiceToggle};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::path::PathBuf;
use tokio::sync::mpsc::error::TryRecvError;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
    SignOut,
}

/// Owns the chat view: conversation state, the in-flight turn, voice input
/// and the widgets that show them
pub struct ConversationManager {
    conversation: Conversation,
    store: HistoryStore,
    client: ChatClient,
    export_path: PathBuf,
    identity: Identity,
    history: ConversationHistory,
    composer: ConversationComposer,
    status: StatusLine,
    voice: VoiceInput,
    turn: Option<TurnHandle>,
    dirty: bool,
    show_help: bool,
}

impl ConversationManager {
    pub fn new(config: &Config, identity: Identity, client: ChatClient, voice: VoiceInput) -> Self {
        let store = HistoryStore::new(config.history_path());
        let conversation = Conversation::restore(&store);
        tracing::info!(
            user = %identity.user,
            messages = conversation.len(),
            "Opened chat view"
        );

        let mut status = StatusLine::new();
        if !voice.is_available() {
            status.info("Voice input unavailable: set voice.command in config.toml");
        }

        Self {
            conversation,
            store,
            client,
            export_path: config.export_path(),
            identity,
            history: ConversationHistory::new(),
            composer: ConversationComposer::new("Type your message..."),
            status,
            voice,
            turn: None,
            dirty: false,
            show_help: false,
        }
    }

    /// Drain turn and voice events, then flush the conversation if it changed.
    /// Called once per loop iteration.
    pub fn tick(&mut self) {
        self.process_turn_events();

        if let Some(transcript) = self.voice.poll() {
            self.composer.set_content(transcript);
        }
        self.status.set_listening(self.voice.is_listening());
        self.status.set_typing(self.turn.is_some());

        if self.dirty {
            if self.conversation.is_persistable() {
                self.store.save(self.conversation.messages());
            }
            self.dirty = false;
        }
    }

    fn process_turn_events(&mut self) {
        let Some(turn) = self.turn.as_mut() else {
            return;
        };

        let mut finished = false;
        loop {
            match turn.try_next() {
                Ok(StreamEvent::Fragment(fragment)) => {
                    self.conversation.apply_fragment(&fragment);
                    self.dirty = true;
                    self.history.scroll_to_bottom();
                }
                Ok(StreamEvent::Finished) => {
                    tracing::debug!("Reply complete");
                    finished = true;
                    break;
                }
                Ok(StreamEvent::Failed(error)) => {
                    tracing::error!("Error: {}", error);
                    self.status.error(error);
                    finished = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            self.turn = None;
        }
    }

    /// Start a turn for `text`. Any turn still streaming is aborted first.
    pub fn submit(&mut self, text: &str) {
        if let Some(stale) = self.turn.take() {
            tracing::debug!("Aborting previous reply");
            drop(stale);
        }

        match self.conversation.begin_turn(text) {
            Ok(payload) => {
                self.turn = Some(self.client.spawn_turn(payload));
                self.composer.clear();
                self.dirty = true;
                self.history.scroll_to_bottom();
                self.status.set_typing(true);
            }
            Err(ChatError::EmptyMessage) => {}
            Err(e) => self.status.error(e.to_string()),
        }
    }

    /// Reset to the cleared greeting and erase the persisted slot
    pub fn clear_history(&mut self) {
        self.turn = None;
        self.conversation.clear();
        self.store.remove();
        self.dirty = false;
        self.history.scroll_to_bottom();
        self.status.set_typing(false);
        self.status.info("Chat history cleared");
    }

    /// Write the transcript to `target`, or to the configured export file
    pub fn export(&mut self, target: Option<PathBuf>) {
        let path = target.unwrap_or_else(|| self.export_path.clone());
        match write_export(&path, &self.conversation.export_text()) {
            Ok(path) => self.status.info(format!("Chat exported to {}", path.display())),
            Err(e) => {
                tracing::error!("Export failed: {:#}", e);
                self.status.error(format!("{e:#}"));
            }
        }
    }

    pub fn toggle_voice(&mut self) {
        match self.voice.toggle() {
            Ok(VoiceToggle::Started) => {}
            Ok(VoiceToggle::Stopped) => self.status.info("Voice input stopped"),
            Err(ChatError::VoiceUnavailable) => {
                self.status
                    .error("Voice input unavailable: set voice.command in config.toml");
            }
            Err(e) => {
                tracing::error!("Speech recognition error: {}", e);
                self.status.error(e.to_string());
            }
        }
        self.status.set_listening(self.voice.is_listening());
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if self.show_help {
            self.show_help = false;
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return ConversationAction::Exit,
            KeyCode::Char('l') if ctrl => self.clear_history(),
            KeyCode::Char('e') if ctrl => self.export(None),
            KeyCode::Char('r') if ctrl => self.toggle_voice(),
            KeyCode::F(2) => self.toggle_voice(),
            KeyCode::PageUp => self.history.scroll_up(),
            KeyCode::PageDown => self.history.scroll_down(),
            _ => match self.composer.handle_key(key) {
                ConversationResult::Submitted(input) => self.submit(&input),
                ConversationResult::Command(command) => return self.handle_slash_command(command),
                ConversationResult::None => {}
            },
        }

        ConversationAction::None
    }

    /// Bracketed paste goes straight into the composer
    pub fn handle_paste(&mut self, text: &str) {
        if !self.show_help {
            self.composer.insert_str(text);
        }
    }

    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        tracing::debug!(command = command.command.command(), "Slash command");
        match command.command {
            SlashCommand::Clear => self.clear_history(),
            SlashCommand::Export => self.export(command.argument.map(PathBuf::from)),
            SlashCommand::Voice => self.toggle_voice(),
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Signout => return ConversationAction::SignOut,
            SlashCommand::Quit => return ConversationAction::Exit,
        }
        ConversationAction::None
    }

    fn mic_state(&self) -> MicState {
        if !self.voice.is_available() {
            MicState::Unavailable
        } else if self.voice.is_listening() {
            MicState::Listening
        } else {
            MicState::Idle
        }
    }

    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),                       // Header
                Constraint::Length(1),                       // Toolbar
                Constraint::Min(3),                          // History
                Constraint::Length(1),                       // Status
                Constraint::Length(self.composer.height()), // Composer
            ])
            .split(area);

        self.composer.set_focus(!self.show_help);

        chrome::render_header(chunks[0], buf, Some(&self.identity.user));
        chrome::render_toolbar(chunks[1], buf, self.mic_state());

        let streaming = self.turn.is_some();
        self.history
            .render(self.conversation.messages(), streaming, chunks[2], buf);
        self.status.render(chunks[3], buf);
        self.composer.render(chunks[4], buf);

        if self.show_help {
            render_help(chunks[2], buf);
        }
    }
}

fn render_help(area: Rect, buf: &mut Buffer) {
    let text = get_help_text();
    let height = (text.lines().count() as u16 + 2).min(area.height);
    let width = 64.min(area.width);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    Clear.render(popup, buf);
    Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help · any key to close ")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .render(popup, buf);
}
