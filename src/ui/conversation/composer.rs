use crate::conversation::is_sendable;
use crate::ui::conversation::commands::{
    COMMAND_ENTRIES, CommandEntry, ParsedCommand, parse_slash_command,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget, block::Title},
};

const MAX_VISIBLE_LINES: usize = 6;

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer; `cursor` is a byte offset
/// that always sits on a char boundary
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

/// Compose field for the next user message
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    has_focus: bool,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            has_focus: true,
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if self.show_command_palette && self.apply_selected_command() {
                    return ConversationResult::None;
                } else if self.can_send() {
                    let content = std::mem::take(&mut self.state.content);
                    self.state.cursor = 0;
                    self.close_command_palette();
                    return match parse_slash_command(&content) {
                        Some(command) => ConversationResult::Command(command),
                        None => ConversationResult::Submitted(content),
                    };
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => {}
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => {
                if let Some(c) = self.state.content[..self.state.cursor].chars().next_back() {
                    self.state.cursor -= c.len_utf8();
                }
            }
            KeyCode::Right => {
                if let Some(c) = self.state.content[self.state.cursor..].chars().next() {
                    self.state.cursor += c.len_utf8();
                }
            }
            KeyCode::Home => self.state.cursor = 0,
            KeyCode::End => self.state.cursor = self.state.content.len(),
            _ => {}
        }

        ConversationResult::None
    }

    /// Send is enabled only for non-whitespace content
    pub fn can_send(&self) -> bool {
        is_sendable(&self.state.content)
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Replace the whole content, e.g. with a voice transcript
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.state.content = content.into();
        self.state.cursor = self.state.content.len();
        self.close_command_palette();
    }

    /// Insert pasted text at the cursor
    pub fn insert_str(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.state.content.insert_str(self.state.cursor, &text);
        self.state.cursor += text.len();
        self.sync_command_palette();
    }

    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
        self.close_command_palette();
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Rows needed to show the content, borders included
    pub fn height(&self) -> u16 {
        let lines = self.state.content.split('\n').count().clamp(1, MAX_VISIBLE_LINES);
        lines as u16 + 2
    }

    fn insert_char(&mut self, c: char) {
        self.state.content.insert(self.state.cursor, c);
        self.state.cursor += c.len_utf8();
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        match self.state.content[..self.state.cursor].chars().next_back() {
            Some(c) => {
                self.state.cursor -= c.len_utf8();
                self.state.content.remove(self.state.cursor);
                true
            }
            None => false,
        }
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor < self.state.content.len() {
            self.state.content.remove(self.state.cursor);
            true
        } else {
            false
        }
    }

    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        let is_command_prefix = content.starts_with('/') && !content.contains(char::is_whitespace);
        if is_command_prefix {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette();
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = COMMAND_ENTRIES
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = if self.filtered_commands.is_empty() {
            None
        } else {
            let index = self.selected_command.unwrap_or(0);
            Some(index.min(self.filtered_commands.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index).copied())
        else {
            return false;
        };

        self.state.content = format!("/{}", entry.keyword);
        self.state.cursor = self.state.content.len();
        self.close_command_palette();
        true
    }

    fn render_command_palette(&self, inner_area: Rect, buf: &mut Buffer) {
        let palette_height = (self.filtered_commands.len().min(6) + 2) as u16;
        let palette_area = Rect {
            x: inner_area.x,
            y: inner_area.y.saturating_sub(palette_height + 1),
            width: inner_area.width,
            height: palette_height,
        };

        Clear.render(palette_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Commands")
            .style(Style::default().fg(Color::Blue));
        let inner = block.inner(palette_area);
        block.render(palette_area, buf);

        for (index, entry) in self.filtered_commands.iter().enumerate() {
            if index >= inner.height as usize {
                break;
            }

            let style = if self.selected_command == Some(index) {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let line = Line::from(vec![
                Span::styled(format!("/{}", entry.keyword), style),
                Span::styled("  ", Style::default().fg(Color::DarkGray)),
                Span::styled(entry.description, Style::default().fg(Color::Gray)),
            ]);
            buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
        }
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let hint = if self.can_send() {
            Span::styled(" Enter ⏎ Send ", Style::default().fg(Color::Green))
        } else {
            Span::styled(" Send ", Style::default().fg(Color::DarkGray))
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Message ")
            .title(Title::from(hint).alignment(Alignment::Right))
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            if self.has_focus {
                content.insert(self.state.cursor.min(content.len()), '▌');
            }

            // Keep the tail (where the cursor usually is) in view
            let lines: Vec<&str> = content.split('\n').collect();
            let height = inner_area.height as usize;
            let start = lines.len().saturating_sub(height);
            for (i, line_text) in lines[start..].iter().enumerate() {
                let line = Line::from(Span::styled(*line_text, Style::default().fg(Color::White)));
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            self.render_command_palette(inner_area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::conversation::commands::SlashCommand;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut ConversationComposer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_send_disabled_for_whitespace() {
        let mut composer = ConversationComposer::new("Type your message...");
        assert!(!composer.can_send());

        type_text(&mut composer, "   ");
        assert!(!composer.can_send());
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ConversationResult::None);
        assert_eq!(composer.content(), "   ");

        type_text(&mut composer, "hi");
        assert!(composer.can_send());
    }

    #[test]
    fn test_enter_submits_and_clears() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "Hello");

        assert_eq!(
            composer.handle_key(press(KeyCode::Enter)),
            ConversationResult::Submitted("Hello".to_string())
        );
        assert_eq!(composer.content(), "");
        assert!(!composer.can_send());
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "a");
        composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut composer, "b");
        assert_eq!(composer.content(), "a\nb");
        assert_eq!(composer.height(), 4);
    }

    #[test]
    fn test_multibyte_editing() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "Peña");
        composer.handle_key(press(KeyCode::Left));
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.content(), "Pea");
        composer.handle_key(press(KeyCode::Right));
        type_text(&mut composer, "é");
        assert_eq!(composer.content(), "Peaé");
    }

    #[test]
    fn test_control_chars_are_not_inserted() {
        let mut composer = ConversationComposer::new("");
        composer.handle_key(KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert_eq!(composer.content(), "");
    }

    #[test]
    fn test_set_content_replaces_text() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "draft");
        composer.set_content("Who teaches physics?");
        assert_eq!(composer.content(), "Who teaches physics?");
        type_text(&mut composer, "!");
        assert_eq!(composer.content(), "Who teaches physics?!");
    }

    #[test]
    fn test_slash_command_submission() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "/clear");
        // Palette is open: Enter completes the selected entry first
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ConversationResult::None);
        assert_eq!(composer.content(), "/clear");

        match composer.handle_key(press(KeyCode::Enter)) {
            ConversationResult::Command(command) => assert_eq!(command.command, SlashCommand::Clear),
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn test_question_starting_with_alias_is_sent() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "/q is Prof. Smith strict?");
        assert!(!composer.show_command_palette);

        assert_eq!(
            composer.handle_key(press(KeyCode::Enter)),
            ConversationResult::Submitted("/q is Prof. Smith strict?".to_string())
        );
    }

    #[test]
    fn test_paste_normalizes_line_endings() {
        let mut composer = ConversationComposer::new("");
        composer.insert_str("line1\rline2\r\nline3");
        assert_eq!(composer.content(), "line1\nline2\nline3");
        assert_eq!(composer.height(), 5);

        composer.clear();
        composer.insert_str("/he");
        assert!(composer.show_command_palette);
        assert_eq!(composer.filtered_commands[0].keyword, SlashCommand::Help.command());
    }

    #[test]
    fn test_palette_filters_by_prefix() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "/ex");
        assert!(composer.show_command_palette);
        assert_eq!(composer.filtered_commands.len(), 1);
        assert_eq!(composer.filtered_commands[0].keyword, SlashCommand::Export.command());

        composer.handle_key(press(KeyCode::Tab));
        assert_eq!(composer.content(), "/export");
        assert!(!composer.show_command_palette);
    }
}
