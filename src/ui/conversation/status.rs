use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::{Duration, Instant};

const NOTICE_TTL: Duration = Duration::from_secs(6);
const KEY_HINTS: &str = "Enter send · Shift+Enter newline · F2 voice · Ctrl+L clear · Ctrl+E export · /help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct Notice {
    kind: NoticeKind,
    text: String,
    shown_at: Instant,
}

/// One-row status strip between the history and the composer
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    notice: Option<Notice>,
    typing: bool,
    listening: bool,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.set_notice(NoticeKind::Info, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.set_notice(NoticeKind::Error, text.into());
    }

    fn set_notice(&mut self, kind: NoticeKind, text: String) {
        self.notice = Some(Notice {
            kind,
            text,
            shown_at: Instant::now(),
        });
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
    }

    /// Current notice, unless it has expired
    pub fn notice(&self) -> Option<(NoticeKind, &str)> {
        self.notice
            .as_ref()
            .filter(|notice| notice.shown_at.elapsed() < NOTICE_TTL)
            .map(|notice| (notice.kind, notice.text.as_str()))
    }

    fn line(&self) -> Line<'static> {
        if self.typing {
            let dots = match (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis()
                / 300)
                % 4
            {
                0 => ".",
                1 => "..",
                2 => "...",
                _ => "   ",
            };
            return Line::from(vec![
                Span::styled("Assistant is typing", Style::default().fg(Color::Green)),
                Span::styled(dots, Style::default().fg(Color::Yellow)),
            ]);
        }

        if self.listening {
            return Line::from(Span::styled(
                "🎙 Listening...",
                Style::default().fg(Color::Red),
            ));
        }

        match self.notice() {
            Some((NoticeKind::Info, text)) => {
                Line::from(Span::styled(text.to_string(), Style::default().fg(Color::Cyan)))
            }
            Some((NoticeKind::Error, text)) => Line::from(vec![
                Span::styled("Error: ", Style::default().fg(Color::Red)),
                Span::raw(text.to_string()),
            ]),
            None => Line::from(Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray))),
        }
    }
}

impl Widget for &StatusLine {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_line(area.x + 1, area.y, &self.line(), area.width.saturating_sub(1));
    }
}
