//! Conversation history display component

use crate::events::{Message, Role};
use crate::ui::markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget,
    },
};

const STREAMING_CURSOR: &str = "▋";
const MIN_BUBBLE_WIDTH: usize = 12;

/// Scroll position over the rendered transcript. `scroll_back` counts rows
/// above the bottom, so 0 follows the newest message.
#[derive(Debug, Default, Clone)]
pub struct ConversationHistory {
    scroll_back: usize,
    viewport: usize,
    max_scroll: usize,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scroll one page towards older messages
    pub fn scroll_up(&mut self) {
        let page = self.viewport.max(1);
        self.scroll_back = (self.scroll_back + page).min(self.max_scroll);
    }

    /// Scroll one page towards the newest message
    pub fn scroll_down(&mut self) {
        let page = self.viewport.max(1);
        self.scroll_back = self.scroll_back.saturating_sub(page);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    pub fn render(&mut self, messages: &[Message], streaming: bool, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Conversation ")
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width < 2 || inner.height == 0 {
            return;
        }

        // Last column is reserved for the scrollbar
        let lines = message_lines(messages, inner.width as usize - 1, streaming);
        let height = inner.height as usize;

        self.viewport = height;
        self.max_scroll = lines.len().saturating_sub(height);
        self.scroll_back = self.scroll_back.min(self.max_scroll);

        let start = self.max_scroll - self.scroll_back;
        for (i, line) in lines.iter().skip(start).take(height).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width - 1);
        }

        if self.max_scroll > 0 {
            let mut state = ScrollbarState::new(self.max_scroll).position(start);
            let scrollbar = Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));
            StatefulWidget::render(scrollbar, inner, buf, &mut state);
        }
    }
}

fn bubble_style(role: Role) -> Style {
    match role {
        Role::Assistant => Style::default().fg(Color::White).bg(Color::Blue),
        Role::User => Style::default().fg(Color::White).bg(Color::Magenta),
    }
}

/// Every message as a chat bubble: assistant bubbles hug the left edge, user
/// bubbles the right, none wider than three quarters of `width`. With
/// `streaming` set, the newest assistant message gets a typing cursor.
pub fn message_lines(messages: &[Message], width: usize, streaming: bool) -> Vec<Line<'static>> {
    let max_bubble = (width * 3 / 4).max(MIN_BUBBLE_WIDTH).min(width);
    let text_width = max_bubble.saturating_sub(2).max(1);
    let mut lines = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        if index > 0 {
            lines.push(Line::default());
        }

        let is_streaming =
            streaming && index + 1 == messages.len() && message.role == Role::Assistant;
        let base = bubble_style(message.role);

        let mut rows: Vec<Line<'static>> = markdown::render(&message.content, base)
            .iter()
            .flat_map(|line| markdown::wrap_line(line, text_width))
            .collect();

        if rows.is_empty() {
            rows.push(Line::default());
        }
        if is_streaming {
            let cursor = Span::styled(STREAMING_CURSOR, base.add_modifier(Modifier::SLOW_BLINK));
            match rows.last_mut() {
                Some(last) if last.width() < text_width => last.spans.push(cursor),
                _ => rows.push(Line::from(cursor)),
            }
        }

        let inner_width = rows.iter().map(Line::width).max().unwrap_or(0).max(1);
        let bubble_width = inner_width + 2;
        let indent = match message.role {
            Role::Assistant => 0,
            Role::User => width.saturating_sub(bubble_width),
        };

        let label_style = Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD);
        let label = message.role.display_name();
        let label_indent = match message.role {
            Role::Assistant => 0,
            Role::User => width.saturating_sub(label.len()),
        };
        lines.push(Line::from(vec![
            Span::raw(" ".repeat(label_indent)),
            Span::styled(label, label_style),
        ]));

        for row in rows {
            let fill = inner_width.saturating_sub(row.width());
            let mut spans = Vec::with_capacity(row.spans.len() + 3);
            if indent > 0 {
                spans.push(Span::raw(" ".repeat(indent)));
            }
            spans.push(Span::styled(" ", base));
            spans.extend(row.spans);
            spans.push(Span::styled(" ".repeat(fill + 1), base));
            lines.push(Line::from(spans));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::GREETING;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_assistant_left_user_right() {
        let messages = vec![Message::assistant("Hello"), Message::user("Hi")];
        let lines = message_lines(&messages, 40, false);
        let rendered: Vec<String> = lines.iter().map(text).collect();

        assert_eq!(rendered[0], "Assistant");
        assert_eq!(rendered[1], " Hello ");
        assert_eq!(rendered[2], "");
        assert_eq!(rendered[3].trim_start(), "You");
        assert_eq!(rendered[4], format!("{} Hi ", " ".repeat(36)));
        assert_eq!(rendered[4].len(), 40);
    }

    #[test]
    fn test_bubbles_use_role_colors() {
        let lines = message_lines(&[Message::user("Hi")], 20, false);
        let body = &lines[1];
        assert!(
            body.spans
                .iter()
                .filter(|span| !span.content.trim().is_empty())
                .all(|span| span.style.bg == Some(Color::Magenta))
        );
    }

    #[test]
    fn test_bubble_width_is_capped() {
        let long = "word ".repeat(40);
        let lines = message_lines(&[Message::assistant(long)], 40, false);
        assert!(lines.len() > 3);
        for line in &lines[1..] {
            assert!(line.width() <= 30, "row too wide: {:?}", text(line));
        }
    }

    #[test]
    fn test_streaming_placeholder_shows_cursor() {
        let messages = vec![
            Message::assistant(GREETING),
            Message::user("Hello"),
            Message::assistant(""),
        ];
        let lines = message_lines(&messages, 60, true);
        let last = lines.last().map(text).unwrap_or_default();
        assert!(last.contains(STREAMING_CURSOR));

        let idle = message_lines(&messages, 60, false);
        assert!(!idle.iter().any(|line| text(line).contains(STREAMING_CURSOR)));
    }

    #[test]
    fn test_markdown_is_rendered_in_bubbles() {
        let lines = message_lines(&[Message::assistant("**Prof. Smith**: 4.8")], 60, false);
        assert_eq!(text(&lines[1]), " Prof. Smith: 4.8 ");
        assert!(
            lines[1]
                .spans
                .iter()
                .any(|span| span.content == "Smith"
                    && span.style.add_modifier.contains(Modifier::BOLD))
        );
    }

    #[test]
    fn test_scroll_is_clamped() {
        let messages: Vec<Message> = (0..30).map(|i| Message::user(format!("m{i}"))).collect();
        let mut history = ConversationHistory::new();
        let area = Rect::new(0, 0, 40, 10);
        let mut buf = Buffer::empty(area);

        history.render(&messages, false, area, &mut buf);
        assert_eq!(history.scroll_back, 0);

        for _ in 0..100 {
            history.scroll_up();
        }
        history.render(&messages, false, area, &mut buf);
        assert_eq!(history.scroll_back, history.max_scroll);

        history.scroll_down();
        assert_eq!(history.scroll_back, history.max_scroll - 8);
        history.scroll_to_bottom();
        assert_eq!(history.scroll_back, 0);
    }
}
