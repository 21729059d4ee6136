//! Markdown to styled terminal lines, plus width-aware wrapping.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Render `markdown` into lines whose spans all derive from `base`
pub fn render(markdown: &str, base: Style) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(base);
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    for event in parser {
        renderer.push(event);
    }
    renderer.finish()
}

struct Renderer {
    base: Style,
    styles: Vec<Style>,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    lists: Vec<Option<u64>>,
    in_code_block: bool,
    pending_gap: bool,
}

impl Renderer {
    fn new(base: Style) -> Self {
        Self {
            base,
            styles: Vec::new(),
            lines: Vec::new(),
            current: Vec::new(),
            lists: Vec::new(),
            in_code_block: false,
            pending_gap: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.base)
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        self.current.push(Span::styled(text.to_string(), style));
    }

    /// End the current line, keeping it even when empty
    fn break_line(&mut self) {
        let spans = std::mem::take(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.break_line();
        }
    }

    fn start_block(&mut self) {
        self.flush();
        if self.pending_gap && !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.pending_gap = false;
    }

    fn end_block(&mut self) {
        self.flush();
        self.pending_gap = true;
    }

    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    let mut parts = text.split('\n').peekable();
                    while let Some(part) = parts.next() {
                        if !part.is_empty() {
                            self.text(part);
                        }
                        if parts.peek().is_some() {
                            self.break_line();
                        }
                    }
                } else {
                    self.text(&text);
                }
            }
            Event::Code(code) => {
                let style = self.style().fg(Color::Yellow);
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.break_line(),
            Event::Rule => {
                self.start_block();
                let style = self.style().add_modifier(Modifier::DIM);
                self.lines.push(Line::from(Span::styled("────────", style)));
                self.end_block();
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.current.is_empty() {
                    self.start_block();
                }
            }
            Tag::Heading { .. } => {
                self.start_block();
                self.push_style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
            }
            Tag::CodeBlock(_) => {
                self.start_block();
                self.in_code_block = true;
                self.push_style(Style::default().fg(Color::Yellow));
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.start_block();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let indent = "  ".repeat(depth);
                self.text(&format!("{indent}{marker}"));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { .. } => {
                self.push_style(Style::default().add_modifier(Modifier::UNDERLINED))
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.end_block();
                } else {
                    self.flush();
                }
            }
            TagEnd::Heading(_) => {
                self.pop_style();
                self.end_block();
            }
            TagEnd::CodeBlock => {
                self.flush();
                self.pop_style();
                self.in_code_block = false;
                self.end_block();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.pending_gap = true;
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style()
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Greedy word wrap of a styled line to `width` columns. Leading whitespace
/// is kept on the first row only; words longer than a row are split.
pub fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    let mut row_width = 0;

    for (token, style, is_space) in tokenize(line) {
        let len = token.width();

        if is_space {
            if row_width == 0 && rows.len() > 1 {
                continue;
            }
            if row_width + len > width {
                rows.push(Vec::new());
                row_width = 0;
                continue;
            }
            push_span(&mut rows, token, style);
            row_width += len;
            continue;
        }

        if row_width > 0 && row_width + len > width {
            rows.push(Vec::new());
            row_width = 0;
        }

        // Words wider than a row are cut by display width
        let mut piece = String::new();
        for ch in token.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if row_width > 0 && row_width + ch_width > width {
                if !piece.is_empty() {
                    push_span(&mut rows, std::mem::take(&mut piece), style);
                }
                rows.push(Vec::new());
                row_width = 0;
            }
            piece.push(ch);
            row_width += ch_width;
        }
        if !piece.is_empty() {
            push_span(&mut rows, piece, style);
        }
    }

    rows.into_iter().map(Line::from).collect()
}

fn push_span(rows: &mut [Vec<Span<'static>>], text: String, style: Style) {
    if let Some(row) = rows.last_mut() {
        row.push(Span::styled(text, style));
    }
}

/// Split spans into alternating whitespace / non-whitespace runs
fn tokenize(line: &Line<'static>) -> Vec<(String, Style, bool)> {
    let mut tokens = Vec::new();
    for span in &line.spans {
        let mut run = String::new();
        let mut run_is_space = false;
        for ch in span.content.chars() {
            let is_space = ch.is_whitespace();
            if !run.is_empty() && is_space != run_is_space {
                tokens.push((std::mem::take(&mut run), span.style, run_is_space));
            }
            run_is_space = is_space;
            run.push(ch);
        }
        if !run.is_empty() {
            tokens.push((run, span.style, run_is_space));
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'static>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_paragraphs_are_separated() {
        let lines = render("First paragraph.\n\nSecond one.", Style::default());
        assert_eq!(plain(&lines), vec!["First paragraph.", "", "Second one."]);
    }

    #[test]
    fn test_bold_text_is_styled() {
        let lines = render("Prof. **Smith** is great", Style::default());
        assert_eq!(plain(&lines), vec!["Prof. Smith is great"]);
        let bold = lines[0]
            .spans
            .iter()
            .find(|span| span.content == "Smith")
            .unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_lists_get_markers() {
        let lines = render("Top picks:\n\n- Smith\n- Jones\n\n1. first\n2. second", Style::default());
        assert_eq!(
            plain(&lines),
            vec!["Top picks:", "", "• Smith", "• Jones", "", "1. first", "2. second"]
        );
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let lines = render("```\nlet a = 1;\n\nlet b = 2;\n```", Style::default());
        assert_eq!(plain(&lines), vec!["let a = 1;", "", "let b = 2;"]);
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        assert!(render("", Style::default()).is_empty());
    }

    #[test]
    fn test_wrap_line_breaks_on_words() {
        let line = Line::from("the quick brown fox jumps");
        let rows = wrap_line(&line, 10);
        assert_eq!(plain(&rows), vec!["the quick ", "brown fox ", "jumps"]);
    }

    #[test]
    fn test_wrap_line_splits_long_words() {
        let line = Line::from("abcdefghij");
        let rows = wrap_line(&line, 4);
        assert_eq!(plain(&rows), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_line_measures_wide_chars() {
        let line = Line::from("教授很好教授很好 👍");
        let rows = wrap_line(&line, 10);
        assert_eq!(plain(&rows), vec!["教授很好教", "授很好 👍"]);
        assert!(rows.iter().all(|row| row.width() <= 10));
    }

    #[test]
    fn test_wrap_line_keeps_indent_and_styles() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let line = Line::from(vec![Span::raw("  • "), Span::styled("Smith rocks", bold)]);
        let rows = wrap_line(&line, 20);
        assert_eq!(plain(&rows), vec!["  • Smith rocks"]);
        assert!(rows[0].spans.iter().any(|s| s.content == "Smith" && s.style == bold));
    }
}
