//! Header and toolbar rows shared by the chat and landing views

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub const BRAND: &str = "Rate My Professor";

/// Mic affordance state shown in the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    Unavailable,
    Idle,
    Listening,
}

/// Brand on the left, account control on the right
pub fn render_header(area: Rect, buf: &mut Buffer, user: Option<&str>) {
    let bar = Style::default().bg(Color::Blue).fg(Color::White);
    buf.set_style(area, bar);

    let brand = Line::from(vec![
        Span::styled(" 🎓 ", bar),
        Span::styled(BRAND, bar.add_modifier(Modifier::BOLD)),
        Span::styled(" · Support Chat", bar),
    ]);
    buf.set_line(area.x, area.y, &brand, area.width);

    let account = match user {
        Some(user) => Line::from(vec![
            Span::styled("● ", bar.fg(Color::LightGreen)),
            Span::styled(format!("{user} "), bar.add_modifier(Modifier::BOLD)),
        ]),
        None => Line::from(Span::styled("Signed out ", bar)),
    };
    set_line_right(area, buf, &account);
}

/// Action hints; the mic hint is colored by `mic`
pub fn render_toolbar(area: Rect, buf: &mut Buffer, mic: MicState) {
    let key = Style::default().fg(Color::Black).bg(Color::Gray);
    let label = Style::default().fg(Color::Gray);

    let (mic_label, mic_style) = match mic {
        MicState::Unavailable => (" Mic unavailable", Style::default().fg(Color::DarkGray)),
        MicState::Idle => (" Mic", Style::default().fg(Color::Green)),
        MicState::Listening => (
            " Mic ● listening",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };

    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(" Ctrl+L ", key),
        Span::styled(" Clear  ", label),
        Span::styled(" Ctrl+E ", key),
        Span::styled(" Export  ", label),
        Span::styled(" F2 ", key),
        Span::styled(mic_label, mic_style),
    ]);
    buf.set_line(area.x, area.y, &line, area.width);
}

fn set_line_right(area: Rect, buf: &mut Buffer, line: &Line<'_>) {
    let width = (line.width() as u16).min(area.width);
    let x = area.x + area.width - width;
    buf.set_line(x, area.y, line, width);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf.get(x, y).symbol().to_string())
            .collect()
    }

    #[test]
    fn test_header_shows_user_on_the_right() {
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        render_header(area, &mut buf, Some("jordan"));

        let text = row(&buf, 0);
        assert!(text.contains(BRAND));
        assert!(text.trim_end().ends_with("jordan"));
    }

    #[test]
    fn test_toolbar_reflects_mic_state() {
        let area = Rect::new(0, 0, 80, 1);

        let mut buf = Buffer::empty(area);
        render_toolbar(area, &mut buf, MicState::Listening);
        assert!(row(&buf, 0).contains("listening"));

        let mut buf = Buffer::empty(area);
        render_toolbar(area, &mut buf, MicState::Unavailable);
        assert!(row(&buf, 0).contains("Mic unavailable"));
    }
}
