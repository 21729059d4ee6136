use crate::ui::chrome;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

/// What the landing view wants the app to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingAction {
    None,
    Refresh,
    Exit,
}

/// Shown instead of the chat while nobody is signed in
pub struct LandingView;

impl LandingView {
    pub fn handle_key(key: crossterm::event::KeyEvent) -> LandingAction {
        use crossterm::event::{KeyCode, KeyEventKind, KeyModifiers};

        if key.kind != KeyEventKind::Press {
            return LandingAction::None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                LandingAction::Exit
            }
            KeyCode::Char('q') | KeyCode::Esc => LandingAction::Exit,
            KeyCode::Char('r') | KeyCode::Enter => LandingAction::Refresh,
            _ => LandingAction::None,
        }
    }
}

impl Widget for &LandingView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        chrome::render_header(chunks[0], buf, None);

        let lines = vec![
            Line::from(Span::styled(
                format!("Welcome to {} support", chrome::BRAND),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from("Sign in to chat with the assistant about professors and courses."),
            Line::default(),
            Line::from(vec![
                Span::raw("Run "),
                Span::styled("rmp-chat login <name>", Style::default().fg(Color::Yellow)),
                Span::raw(" in another terminal, then press "),
                Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw("."),
            ]),
            Line::default(),
            Line::from(Span::styled(
                "r / Enter refresh · q / Esc quit",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Signed out ")
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .render(chunks[1], buf);
    }
}
