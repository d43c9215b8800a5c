//! Terminal rendering of a [`ClientViewState`].

use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::view::{ClientViewState, ConnectionStatus};

fn status_style(status: &ConnectionStatus) -> Style {
    let color = match status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Error { .. } => Color::Yellow,
        ConnectionStatus::Disconnected => Color::DarkGray,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn value_or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn render(frame: &mut Frame, state: &ClientViewState, url: &str) {
    let [status_area, values_area, help_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(5),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let status = Paragraph::new(Line::from(vec![
        Span::styled(state.status.to_string(), status_style(&state.status)),
        Span::raw(format!("  {}", url)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Event stream "));
    frame.render_widget(status, status_area);

    let values = Paragraph::new(vec![
        Line::from(format!(
            "Message: {}",
            state.message.as_deref().unwrap_or("-")
        )),
        Line::from(format!("Counter: {}", value_or_dash(state.count))),
        Line::from(format!("Random:  {}", value_or_dash(state.random))),
        Line::from(format!(
            "Events:  {} received, {} malformed",
            state.events_received, state.malformed_events
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Latest values "));
    frame.render_widget(values, values_area);

    let help = Paragraph::new(Span::styled(
        "q / Esc: quit",
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(help, help_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};

    fn rendered(state: &ClientViewState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 10)).unwrap();
        terminal
            .draw(|frame| render(frame, state, "http://127.0.0.1:3001"))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn shows_status_and_latest_values() {
        let state = ClientViewState {
            status: ConnectionStatus::Connected,
            message: Some("hello".to_string()),
            count: Some(12),
            random: Some(7),
            events_received: 14,
            malformed_events: 0,
        };
        let screen = rendered(&state);
        assert!(screen.contains("Connected"));
        assert!(screen.contains("Counter: 12"));
        assert!(screen.contains("Random:  7"));
        assert!(screen.contains("hello"));
    }

    #[test]
    fn shows_placeholders_before_first_event() {
        let screen = rendered(&ClientViewState::default());
        assert!(screen.contains("Disconnected"));
        assert!(screen.contains("Counter: -"));
    }
}
