use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};
use rent_ledger_core::LoadState;

use crate::{AppState, Tab};

pub struct HeaderWidget;

impl HeaderWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let spinner = if state.is_busy() {
            state.get_spinner_char().to_string()
        } else {
            " ".to_string()
        };

        let month = state.billing.selected_month();
        let (load_text, load_color) = match state.billing.state() {
            LoadState::Idle => ("", Color::Gray),
            LoadState::Loading { .. } => ("loading", Color::Yellow),
            LoadState::Ready { .. } => ("", Color::Green),
            LoadState::Failed { .. } => ("load failed", Color::Red),
        };

        let tab_style = |tab: Tab| {
            if state.tab == tab {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            }
        };

        let header_text = vec![Line::from(vec![
            Span::styled(
                format!("Rent Ledger - {}", month),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(spinner, Style::default().fg(Color::Yellow)),
            Span::styled(load_text, Style::default().fg(load_color)),
            Span::raw("   "),
            Span::styled(" Management ", tab_style(Tab::Management)),
            Span::raw(" "),
            Span::styled(" Analytics ", tab_style(Tab::Analytics)),
        ])];

        let header = Paragraph::new(header_text)
            .block(Block::bordered().title(format!("Status ({})", state.backend.name())))
            .alignment(Alignment::Center);

        frame.render_widget(header, area);
    }
}
