use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{AppState, Popup, Tab};

pub struct ShortcutsWidget;

impl ShortcutsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let keys: &[(&str, &str)] = match (&state.popup, state.tab) {
            (Some(Popup::EditBill(_)), _) => &[
                ("Tab/↑↓", "field"),
                ("Space", "toggle paid"),
                ("Enter", "save"),
                ("Esc", "cancel"),
            ],
            (Some(Popup::Rates(_)), _) => &[("Tab", "field"), ("Enter", "apply"), ("Esc", "cancel")],
            (None, Tab::Management) => &[
                ("←→", "month"),
                ("t", "today"),
                ("↑↓/1-4", "room"),
                ("Enter", "edit"),
                ("p", "paid"),
                ("R", "rates"),
                ("r", "refresh"),
                ("Tab", "analytics"),
                ("q", "quit"),
            ],
            (None, Tab::Analytics) => &[
                ("←→", "month"),
                ("r", "refresh"),
                ("Tab", "management"),
                ("q", "quit"),
            ],
        };

        let mut spans = Vec::with_capacity(keys.len() * 3);
        for (i, (key, action)) in keys.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(", ", Style::default().fg(Color::Gray)));
            }
            spans.push(Span::styled(
                *key,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!(" {}", action),
                Style::default().fg(Color::Gray),
            ));
        }

        let shortcuts = Paragraph::new(vec![Line::from(spans)]).alignment(Alignment::Center);

        frame.render_widget(shortcuts, area);
    }
}
