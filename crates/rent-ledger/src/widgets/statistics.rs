use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};
use rent_ledger_core::{SeedSource, ROOM_IDS};

use crate::format::{format_kwh, format_vnd};
use crate::AppState;

pub struct StatisticsWidget;

impl StatisticsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let block = Block::bordered().title("Statistics");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(inner);

        let summary = state.billing.summary();
        let label = Style::default().fg(Color::White);

        let totals = vec![
            Line::from(vec![
                Span::styled("Revenue: ", label),
                Span::styled(
                    format_vnd(summary.total_revenue),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Collected: ", label),
                Span::styled(
                    format_vnd(summary.collected),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!(" ({}/{} paid)", summary.paid_rooms, summary.rooms),
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(vec![
                Span::styled("Outstanding: ", label),
                Span::styled(
                    format_vnd(summary.outstanding),
                    Style::default().fg(if summary.outstanding > 0.0 {
                        Color::Red
                    } else {
                        Color::Green
                    }),
                ),
            ]),
            Line::from(vec![
                Span::styled("Occupancy: ", label),
                Span::styled(
                    format!(
                        "{}/{} rooms, {} people, {}",
                        summary.occupied_rooms,
                        ROOM_IDS.len(),
                        summary.occupants,
                        format_kwh(summary.electricity_usage)
                    ),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
        ];

        frame.render_widget(
            Paragraph::new(totals).alignment(Alignment::Left),
            columns[0],
        );
        frame.render_widget(
            Paragraph::new(Self::status_lines(state)).alignment(Alignment::Left),
            columns[1],
        );
    }

    fn status_lines(state: &AppState) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if let Some(error) = state.billing.error() {
            lines.push(Line::from(vec![
                Span::styled("Load error: ", Style::default().fg(Color::Red)),
                Span::styled(truncate(error, 50), Style::default().fg(Color::Red)),
            ]));
            if let Some(shown) = state.billing.bills_month() {
                lines.push(Line::from(Span::styled(
                    format!("Showing {} until reload", shown),
                    Style::default().fg(Color::Gray),
                )));
            }
        }

        match state.billing.last_seed() {
            Some(SeedSource::PreviousMonth(from)) => lines.push(Line::from(Span::styled(
                format!("New month: readings carried over from {}", from),
                Style::default().fg(Color::Cyan),
            ))),
            Some(SeedSource::Defaults) => lines.push(Line::from(Span::styled(
                "New month: created with default bills",
                Style::default().fg(Color::Cyan),
            ))),
            None => {}
        }

        if let Some(status) = &state.status {
            let color = if status.is_error { Color::Red } else { Color::Green };
            lines.push(Line::from(Span::styled(
                truncate(&status.text, 60),
                Style::default().fg(color),
            )));
        }

        lines.push(Line::from(vec![
            Span::styled("Last Update: ", Style::default().fg(Color::White)),
            Span::styled(
                state
                    .last_update
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string()),
                Style::default().fg(Color::Cyan),
            ),
        ]));

        lines
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        text.chars().take(max).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
