use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
    Frame,
};
use rent_ledger_core::data_structures::room_name;
use rent_ledger_core::{Bill, BillCalculator, ROOM_IDS};

use crate::format::{format_kwh, format_vnd};
use crate::AppState;

pub struct RoomCardsWidget;

impl RoomCardsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let cells: Vec<Rect> = rows
            .iter()
            .flat_map(|row| {
                Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(*row)
                    .to_vec()
            })
            .collect();

        for (index, (room_id, cell)) in ROOM_IDS.iter().zip(cells).enumerate() {
            let selected = index == state.selected_room;
            Self::render_card(frame, cell, *room_id, state.bill_for_room(*room_id), selected);
        }
    }

    fn render_card(frame: &mut Frame, area: Rect, room_id: i64, bill: Option<&Bill>, selected: bool) {
        let border_style = if selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let title = match bill {
            Some(bill) if bill.is_paid => format!(" {} - paid ", bill.room_name()),
            Some(bill) => format!(" {} ", bill.room_name()),
            None => format!(" {} ", room_name(room_id)),
        };

        let block = Block::bordered()
            .title(title)
            .border_type(if selected {
                BorderType::Thick
            } else {
                BorderType::Plain
            })
            .border_style(border_style);

        let Some(bill) = bill else {
            let empty = Paragraph::new(vec![Line::from(Span::styled(
                "No bill",
                Style::default().fg(Color::DarkGray),
            ))])
            .block(block);
            frame.render_widget(empty, area);
            return;
        };

        let calculation = BillCalculator::new().calculate(bill);
        let label = Style::default().fg(Color::White);
        let value = Style::default().fg(Color::Yellow);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Occupants: ", label),
                Span::styled(bill.occupants.to_string(), value),
            ]),
            Line::from(vec![
                Span::styled("Meter: ", label),
                Span::styled(
                    format!("{} → {}", bill.electricity_old, bill.electricity_new),
                    value,
                ),
                Span::styled(
                    format!(" ({})", format_kwh(calculation.electricity_usage())),
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(vec![
                Span::styled("Electricity: ", label),
                Span::styled(format_vnd(calculation.electricity_cost()), value),
            ]),
            Line::from(vec![
                Span::styled("Water: ", label),
                Span::styled(format_vnd(calculation.water_cost()), value),
            ]),
            Line::from(vec![
                Span::styled("Rent: ", label),
                Span::styled(format_vnd(calculation.room_rent()), value),
            ]),
            Line::from(vec![
                Span::styled("Total: ", label.add_modifier(Modifier::BOLD)),
                Span::styled(
                    format_vnd(calculation.total_bill()),
                    Style::default()
                        .fg(if bill.is_paid { Color::Green } else { Color::Red })
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
        ];

        if calculation.per_person() > 0.0 {
            lines.push(Line::from(vec![
                Span::styled("Per person: ", label),
                Span::styled(
                    format_vnd(calculation.per_person()),
                    Style::default().fg(Color::Cyan),
                ),
            ]));
        }

        if let Some(notes) = bill.notes.as_deref().filter(|n| !n.is_empty()) {
            lines.push(Line::from(Span::styled(
                notes.to_string(),
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )));
        }

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
