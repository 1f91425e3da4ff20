use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};
use rent_ledger_core::BillCalculator;

use super::centered_rect;
use crate::form::{BillField, BillForm};
use crate::format::{format_kwh, format_vnd};

const FIELDS: [BillField; 5] = [
    BillField::Occupants,
    BillField::ElectricityOld,
    BillField::ElectricityNew,
    BillField::Paid,
    BillField::Notes,
];

pub struct DetailPopupWidget;

impl DetailPopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, form: &BillForm) {
        let popup_area = centered_rect(60, 70, area);
        frame.render_widget(Clear, popup_area);

        let bill = form.original();
        let block = Block::bordered()
            .title(format!("{} - {}", bill.room_name(), bill.month_key))
            .title_alignment(Alignment::Center)
            .style(Style::default().fg(Color::Cyan));
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(FIELDS.len() as u16 + 2),
                Constraint::Min(8),
            ])
            .split(inner);

        frame.render_widget(Paragraph::new(Self::field_lines(form)), chunks[0]);
        frame.render_widget(Paragraph::new(Self::preview_lines(form)), chunks[1]);
    }

    fn field_lines(form: &BillForm) -> Vec<Line<'static>> {
        let mut lines: Vec<Line> = FIELDS
            .iter()
            .map(|&field| {
                let focused = form.focus() == field;
                let marker = if focused { "> " } else { "  " };
                let value_style = if focused {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
                } else {
                    Style::default().fg(Color::White)
                };

                Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Yellow)),
                    Span::styled(
                        format!("{:<12}", field.label()),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled(form.value(field), value_style),
                    Span::styled(
                        if focused { "▏" } else { "" },
                        Style::default().fg(Color::Yellow),
                    ),
                ])
            })
            .collect();

        lines.push(match form.error() {
            Some(error) => Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(" "),
        });

        lines
    }

    fn preview_lines(form: &BillForm) -> Vec<Line<'static>> {
        let preview = form.preview();
        let calculation = BillCalculator::new().calculate(&preview);
        let row = |label: &str, value: String| {
            Line::from(vec![
                Span::styled(format!("{:<24}", label), Style::default().fg(Color::White)),
                Span::styled(value, Style::default().fg(Color::Yellow)),
            ])
        };

        let mut lines = vec![
            Line::from(Span::styled(
                "Preview",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            row("Rent:", format_vnd(calculation.room_rent())),
            row(
                &format!("Water ({}/person):", format_vnd(preview.water_rate())),
                format_vnd(calculation.water_cost()),
            ),
            row("Usage:", format_kwh(calculation.electricity_usage())),
            row(
                &format!("Electricity ({}/kWh):", format_vnd(preview.electricity_rate())),
                format_vnd(calculation.electricity_cost()),
            ),
            Line::from(vec![
                Span::styled(
                    format!("{:<24}", "Total:"),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format_vnd(calculation.total_bill()),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
        ];

        if calculation.per_person() > 0.0 {
            lines.push(row("Per person:", format_vnd(calculation.per_person())));
        }

        lines
    }
}
