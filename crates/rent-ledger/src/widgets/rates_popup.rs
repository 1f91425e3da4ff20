use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
    Frame,
};

use super::centered_rect;
use crate::form::{RatesField, RatesForm};

pub struct RatesPopupWidget;

impl RatesPopupWidget {
    pub fn render(frame: &mut Frame, area: Rect, form: &RatesForm) {
        let popup_area = centered_rect(50, 30, area);
        frame.render_widget(Clear, popup_area);

        let field = |field: RatesField, label: &str, unit: &str| {
            let focused = form.focus() == field;
            Line::from(vec![
                Span::styled(
                    if focused { "> " } else { "  " },
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(format!("{:<18}", label), Style::default().fg(Color::Gray)),
                Span::styled(
                    form.value(field).to_string(),
                    if focused {
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
                    } else {
                        Style::default().fg(Color::White)
                    },
                ),
                Span::styled(format!(" {}", unit), Style::default().fg(Color::Gray)),
            ])
        };

        let mut text = vec![
            Line::from(Span::styled(
                "Applies to every room this month",
                Style::default().fg(Color::Gray),
            )),
            Line::from(" "),
            field(RatesField::Electricity, "Electricity rate", "₫/kWh"),
            field(RatesField::Water, "Water rate", "₫/person"),
            Line::from(" "),
        ];

        if let Some(error) = form.error() {
            text.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red),
            )));
        }

        let popup = Paragraph::new(text).block(
            Block::bordered()
                .title("Monthly Rates")
                .title_alignment(Alignment::Center)
                .style(Style::default().fg(Color::Cyan)),
        );

        frame.render_widget(popup, popup_area);
    }
}
