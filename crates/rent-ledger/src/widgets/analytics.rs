use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Line,
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use rent_ledger_core::data_structures::room_name;
use rent_ledger_core::{AnalyticsWindow, MonthAnalytics, MonthKey, ROOM_IDS};

use crate::format::format_vnd_short;
use crate::AppState;

const ROOM_COLORS: [Color; 4] = [Color::Cyan, Color::Green, Color::Yellow, Color::Magenta];

pub struct AnalyticsWidget;

impl AnalyticsWidget {
    pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
        let Some(analytics) = &state.analytics else {
            let message = match &state.analytics_error {
                Some(error) => format!("Could not load analytics: {}", error),
                None => "Loading analytics...".to_string(),
            };
            let placeholder = Paragraph::new(message)
                .block(Block::bordered().title("Analytics"))
                .alignment(Alignment::Center);
            frame.render_widget(placeholder, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let window = match state.analytics_window {
            AnalyticsWindow::Centered => "around",
            AnalyticsWindow::Trailing => "up to",
        };
        let selected = state.billing.selected_month();
        let title = match &state.analytics_error {
            Some(error) => format!("Revenue {} {} (stale: {})", window, selected, error),
            None => format!("Revenue {} {}", window, selected),
        };

        Self::render_revenue(frame, chunks[0], analytics, selected, title);
        Self::render_usage(frame, chunks[1], analytics);
    }

    fn render_revenue(
        frame: &mut Frame,
        area: Rect,
        analytics: &[MonthAnalytics],
        selected: MonthKey,
        title: String,
    ) {
        let bars: Vec<Bar> = analytics
            .iter()
            .map(|month| {
                let style = if month.month == selected {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Blue)
                };
                Bar::default()
                    .value(month.total_revenue.max(0.0).round() as u64)
                    .text_value(format_vnd_short(month.total_revenue))
                    .label(Line::from(month.month.short_label()))
                    .style(style)
            })
            .collect();

        let chart = BarChart::default()
            .block(Block::bordered().title(title))
            .data(BarGroup::default().bars(&bars))
            .bar_width(9)
            .bar_gap(2)
            .value_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Blue)
                    .add_modifier(Modifier::BOLD),
            );

        frame.render_widget(chart, area);
    }

    fn render_usage(frame: &mut Frame, area: Rect, analytics: &[MonthAnalytics]) {
        let series = usage_series(analytics);
        let datasets: Vec<Dataset> = series
            .iter()
            .zip(ROOM_COLORS.iter().cycle())
            .map(|((room_id, points), color)| {
                Dataset::default()
                    .name(room_name(*room_id))
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(*color))
                    .data(points)
            })
            .collect();

        let peak = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(_, usage)| *usage))
            .fold(0.0, f64::max);
        let top = (peak * 1.1).max(10.0).ceil();
        let last = analytics.len().saturating_sub(1).max(1) as f64;
        let axis_style = Style::default().fg(Color::Gray);

        let chart = Chart::new(datasets)
            .block(Block::bordered().title("Electricity usage (kWh)"))
            .hidden_legend_constraints((Constraint::Ratio(1, 3), Constraint::Ratio(1, 2)))
            .x_axis(
                Axis::default()
                    .style(axis_style)
                    .bounds([0.0, last])
                    .labels(analytics.iter().map(|m| m.month.short_label())),
            )
            .y_axis(
                Axis::default()
                    .style(axis_style)
                    .bounds([0.0, top])
                    .labels(["0".to_string(), format!("{:.0}", top / 2.0), format!("{:.0}", top)]),
            );

        frame.render_widget(chart, area);
    }
}

/// One line per room: `(month index, kWh)`, zero for months without a bill.
fn usage_series(analytics: &[MonthAnalytics]) -> Vec<(i64, Vec<(f64, f64)>)> {
    ROOM_IDS
        .iter()
        .map(|&room_id| {
            let points = analytics
                .iter()
                .enumerate()
                .map(|(index, month)| {
                    let usage = month.room(room_id).map(|r| r.usage).unwrap_or(0.0);
                    (index as f64, usage)
                })
                .collect();
            (room_id, points)
        })
        .collect()
}
