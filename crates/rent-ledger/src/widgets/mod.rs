//! TUI widget modules

pub mod analytics;
pub mod detail_popup;
pub mod header;
pub mod rates_popup;
pub mod room_cards;
pub mod shortcuts;
pub mod statistics;

pub use analytics::*;
pub use detail_popup::*;
pub use header::*;
pub use rates_popup::*;
pub use room_cards::*;
pub use shortcuts::*;
pub use statistics::*;

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// A rectangle of the given percentage size, centered in `r`.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
