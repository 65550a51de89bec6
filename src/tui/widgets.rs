//! Palette and small building blocks for the deals table

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row},
};

use crate::render::{DealRow, DirectionIndicator};
use crate::store::StoreMetricsSummary;

pub const ACCENT_CYAN: Color = Color::Rgb(0, 255, 255);
pub const BUY_GREEN: Color = Color::Rgb(0, 255, 136);
pub const SELL_PINK: Color = Color::Rgb(255, 55, 95);
pub const REVERSED_MINT: Color = Color::Rgb(0, 199, 190);
pub const FORWARD_BLUE: Color = Color::Rgb(10, 132, 255);
pub const ACCENT_YELLOW: Color = Color::Rgb(255, 204, 0);
pub const TEXT_DIM: Color = Color::Rgb(128, 128, 128);
pub const TEXT_BRIGHT: Color = Color::Rgb(255, 255, 255);
pub const BORDER_DIM: Color = Color::Rgb(48, 48, 48);

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

pub fn panel(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {} ", title))
        .title_style(
            Style::default()
                .fg(ACCENT_CYAN)
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_DIM))
}

pub fn side_color(is_buy: bool) -> Color {
    if is_buy {
        BUY_GREEN
    } else {
        SELL_PINK
    }
}

/// Button tint of the direction control
pub fn direction_color(direction: DirectionIndicator) -> Color {
    match direction {
        DirectionIndicator::Forward => FORWARD_BLUE,
        DirectionIndicator::Reversed => REVERSED_MINT,
    }
}

pub fn deal_row(row: &DealRow) -> Row<'static> {
    let tint = Style::default().fg(side_color(row.is_buy));
    Row::new(vec![
        Cell::from(row.date.clone()).style(Style::default().fg(TEXT_DIM)),
        Cell::from(row.instrument.clone()).style(Style::default().fg(TEXT_BRIGHT)),
        Cell::from(row.price.clone()).style(tint),
        Cell::from(row.amount.clone()).style(Style::default().fg(TEXT_BRIGHT)),
        Cell::from(row.side.clone()).style(tint),
    ])
}

pub fn spinner(frame: u64) -> &'static str {
    SPINNER[(frame % SPINNER.len() as u64) as usize]
}

/// Footer: counts, store diagnostics, busy indicator
pub fn status_line(
    total: usize,
    rows: usize,
    page_size: usize,
    metrics: &StoreMetricsSummary,
    loading: Option<&'static str>,
) -> Line<'static> {
    let mut spans = vec![
        Span::styled(" deals ", Style::default().fg(TEXT_DIM)),
        Span::styled(total.to_string(), Style::default().fg(TEXT_BRIGHT)),
        Span::styled("  shown ", Style::default().fg(TEXT_DIM)),
        Span::styled(format!("{}/{}", rows, page_size), Style::default().fg(TEXT_BRIGHT)),
        Span::styled("  batches ", Style::default().fg(TEXT_DIM)),
        Span::styled(
            metrics.batches_appended.to_string(),
            Style::default().fg(TEXT_BRIGHT),
        ),
        Span::styled("  resort ", Style::default().fg(TEXT_DIM)),
        Span::styled(
            format!("{}µs", metrics.last_resort_us),
            Style::default().fg(TEXT_BRIGHT),
        ),
    ];
    if let Some(symbol) = loading {
        spans.push(Span::styled(
            format!("  {} sorting", symbol),
            Style::default().fg(ACCENT_YELLOW),
        ));
    }
    spans.push(Span::styled(
        "   ? help  q quit",
        Style::default().fg(TEXT_DIM),
    ));
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_follow_side_and_direction() {
        assert_eq!(side_color(true), BUY_GREEN);
        assert_eq!(side_color(false), SELL_PINK);
        assert_ne!(
            direction_color(DirectionIndicator::Forward),
            direction_color(DirectionIndicator::Reversed)
        );
    }

    #[test]
    fn test_status_line_shows_loading() {
        let metrics = StoreMetricsSummary::default();
        let idle = status_line(10, 10, 100, &metrics, None);
        let busy = status_line(10, 10, 100, &metrics, Some(spinner(1)));
        assert_eq!(busy.spans.len(), idle.spans.len() + 1);
        assert!(idle.spans.iter().any(|s| s.content == "10/100"));
    }
}
