//! Deals TUI Application
//!
//! Owns the view-side state (selected row, busy flag, direction tint) and
//! the current `RenderSession`. All store access goes through the
//! controller; the table only ever draws the session it last pulled.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{block::Title, Clear, Paragraph, Row, Table, TableState, Tabs},
    Frame,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::widgets::*;
use crate::controller::{DealsController, ViewEvent};
use crate::models::SortKey;
use crate::render::{DealRow, DirectionIndicator, RenderSession};

pub struct DealsApp {
    pub running: bool,
    controller: Arc<DealsController>,
    events: mpsc::UnboundedReceiver<ViewEvent>,

    session: RenderSession,
    /// Display strings for `session`, rebuilt on reload
    rows: Vec<DealRow>,

    // View state
    table_state: TableState,
    selected_key: SortKey,
    direction: DirectionIndicator,
    loading: bool,
    show_help: bool,
    viewport_rows: usize,
    frame_count: u64,
}

impl DealsApp {
    pub fn new(
        controller: Arc<DealsController>,
        events: mpsc::UnboundedReceiver<ViewEvent>,
    ) -> Self {
        let session = controller.render_session();
        let header = session.header();
        let mut app = Self {
            running: true,
            controller,
            events,
            session: RenderSession::default(),
            rows: Vec::new(),
            table_state: TableState::default(),
            selected_key: SortKey::from_index(header.selected).unwrap_or_default(),
            direction: header.direction,
            loading: false,
            show_help: false,
            viewport_rows: 0,
            frame_count: 0,
        };
        app.install(session);
        app
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.table_state.selected()
    }

    pub fn selected_key(&self) -> SortKey {
        self.selected_key
    }

    pub fn direction(&self) -> DirectionIndicator {
        self.direction
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Drain controller events; reload at most once per call
    pub fn pump_events(&mut self) {
        let mut reload = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                ViewEvent::DataChanged => reload = true,
                ViewEvent::LoadingStateChanged(loading) => self.loading = loading,
                ViewEvent::DirectionChanged(reversed) => {
                    self.direction = DirectionIndicator::from_reversed(reversed)
                }
                ViewEvent::ScrollToTop => self.scroll_to_top(),
            }
        }
        if reload {
            self.reload();
        }
    }

    pub fn reload(&mut self) {
        let session = self.controller.render_session();
        self.install(session);
    }

    fn install(&mut self, session: RenderSession) {
        if session.generation() != self.session.generation() || self.rows.is_empty() {
            self.rows = session.rows().iter().map(DealRow::from_deal).collect();
        }
        self.session = session;
        // The snapshot is authoritative for the indicator
        self.direction = self.session.header().direction;

        let count = self.session.row_count();
        match self.table_state.selected() {
            None if count > 0 => self.table_state.select(Some(0)),
            Some(i) if i >= count => self
                .table_state
                .select(if count == 0 { None } else { Some(count - 1) }),
            _ => {}
        }
    }

    /// Per-frame bookkeeping after the table was drawn
    pub fn tick(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
        self.pump_events();
        self.report_visible_rows();
    }

    /// Tell the session which row is the last one on screen, so the page
    /// grows once the user reaches the end of it
    fn report_visible_rows(&mut self) {
        let count = self.session.row_count();
        if count == 0 || self.viewport_rows == 0 {
            return;
        }
        let last_visible = (self.table_state.offset() + self.viewport_rows - 1).min(count - 1);
        if self.session.will_display(last_visible, &self.controller) {
            debug!(row = last_visible, "Reached end of page");
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.running = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('?') | KeyCode::F(1) => self.show_help = !self.show_help,
            KeyCode::Tab | KeyCode::Right => self.select_key(self.selected_key.next()),
            KeyCode::BackTab | KeyCode::Left => self.select_key(self.selected_key.prev()),
            KeyCode::Char(c @ '1'..='5') => {
                let index = c as usize - '1' as usize;
                if let Some(key) = SortKey::from_index(index) {
                    self.select_key(key);
                }
            }
            KeyCode::Char('d') | KeyCode::Char(' ') => self.controller.user_toggled_direction(),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(self.viewport_rows.max(1) as isize),
            KeyCode::PageUp => self.move_selection(-(self.viewport_rows.max(1) as isize)),
            KeyCode::Home | KeyCode::Char('g') => self.scroll_to_top(),
            KeyCode::End | KeyCode::Char('G') => {
                let count = self.session.row_count();
                if count > 0 {
                    self.table_state.select(Some(count - 1));
                }
            }
            _ => {}
        }
    }

    fn select_key(&mut self, key: SortKey) {
        self.selected_key = key;
        self.controller.user_selected_sort_key(key);
    }

    fn move_selection(&mut self, delta: isize) {
        let count = self.session.row_count();
        if count == 0 {
            return;
        }
        let current = self.table_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, count as isize - 1);
        self.table_state.select(Some(next as usize));
    }

    fn scroll_to_top(&mut self) {
        *self.table_state.offset_mut() = 0;
        self.table_state
            .select(if self.session.row_count() > 0 { Some(0) } else { None });
    }

    /// Render the application
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.size();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Sort header
                Constraint::Min(5),    // Deals
                Constraint::Length(1), // Footer
            ])
            .split(area);

        self.render_header(frame, chunks[0]);
        self.render_table(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);

        if self.show_help {
            self.render_help(frame, area);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let header = self.session.header();
        let titles: Vec<Line> = header
            .labels
            .iter()
            .map(|label| Line::from(format!(" {} ", label)))
            .collect();

        let direction = Span::styled(
            format!(" {} {} ", self.direction.symbol(), self.direction.label()),
            Style::default()
                .fg(direction_color(self.direction))
                .add_modifier(Modifier::BOLD),
        );

        let block = panel("DEALS")
            .title(Title::from(Line::from(direction)).alignment(Alignment::Right));
        let tabs = Tabs::new(titles)
            .block(block)
            .select(self.selected_key.index())
            .style(Style::default().fg(TEXT_DIM))
            .highlight_style(
                Style::default()
                    .fg(ACCENT_CYAN)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::UNDERLINED),
            );

        frame.render_widget(tabs, area);
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect) {
        // Borders plus the column header row
        self.viewport_rows = area.height.saturating_sub(3) as usize;

        let header = Row::new(vec!["Date", "Instrument", "Price", "Amount", "Side"]).style(
            Style::default()
                .fg(TEXT_DIM)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = self.rows.iter().map(deal_row).collect();
        let widths = [
            Constraint::Length(20),
            Constraint::Min(14),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(5),
        ];

        let title = format!(
            "{} of {}",
            self.session.row_count(),
            self.session.total_count()
        );
        let table = Table::new(rows, widths)
            .header(header)
            .block(panel(&title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let metrics = self.controller.store().metrics().summary();
        let loading = self.loading.then(|| spinner(self.frame_count / 4));
        let line = status_line(
            self.session.total_count(),
            self.session.row_count(),
            self.session.page_size(),
            &metrics,
            loading,
        );
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let width = 46.min(area.width);
        let height = 14.min(area.height);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };

        let lines = vec![
            Line::from(" Tab / → / ←    change sort column"),
            Line::from(" 1-5            jump to sort column"),
            Line::from(" d / Space      toggle direction"),
            Line::from(" ↓ ↑ / j k      move selection"),
            Line::from(" PgDn / PgUp    move one screen"),
            Line::from(" g / G          first / last row"),
            Line::from(" ?              toggle this help"),
            Line::from(" q / Esc        quit"),
            Line::from(""),
            Line::from(Span::styled(
                " Scrolling past the last row loads more.",
                Style::default().fg(TEXT_DIM),
            )),
        ];

        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(panel("HELP")), popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::store::DealStore;
    use tokio::runtime::Handle;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_direction_follows_snapshot_on_reload() {
        let store = DealStore::new(StoreConfig::default());
        let (controller, events) = DealsController::new(store.clone(), Handle::current());
        let mut app = DealsApp::new(controller, events);
        assert_eq!(app.direction(), DirectionIndicator::Forward);

        // A direction event that lost a race with a later toggle
        store.toggle_direction();
        app.direction = DirectionIndicator::Forward;
        app.reload();
        assert_eq!(app.direction(), DirectionIndicator::Reversed);
    }
}
