//! TUI Renderer
//!
//! Handles terminal setup, event loop, and rendering. Runs on the calling
//! thread, which acts as the UI thread: it only pulls snapshots and forwards
//! gestures to the controller.

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::app::DealsApp;
use crate::controller::{DealsController, ViewEvent};

pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Initialize terminal for TUI
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore terminal to normal state
pub fn restore_terminal(terminal: &mut TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Main event loop
pub fn run_event_loop(
    terminal: &mut TuiTerminal,
    app: &mut DealsApp,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();

    while app.running {
        terminal.draw(|f| app.render(f))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }
    }

    Ok(())
}

/// Run the viewer until the user quits. The terminal is restored even when
/// the loop fails.
pub fn run(
    controller: Arc<DealsController>,
    events: mpsc::UnboundedReceiver<ViewEvent>,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    let mut terminal = init_terminal().context("Failed to initialize terminal")?;
    let mut app = DealsApp::new(controller, events);

    let result = run_event_loop(&mut terminal, &mut app, tick_rate);

    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    result.context("TUI event loop failed")
}
