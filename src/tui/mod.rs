//! Deals TUI - terminal renderer for the deal list
//!
//! - Header tabs select the sort column, the direction indicator sits on the
//!   right of the header
//! - The table draws one `RenderSession` per reload
//! - Reaching the last row of the page grows the page

pub mod app;
pub mod renderer;
pub mod widgets;

pub use app::DealsApp;
