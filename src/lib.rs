//! Deals Viewer Library
//!
//! Live, sorted, paginated view over a stream of trade records.
//! The binary wires these modules to a terminal renderer; tests drive them
//! directly.

pub mod config;
pub mod controller;
pub mod feed;
pub mod models;
pub mod render;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod tui;

pub use config::DealsConfig;
pub use controller::{DealsController, ViewEvent};
pub use models::{Deal, Side, SortKey};
pub use render::RenderSession;
pub use shutdown::ShutdownToken;
pub use store::{DealStore, StoreSnapshot};
