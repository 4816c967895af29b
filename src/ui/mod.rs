//! UI rendering module for the dare admin console
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod dare_table;
pub mod help_overlay;

pub use dare_table::render_dare_table;
pub use help_overlay::render as render_help_overlay;
