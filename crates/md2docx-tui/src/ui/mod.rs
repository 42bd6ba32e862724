//! Terminal UI module using ratatui.
//!
//! - `render`: screen rendering for the home, redirect prompt and callback routes
//! - `input`: keyboard and paste handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
