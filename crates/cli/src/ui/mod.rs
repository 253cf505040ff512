//! Terminal UI components for hookwarden
//!
//! - Progress bars for bulk rebuilds

pub mod progress;

pub use progress::{create_progress_bar, create_spinner};
