//! Progress bar utilities
//!
//! This module provides progress bar helpers using indicatif.

use hookwarden_engine::RebuildProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar for a rebuild of unknown size
///
/// The length is set from the first progress update.
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("#>-"));
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Mirror a rebuild progress handle onto a bar
pub fn update_progress_bar(pb: &ProgressBar, progress: &RebuildProgress) {
    if pb.length() != Some(progress.total) {
        pb.set_length(progress.total);
    }
    pb.set_position(progress.current);
}
