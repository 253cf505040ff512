//! CLI command implementations
//!
//! This module contains all command implementations for the hookwarden CLI.

pub mod event;
pub mod progress;
pub mod rebuild;
pub mod start;
pub mod status;
pub mod validate;
