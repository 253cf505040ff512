//! Configuration management for hookwarden
//!
//! This crate handles:
//! - Configuration loading and path resolution
//! - XDG directory management
//! - Trigger overrides per hook kind
//! - The file-backed global policy source
//! - The file-backed host inventory
//! - Logging initialization

pub mod config;
pub mod dirs;
pub mod inventory;
pub mod logging;
pub mod policy;
pub mod triggers;

// Re-export error types from core
pub use hookwarden_core::{Error, Result};

pub use config::{Config, GeneralConfig};
pub use dirs::{config_dir, data_dir, default_config_file, state_dir};
pub use inventory::{HookSetting, HostInventory};
pub use policy::{FilePolicySource, GlobalHookEntry};
pub use triggers::TriggerSettings;
