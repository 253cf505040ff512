//! Deployment facts for a locally configured host

use hookwarden_config::Config;
use hookwarden_core::{HostEnvironment, Result};
use std::path::{Path, PathBuf};

/// Fixed deployment facts
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    clustered: bool,
    nodes: usize,
    admin: bool,
    home: PathBuf,
}

impl StaticEnvironment {
    /// Single-node environment rooted at `home`
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            clustered: false,
            nodes: 1,
            admin: false,
            home: home.into(),
        }
    }

    /// Build from the `[general]` configuration section
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            clustered: config.general.clustered,
            nodes: config.general.nodes.max(1),
            admin: config.general.admin,
            home: config.home_dir()?,
        })
    }

    /// Mark the deployment as a cluster of `nodes` nodes
    #[must_use]
    pub fn clustered(mut self, nodes: usize) -> Self {
        self.clustered = true;
        self.nodes = nodes.max(1);
        self
    }

    /// Set whether the caller is a system administrator
    #[must_use]
    pub fn admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }
}

impl HostEnvironment for StaticEnvironment {
    fn is_clustered(&self) -> bool {
        self.clustered
    }

    fn node_count(&self) -> usize {
        self.nodes
    }

    fn caller_is_admin(&self) -> bool {
        self.admin
    }

    fn home_dir(&self) -> &Path {
        &self.home
    }
}
