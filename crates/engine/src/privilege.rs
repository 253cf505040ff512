//! Scoped elevated privilege
//!
//! Artifact operations run with the host's elevated-privilege capability. The
//! [`Elevated`] guard releases it when dropped, so early returns and `?` never
//! leak an acquisition.

use hookwarden_core::{Error, PrivilegeProvider, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Held elevated privilege, released on drop
#[must_use = "privilege is released as soon as the guard is dropped"]
pub struct Elevated<'a> {
    provider: &'a dyn PrivilegeProvider,
}

impl<'a> Elevated<'a> {
    /// Acquire the capability from `provider`
    pub fn acquire(provider: &'a dyn PrivilegeProvider, reason: &str) -> Result<Self> {
        provider.acquire(reason)?;
        Ok(Self { provider })
    }
}

impl Drop for Elevated<'_> {
    fn drop(&mut self) {
        self.provider.release();
    }
}

/// Privilege provider for a single local process
///
/// Grants or denies every request according to `allowed` and counts
/// acquisitions so callers can verify nothing is left held.
#[derive(Debug, Default)]
pub struct LocalPrivilege {
    allowed: bool,
    held: AtomicUsize,
    acquired_total: AtomicUsize,
}

impl LocalPrivilege {
    /// Create a provider
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed,
            ..Self::default()
        }
    }

    /// Acquisitions not yet released
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Successful acquisitions since creation
    pub fn acquired_total(&self) -> usize {
        self.acquired_total.load(Ordering::SeqCst)
    }
}

impl PrivilegeProvider for LocalPrivilege {
    fn acquire(&self, reason: &str) -> Result<()> {
        if !self.allowed {
            tracing::warn!(reason, "Elevated privilege denied");
            return Err(Error::PrivilegeDenied(format!(
                "elevation is disabled (needed to {reason})"
            )));
        }
        tracing::trace!(reason, "Elevated privilege acquired");
        self.held.fetch_add(1, Ordering::SeqCst);
        self.acquired_total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        // Saturate so an unmatched release cannot wrap the counter
        let _ = self
            .held
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}
