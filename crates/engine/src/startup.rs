//! Startup launch
//!
//! The catch-up rebuild may only start once every precondition has signalled
//! through the [`LaunchBarrier`]. Every node of a cluster reaches that point,
//! so the job itself claims a shared, time-limited run-once slot before doing
//! anything, optionally after a random delay that lets the nodes spread out.

use crate::coordinator::{Coordinator, TransitionReport};
use crate::rebuild::{RebuildProgress, Rebuilder};
use crate::state::{JOB_CLAIM_BUCKET, PersistentState};
use hookwarden_core::{Error, HostEnvironment, Result};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Job id of the startup rebuild
pub const STARTUP_JOB_ID: &str = "hookwarden.startup-rebuild";

/// How long a claim keeps other nodes from running the same job
pub const CLAIM_TTL: Duration = Duration::from_secs(10 * 60);

/// Preconditions of the startup launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchSignal {
    /// Configuration loaded
    ConfigLoaded,
    /// Record store opened
    StoreOpened,
    /// Host inventory and artifact store reachable
    HostReady,
}

impl LaunchSignal {
    /// Every signal the barrier waits for
    pub const ALL: [LaunchSignal; 3] = [Self::ConfigLoaded, Self::StoreOpened, Self::HostReady];
}

/// Counted-set barrier that fires exactly once
#[derive(Debug, Default)]
pub struct LaunchBarrier {
    seen: Mutex<HashSet<LaunchSignal>>,
    fired: AtomicBool,
}

impl LaunchBarrier {
    /// Barrier with no signals seen
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a signal
    ///
    /// Returns `true` for exactly one call: the one that completes the set.
    /// Repeated signals are counted once.
    pub fn signal(&self, signal: LaunchSignal) -> bool {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        seen.insert(signal);
        tracing::debug!(?signal, seen = seen.len(), "Launch signal");

        seen.len() == LaunchSignal::ALL.len()
            && self
                .fired
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    /// Whether the barrier has fired
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Signals still missing
    pub fn pending(&self) -> Vec<LaunchSignal> {
        let seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        LaunchSignal::ALL
            .into_iter()
            .filter(|signal| !seen.contains(signal))
            .collect()
    }

    /// Forget every signal, as on shutdown
    pub fn reset(&self) {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.fired.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
struct JobClaim {
    node: String,
    claimed_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Run-once claims in the shared record store
pub struct JobClaims<'a, P: PersistentState> {
    db: &'a P,
    ttl: Duration,
}

impl<'a, P: PersistentState> JobClaims<'a, P> {
    /// Claims with the default time-to-live
    pub fn new(db: &'a P) -> Self {
        Self { db, ttl: CLAIM_TTL }
    }

    /// Override the time-to-live
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Try to claim `job` for `node`
    ///
    /// Fails to claim while another node holds an unexpired claim.
    pub fn claim(&self, job: &str, node: &str) -> Result<bool> {
        let now = now_secs();
        if let Some(bytes) = self.db.get(JOB_CLAIM_BUCKET, job.as_bytes())?
            && let Ok((existing, _)) =
                bincode::decode_from_slice::<JobClaim, _>(&bytes, bincode::config::standard())
            && now.saturating_sub(existing.claimed_at) < self.ttl.as_secs()
        {
            tracing::debug!(job, holder = %existing.node, "Job already claimed");
            return Ok(false);
        }

        let claim = JobClaim {
            node: node.to_string(),
            claimed_at: now,
        };
        let bytes = bincode::encode_to_vec(&claim, bincode::config::standard())
            .map_err(|e| Error::StoreUnavailable(format!("Failed to encode job claim: {e}")))?;
        self.db.set(JOB_CLAIM_BUCKET, job.as_bytes(), &bytes)?;
        Ok(true)
    }

    /// Drop a claim
    pub fn release(&self, job: &str) -> Result<()> {
        self.db.delete(JOB_CLAIM_BUCKET, job.as_bytes())
    }
}

/// Random startup delay in `[0, max_offset)`, or zero on a single node
pub fn startup_delay(environment: &dyn HostEnvironment, max_offset: Duration) -> Duration {
    let max_millis = u64::try_from(max_offset.as_millis()).unwrap_or(u64::MAX);
    if environment.node_count() <= 1 || max_millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_millis))
}

/// The run-once startup rebuild
pub struct StartupJob<'c, 'a, P: PersistentState> {
    coordinator: &'c Coordinator<'a, P>,
    db: &'a P,
    node: String,
    max_offset: Duration,
}

impl<'c, 'a, P: PersistentState> StartupJob<'c, 'a, P> {
    /// Job for `node` running through `coordinator`
    pub fn new(coordinator: &'c Coordinator<'a, P>, db: &'a P, node: impl Into<String>) -> Self {
        Self {
            coordinator,
            db,
            node: node.into(),
            max_offset: Duration::ZERO,
        }
    }

    /// Upper bound of the random delay on multi-node deployments
    #[must_use]
    pub fn with_max_offset(mut self, max_offset: Duration) -> Self {
        self.max_offset = max_offset;
        self
    }

    /// Wait, claim and run
    ///
    /// Returns `None` when another node already claimed the job.
    pub fn run(
        &self,
        observer: &mut dyn FnMut(&RebuildProgress),
    ) -> Result<Option<(RebuildProgress, TransitionReport)>> {
        let delay = startup_delay(self.coordinator.host().environment, self.max_offset);
        if !delay.is_zero() {
            tracing::debug!(?delay, "Delaying startup job");
            std::thread::sleep(delay);
        }

        if !JobClaims::new(self.db).claim(STARTUP_JOB_ID, &self.node)? {
            tracing::info!(node = %self.node, "Startup job already running on another node");
            return Ok(None);
        }

        tracing::info!(node = %self.node, "Started job for creating hook scripts");
        let result = Rebuilder::new(self.coordinator, self.db).run(observer)?;
        tracing::info!(node = %self.node, report = %result.1, "Finished job for creating hook scripts");
        Ok(Some(result))
    }
}
