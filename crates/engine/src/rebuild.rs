//! Bulk rebuild
//!
//! Walks the whole inventory twice: once to count the units (projects plus
//! repositories), then again to reconcile every repository. A progress handle
//! is persisted after each unit so other processes can poll it by id.

use crate::coordinator::{Coordinator, InstallMode, TransitionReport};
use crate::state::{PersistentState, REBUILD_PROGRESS_BUCKET};
use crate::walker::{WalkVisitor, Walker};
use hookwarden_core::{Error, GlobalPolicies, ProjectScope, RepositoryScope, Result};
use serde::{Deserialize, Serialize};

/// Pollable state of one rebuild
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct RebuildProgress {
    /// Handle id
    pub id: u64,
    /// Whether the apply pass has begun
    pub started: bool,
    /// Whether the rebuild is over; terminal
    pub finished: bool,
    /// Whether the rebuild stopped before reaching every unit; terminal, and
    /// `finished` stays false
    pub aborted: bool,
    /// Units processed so far
    pub current: u64,
    /// Units to process
    pub total: u64,
}

impl RebuildProgress {
    fn new(id: u64) -> Self {
        Self {
            id,
            started: false,
            finished: false,
            aborted: false,
            current: 0,
            total: 0,
        }
    }

    /// Completion ratio in `[0, 1]`
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        self.current as f64 / self.total as f64
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::StoreUnavailable(format!("Failed to encode progress: {e}")))
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .ok()
            .map(|(progress, _len)| progress)
    }
}

/// Persisted rebuild progress handles
pub struct ProgressStore<'a, P: PersistentState> {
    db: &'a P,
}

impl<'a, P: PersistentState> ProgressStore<'a, P> {
    /// Wrap a state store
    pub fn new(db: &'a P) -> Self {
        Self { db }
    }

    /// Allocate a fresh handle with an id above every stored one
    pub fn create(&self) -> Result<RebuildProgress> {
        let next = self.latest()?.map_or(1, |p| p.id + 1);
        let progress = RebuildProgress::new(next);
        self.save(&progress)?;
        Ok(progress)
    }

    /// Persist a handle
    pub fn save(&self, progress: &RebuildProgress) -> Result<()> {
        self.db.set(
            REBUILD_PROGRESS_BUCKET,
            &progress.id.to_be_bytes(),
            &progress.to_bytes()?,
        )
    }

    /// Load a handle by id
    pub fn get(&self, id: u64) -> Result<Option<RebuildProgress>> {
        Ok(self
            .db
            .get(REBUILD_PROGRESS_BUCKET, &id.to_be_bytes())?
            .and_then(|bytes| RebuildProgress::from_bytes(&bytes)))
    }

    /// Handle with the highest id
    pub fn latest(&self) -> Result<Option<RebuildProgress>> {
        let mut latest: Option<RebuildProgress> = None;
        self.db.for_each(REBUILD_PROGRESS_BUCKET, |_, value| {
            if let Some(progress) = RebuildProgress::from_bytes(value)
                && latest.is_none_or(|l| progress.id > l.id)
            {
                latest = Some(progress);
            }
            Ok(())
        })?;
        Ok(latest)
    }
}

#[derive(Default)]
struct Counter {
    units: u64,
}

impl WalkVisitor for Counter {
    fn on_project(&mut self, _project: &ProjectScope) -> Result<()> {
        self.units += 1;
        Ok(())
    }

    fn on_repository(&mut self, _repository: &RepositoryScope) -> Result<()> {
        self.units += 1;
        Ok(())
    }
}

struct ApplyPass<'r, 'a, P: PersistentState> {
    rebuilder: &'r Rebuilder<'r, 'a, P>,
    policies: &'r GlobalPolicies,
    progress: RebuildProgress,
    report: TransitionReport,
    observer: &'r mut dyn FnMut(&RebuildProgress),
}

impl<P: PersistentState> ApplyPass<'_, '_, P> {
    fn advance(&mut self) {
        self.progress.current = (self.progress.current + 1).min(self.progress.total);
        self.rebuilder.persist(&self.progress);
        (self.observer)(&self.progress);
    }
}

impl<P: PersistentState> WalkVisitor for ApplyPass<'_, '_, P> {
    fn on_project(&mut self, project: &ProjectScope) -> Result<()> {
        tracing::trace!(project = %project.key, "Rebuilding project");
        self.advance();
        Ok(())
    }

    fn on_repository(&mut self, repository: &RepositoryScope) -> Result<()> {
        self.report += self.rebuilder.coordinator.reconcile_repository(
            repository,
            self.policies,
            self.rebuilder.mode,
        );
        self.advance();
        Ok(())
    }
}

/// Rebuilds every hook script in the inventory
pub struct Rebuilder<'c, 'a, P: PersistentState> {
    coordinator: &'c Coordinator<'a, P>,
    progress: ProgressStore<'a, P>,
    mode: InstallMode,
    page_size: usize,
}

impl<'c, 'a, P: PersistentState> Rebuilder<'c, 'a, P> {
    /// Rebuild through `coordinator`, persisting progress in `db`
    pub fn new(coordinator: &'c Coordinator<'a, P>, db: &'a P) -> Self {
        Self {
            coordinator,
            progress: ProgressStore::new(db),
            mode: InstallMode::Replace,
            page_size: crate::walker::DEFAULT_PAGE_SIZE,
        }
    }

    /// Choose how winning sources are installed
    #[must_use]
    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the inventory page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Progress handle store
    pub fn progress(&self) -> &ProgressStore<'a, P> {
        &self.progress
    }

    fn persist(&self, progress: &RebuildProgress) {
        if let Err(e) = self.progress.save(progress) {
            tracing::warn!(id = progress.id, error = %e, "Failed to persist rebuild progress");
        }
    }

    /// Run a full rebuild
    ///
    /// `observer` sees every progress update, ending with the finished handle.
    /// If the inventory cannot be walked the handle is marked aborted before
    /// the error is returned, so pollers never wait on it.
    pub fn run(
        &self,
        observer: &mut dyn FnMut(&RebuildProgress),
    ) -> Result<(RebuildProgress, TransitionReport)> {
        let mut progress = self.progress.create()?;
        tracing::info!(id = progress.id, "Rebuilding hook scripts");

        match self.apply(&mut progress, observer) {
            Ok(report) => {
                progress.current = progress.total;
                progress.finished = true;
                self.persist(&progress);
                observer(&progress);

                tracing::info!(
                    id = progress.id,
                    total = progress.total,
                    created = report.created,
                    failed = report.failed,
                    "Rebuild finished"
                );
                Ok((progress, report))
            }
            Err(e) => {
                progress.aborted = true;
                self.persist(&progress);
                observer(&progress);

                tracing::error!(
                    id = progress.id,
                    current = progress.current,
                    total = progress.total,
                    error = %e,
                    "Rebuild aborted"
                );
                Err(e)
            }
        }
    }

    /// Count then reconcile every unit, keeping `progress` current
    fn apply(
        &self,
        progress: &mut RebuildProgress,
        observer: &mut dyn FnMut(&RebuildProgress),
    ) -> Result<TransitionReport> {
        let policies = self.coordinator.snapshot()?;
        let walker = Walker::new(self.coordinator.host().inventory).with_page_size(self.page_size);

        let mut counter = Counter::default();
        walker.walk(&mut counter)?;
        progress.total = counter.units;
        progress.started = true;
        self.persist(progress);
        observer(&*progress);

        let mut pass = ApplyPass {
            rebuilder: self,
            policies: &policies,
            progress: *progress,
            report: TransitionReport::default(),
            observer: &mut *observer,
        };
        let walked = walker.walk(&mut pass);
        *progress = pass.progress;
        walked?;
        Ok(pass.report)
    }
}
