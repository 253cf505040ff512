//! Artifact stores
//!
//! [`FsArtifactStore`] keeps each artifact as an executable wrapper script in
//! one directory, named by id, with its trigger bindings in a sidecar file.
//! [`MemoryArtifactStore`] is the in-process fake used by tests and benches.

use hookwarden_core::{
    ArtifactId, ArtifactRequest, ArtifactStore, Error, RepositoryId, RepositoryScope, Result,
    ScriptType, Trigger,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const SCRIPT_EXTENSION: &str = "hook";
const TRIGGERS_EXTENSION: &str = "triggers";

/// A live artifact held by [`MemoryArtifactStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Hook kind key
    pub hook: String,
    /// Pre or post script
    pub script_type: ScriptType,
    /// Repository served
    pub repository: RepositoryId,
    /// Display form of the source scope
    pub source: String,
    /// Resolved executable
    pub executable: PathBuf,
    /// Arguments
    pub arguments: Vec<String>,
    /// Bound triggers
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Default)]
struct MemoryArtifacts {
    live: BTreeMap<ArtifactId, StoredArtifact>,
    next: u64,
    created_total: usize,
    deleted_total: usize,
}

/// In-memory artifact store
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    inner: Mutex<MemoryArtifacts>,
    unavailable: AtomicBool,
}

impl MemoryArtifactStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StoreUnavailable` (or stop doing so)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryArtifacts>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("artifact store offline".to_string()));
        }
        self.inner
            .lock()
            .map_err(|_| Error::StoreUnavailable("artifact store lock poisoned".to_string()))
    }

    fn snapshot(&self) -> MutexGuard<'_, MemoryArtifacts> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Artifact by id, if live
    pub fn get(&self, id: ArtifactId) -> Option<StoredArtifact> {
        self.snapshot().live.get(&id).cloned()
    }

    /// Whether an artifact is live
    pub fn contains(&self, id: ArtifactId) -> bool {
        self.snapshot().live.contains_key(&id)
    }

    /// Number of live artifacts
    pub fn live_count(&self) -> usize {
        self.snapshot().live.len()
    }

    /// Live artifacts serving one repository
    pub fn for_repository(&self, repository: RepositoryId) -> Vec<(ArtifactId, StoredArtifact)> {
        self.snapshot()
            .live
            .iter()
            .filter(|(_, artifact)| artifact.repository == repository)
            .map(|(id, artifact)| (*id, artifact.clone()))
            .collect()
    }

    /// Total creations since the store was built
    pub fn created_total(&self) -> usize {
        self.snapshot().created_total
    }

    /// Total successful deletions since the store was built
    pub fn deleted_total(&self) -> usize {
        self.snapshot().deleted_total
    }

    /// Drop an artifact behind the caller's back, as an external cleanup would
    pub fn forget(&self, id: ArtifactId) {
        self.snapshot().live.remove(&id);
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn create(&self, request: &ArtifactRequest<'_>) -> Result<ArtifactId> {
        let mut inner = self.lock()?;
        inner.next += 1;
        inner.created_total += 1;
        let id = ArtifactId(inner.next);
        inner.live.insert(
            id,
            StoredArtifact {
                hook: request.hook.key().to_string(),
                script_type: request.script_type,
                repository: request.repository.id,
                source: request.source.to_string(),
                executable: request.executable.to_path_buf(),
                arguments: request.config.arguments.clone(),
                triggers: Vec::new(),
            },
        );
        Ok(id)
    }

    fn delete(&self, id: ArtifactId) -> Result<bool> {
        let mut inner = self.lock()?;
        let removed = inner.live.remove(&id).is_some();
        if removed {
            inner.deleted_total += 1;
        }
        Ok(removed)
    }

    fn bind_triggers(
        &self,
        id: ArtifactId,
        _repository: &RepositoryScope,
        triggers: &[Trigger],
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let artifact = inner
            .live
            .get_mut(&id)
            .ok_or_else(|| Error::StoreUnavailable(format!("Artifact {id} does not exist")))?;
        artifact.triggers = triggers.to_vec();
        Ok(())
    }
}

/// Directory-backed artifact store
///
/// Ids are allocated past the highest id found in the directory when the store
/// is opened. A file deleted outside hookwarden can still be referenced by a
/// script record, so callers holding records open the store with
/// [`FsArtifactStore::open_after`] to keep those ids out of reach too.
#[derive(Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
    next: AtomicU64,
}

impl FsArtifactStore {
    /// Open (creating if needed) an artifact directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_after(dir, None)
    }

    /// Open an artifact directory, allocating ids past `floor` as well as past
    /// every artifact on disk
    pub fn open_after(dir: impl Into<PathBuf>, floor: Option<ArtifactId>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::StoreUnavailable(format!(
                "Failed to create artifact directory {}: {e}",
                dir.display()
            ))
        })?;
        let on_disk = list_ids(&dir)?.into_iter().max();
        let highest = on_disk.max(floor).map_or(0, |id| id.0);
        tracing::debug!(dir = %dir.display(), highest, "Opened artifact directory");
        Ok(Self {
            dir,
            next: AtomicU64::new(highest + 1),
        })
    }

    /// Artifact directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of an artifact's wrapper script
    pub fn script_path(&self, id: ArtifactId) -> PathBuf {
        self.dir.join(format!("{id}.{SCRIPT_EXTENSION}"))
    }

    fn triggers_path(&self, id: ArtifactId) -> PathBuf {
        self.dir.join(format!("{id}.{TRIGGERS_EXTENSION}"))
    }

    /// Ids of every artifact in the directory, ascending
    pub fn list(&self) -> Result<Vec<ArtifactId>> {
        list_ids(&self.dir)
    }
}

fn list_ids(dir: &Path) -> Result<Vec<ArtifactId>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::StoreUnavailable(format!("Failed to read {}: {e}", dir.display()))
    })?;

    let mut ids = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse().ok())
        {
            ids.push(ArtifactId(id));
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Render the wrapper script for a request
fn render_script(request: &ArtifactRequest<'_>) -> String {
    let mut command = vec![request.executable.to_string_lossy().into_owned()];
    command.extend(request.config.arguments.iter().cloned());
    let command = shell_words::join(&command);

    let body = if request.config.run_async {
        format!("nohup {command} \"$@\" >/dev/null 2>&1 &\nexit 0")
    } else {
        format!("exec {command} \"$@\"")
    };

    format!(
        "#!/bin/sh\n# hookwarden {hook} ({script_type:?}) for {repository}, source {source}\n{body}\n",
        hook = request.hook.key(),
        script_type = request.script_type,
        repository = request.repository,
        source = request.source,
    )
}

impl ArtifactStore for FsArtifactStore {
    fn create(&self, request: &ArtifactRequest<'_>) -> Result<ArtifactId> {
        let id = ArtifactId(self.next.fetch_add(1, Ordering::SeqCst));
        let path = self.script_path(id);
        fs::write(&path, render_script(request)).map_err(|e| {
            Error::StoreUnavailable(format!("Failed to write {}: {e}", path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }

        Ok(id)
    }

    fn delete(&self, id: ArtifactId) -> Result<bool> {
        let script = self.script_path(id);
        if !script.exists() {
            return Ok(false);
        }
        fs::remove_file(&script).map_err(|e| {
            Error::StoreUnavailable(format!("Failed to remove {}: {e}", script.display()))
        })?;

        let triggers = self.triggers_path(id);
        if triggers.exists() {
            fs::remove_file(&triggers)?;
        }
        Ok(true)
    }

    fn bind_triggers(
        &self,
        id: ArtifactId,
        repository: &RepositoryScope,
        triggers: &[Trigger],
    ) -> Result<()> {
        if !self.script_path(id).exists() {
            return Err(Error::StoreUnavailable(format!("Artifact {id} does not exist")));
        }
        let content: String = triggers
            .iter()
            .map(|trigger| format!("{} {}\n", repository.id, trigger.id()))
            .collect();
        fs::write(self.triggers_path(id), content)?;
        Ok(())
    }
}
