//! Script records
//!
//! A script record maps a (hook, source scope, repository) triple to the id of
//! the artifact installed for it. The key layout is
//!
//! ```text
//! {hookKey}:{sourceScopeType}:{sourceScopeId}:{repositoryScopeType}:{repositoryId}
//! ```
//!
//! and must stay byte-stable: records written by one release are read and
//! deleted by the next.

use crate::state::{PersistentState, SCRIPT_RECORD_BUCKET, hash_data};
use hookwarden_core::{
    ArtifactId, Error, HookConfig, HookKind, RepositoryId, RepositoryScope, Result, Scope,
    ScopeType, Trigger,
};
use std::fmt;
use std::str::FromStr;

/// Composite key of a script record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Hook kind
    pub hook: HookKind,
    /// Level of the scope whose configuration produced the artifact
    pub source_type: ScopeType,
    /// Id token of that scope (`global` for the global scope)
    pub source_id: String,
    /// Repository the artifact is installed in
    pub repository: RepositoryId,
}

impl RecordKey {
    /// Key for an artifact installed in `repository` from `source`
    pub fn new(hook: HookKind, source: &Scope, repository: &RepositoryScope) -> Self {
        Self {
            hook,
            source_type: source.scope_type(),
            source_id: source.id_token(),
            repository: repository.id,
        }
    }

    /// Key bytes as stored
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.hook.key(),
            self.source_type,
            self.source_id,
            ScopeType::Repository,
            self.repository
        )
    }
}

impl FromStr for RecordKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::StoreUnavailable(format!("Malformed script record key: {s}"));

        // Hook keys may carry a plugin prefix containing ':', so split from the right
        let mut parts = s.rsplitn(5, ':');
        let repository = parts.next().ok_or_else(invalid)?;
        let repository_type = parts.next().ok_or_else(invalid)?;
        let source_id = parts.next().ok_or_else(invalid)?;
        let source_type = parts.next().ok_or_else(invalid)?;
        let hook = parts.next().ok_or_else(invalid)?;

        if repository_type != ScopeType::Repository.as_str() {
            return Err(invalid());
        }

        Ok(Self {
            hook: HookKind::from_key(hook).ok_or_else(invalid)?,
            source_type: source_type.parse().map_err(|_| invalid())?,
            source_id: source_id.to_string(),
            repository: RepositoryId(repository.parse().map_err(|_| invalid())?),
        })
    }
}

/// Stored value of a script record
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ScriptRecord {
    /// Installed artifact
    pub artifact_id: u64,
    /// Fingerprint of the configuration and triggers the artifact was built from
    pub fingerprint: Vec<u8>,
}

impl ScriptRecord {
    /// Create a record
    pub fn new(artifact_id: ArtifactId, fingerprint: Vec<u8>) -> Self {
        Self {
            artifact_id: artifact_id.0,
            fingerprint,
        }
    }

    /// Installed artifact id
    pub fn artifact(&self) -> ArtifactId {
        ArtifactId(self.artifact_id)
    }

    /// Short hex form of the fingerprint for display
    pub fn short_fingerprint(&self) -> String {
        hex::encode(self.fingerprint.iter().take(6).copied().collect::<Vec<_>>())
    }

    /// Serialize to bytes for database storage using bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::StoreUnavailable(format!("Failed to encode script record: {e}")))
    }

    /// Deserialize from bytes using bincode
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .ok()
            .map(|(record, _len)| record)
    }
}

/// Fingerprint of what an artifact runs and when
pub fn fingerprint(config: &HookConfig, triggers: &[Trigger]) -> Vec<u8> {
    let mut data = Vec::new();
    for part in [
        config.executable_path.as_str(),
        if config.run_async { "async" } else { "sync" },
        if config.safe_mode { "safe" } else { "unsafe" },
    ] {
        data.extend_from_slice(part.as_bytes());
        data.push(0);
    }
    for argument in &config.arguments {
        data.extend_from_slice(argument.as_bytes());
        data.push(0);
    }
    data.push(0xff);
    for trigger in triggers {
        data.extend_from_slice(trigger.id().as_bytes());
        data.push(0);
    }
    hash_data(&data)
}

/// Typed access to the script record bucket
pub struct ScriptRecords<'a, P: PersistentState> {
    db: &'a P,
}

impl<'a, P: PersistentState> ScriptRecords<'a, P> {
    /// Wrap a state store
    pub fn new(db: &'a P) -> Self {
        Self { db }
    }

    /// Load a record
    pub fn get(&self, key: &RecordKey) -> Result<Option<ScriptRecord>> {
        match self.db.get(SCRIPT_RECORD_BUCKET, &key.to_bytes())? {
            Some(bytes) => ScriptRecord::from_bytes(&bytes).map(Some).ok_or_else(|| {
                Error::StoreUnavailable(format!("Failed to decode script record {key}"))
            }),
            None => Ok(None),
        }
    }

    /// Store a record, replacing any previous one
    pub fn put(&self, key: &RecordKey, record: &ScriptRecord) -> Result<()> {
        self.db
            .set(SCRIPT_RECORD_BUCKET, &key.to_bytes(), &record.to_bytes()?)
    }

    /// Remove a record
    pub fn remove(&self, key: &RecordKey) -> Result<()> {
        self.db.delete(SCRIPT_RECORD_BUCKET, &key.to_bytes())
    }

    /// Every record, sorted by key
    ///
    /// Keys that do not parse are skipped with a warning.
    pub fn all(&self) -> Result<Vec<(RecordKey, ScriptRecord)>> {
        let mut records = Vec::new();
        self.db.for_each(SCRIPT_RECORD_BUCKET, |key, value| {
            let key = String::from_utf8_lossy(key);
            match (key.parse::<RecordKey>(), ScriptRecord::from_bytes(value)) {
                (Ok(parsed), Some(record)) => records.push((parsed, record)),
                _ => tracing::warn!(key = %key, "Skipping unreadable script record"),
            }
            Ok(())
        })?;
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    /// Highest artifact id any record still points at
    pub fn highest_artifact(&self) -> Result<Option<ArtifactId>> {
        Ok(self.all()?.into_iter().map(|(_, record)| record.artifact()).max())
    }

    /// Every record installed in one repository, whatever its hook or source
    pub fn for_repository(&self, repository: RepositoryId) -> Result<Vec<(RecordKey, ScriptRecord)>> {
        let mut records = self.all()?;
        records.retain(|(key, _)| key.repository == repository);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::state::MockPersistentState;
    use hookwarden_core::ProjectScope;

    fn repo() -> RepositoryScope {
        RepositoryScope::new(42, "app", ProjectScope::new(7, "PROJ"))
    }

    #[test]
    fn test_key_layout_is_stable() {
        let repo = repo();
        let cases = [
            (
                Scope::Global,
                "external-pre-receive-hook:GLOBAL:global:REPOSITORY:42",
            ),
            (
                Scope::Project(repo.project.clone()),
                "external-pre-receive-hook:PROJECT:7:REPOSITORY:42",
            ),
            (
                Scope::Repository(repo.clone()),
                "external-pre-receive-hook:REPOSITORY:42:REPOSITORY:42",
            ),
        ];
        for (source, expected) in cases {
            let key = RecordKey::new(HookKind::PreReceive, &source, &repo);
            assert_eq!(key.to_string(), expected);
            assert_eq!(expected.parse::<RecordKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_key_parses_plugin_qualified_hook() {
        let key: RecordKey =
            "com.ngs.stash.externalhooks.external-hooks:external-merge-check-hook:PROJECT:7:REPOSITORY:9"
                .parse()
                .unwrap();
        assert_eq!(key.hook, HookKind::MergeCheck);
        assert_eq!(key.source_type, ScopeType::Project);
        assert_eq!(key.repository, RepositoryId(9));
    }

    #[test]
    fn test_malformed_keys() {
        for bad in [
            "",
            "external-pre-receive-hook:GLOBAL:global:PROJECT:42",
            "external-pre-receive-hook:GLOBAL:global:REPOSITORY:abc",
            "unknown-hook:GLOBAL:global:REPOSITORY:1",
            "external-pre-receive-hook:NOWHERE:1:REPOSITORY:1",
        ] {
            assert!(bad.parse::<RecordKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_fingerprint_tracks_config_and_triggers() {
        let config = HookConfig::new("/bin/check").with_arguments(["a"]);
        let base = fingerprint(&config, &[Trigger::RepoPush]);

        assert_eq!(base, fingerprint(&config, &[Trigger::RepoPush]));
        assert_ne!(base, fingerprint(&config, &[Trigger::RepoPush, Trigger::FileEdit]));
        assert_ne!(
            base,
            fingerprint(&config.clone().with_async(true), &[Trigger::RepoPush])
        );
        assert_ne!(
            fingerprint(&HookConfig::new("ab"), &[]),
            fingerprint(&HookConfig::new("a").with_arguments(["b"]), &[])
        );
    }

    #[test]
    fn test_records_crud_and_scan() {
        let db = MockPersistentState::new();
        let records = ScriptRecords::new(&db);
        let repo = repo();
        let other = RepositoryScope::new(43, "lib", repo.project.clone());

        let global = RecordKey::new(HookKind::PreReceive, &Scope::Global, &repo);
        let project = RecordKey::new(
            HookKind::MergeCheck,
            &Scope::Project(repo.project.clone()),
            &repo,
        );
        let elsewhere = RecordKey::new(HookKind::PreReceive, &Scope::Global, &other);

        records.put(&global, &ScriptRecord::new(ArtifactId(1), vec![1])).unwrap();
        records.put(&project, &ScriptRecord::new(ArtifactId(2), vec![2])).unwrap();
        records.put(&elsewhere, &ScriptRecord::new(ArtifactId(3), vec![3])).unwrap();

        assert_eq!(records.get(&global).unwrap().unwrap().artifact(), ArtifactId(1));
        assert_eq!(records.all().unwrap().len(), 3);

        let in_repo = records.for_repository(repo.id).unwrap();
        assert_eq!(in_repo.len(), 2);
        assert!(in_repo.iter().all(|(key, _)| key.repository == repo.id));

        records.remove(&global).unwrap();
        assert!(records.get(&global).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_record_is_store_error() {
        let db = MockPersistentState::new();
        let key = RecordKey::new(HookKind::PreReceive, &Scope::Global, &repo());
        db.set(SCRIPT_RECORD_BUCKET, &key.to_bytes(), &[0xff, 0xff, 0xff])
            .unwrap();

        let records = ScriptRecords::new(&db);
        assert!(matches!(records.get(&key), Err(Error::StoreUnavailable(_))));
        // Scans skip the unreadable entry instead of failing
        assert!(records.all().unwrap().is_empty());
    }
}
