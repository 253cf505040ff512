//! Database helper for the script record store
//!
//! The record database lives in the configured state directory (by default the
//! XDG state directory) as `records.db`.

use crate::state::RedbPersistentState;
use hookwarden_core::{Error, Result};
use std::path::{Path, PathBuf};

/// File name of the record database
pub const DB_FILE_NAME: &str = "records.db";

/// Get the database path inside a state directory, creating the directory
///
/// # Errors
///
/// Returns an error if the state directory cannot be created
pub fn db_path(state_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(state_dir).map_err(|e| {
        Error::StoreUnavailable(format!(
            "Failed to create state directory {}: {e}",
            state_dir.display()
        ))
    })?;

    Ok(state_dir.join(DB_FILE_NAME))
}

/// Open the record database (creates if it doesn't exist)
///
/// # Errors
///
/// Returns an error if the database cannot be opened or created (e.g., permission
/// denied, another process holds the lock, corrupted database file)
pub fn open_db(state_dir: &Path) -> Result<RedbPersistentState> {
    let path = db_path(state_dir)?;
    tracing::debug!(path = %path.display(), "Opening record database");
    RedbPersistentState::new(&path).map_err(|e| {
        Error::StoreUnavailable(format!("Failed to open database at {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::state::{PersistentState, SCRIPT_RECORD_BUCKET};
    use tempfile::TempDir;

    #[test]
    fn test_db_path_creates_state_dir() {
        let temp = TempDir::new().unwrap();
        let state_dir = temp.path().join("nested").join("state");

        let path = db_path(&state_dir).unwrap();
        assert!(state_dir.is_dir());
        assert_eq!(path, state_dir.join("records.db"));
    }

    #[test]
    fn test_open_db_round_trip() {
        let temp = TempDir::new().unwrap();
        let db = open_db(temp.path()).unwrap();
        db.set(SCRIPT_RECORD_BUCKET, b"a", b"b").unwrap();
        assert_eq!(db.get(SCRIPT_RECORD_BUCKET, b"a").unwrap(), Some(b"b".to_vec()));
    }
}
