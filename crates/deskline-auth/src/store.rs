// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential store implementations.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use deskline_core::{CredentialStore, DesklineError, StoredSession};
use tracing::debug;

fn storage_error(e: impl std::error::Error + Send + Sync + 'static) -> DesklineError {
    DesklineError::Storage {
        source: Box::new(e),
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    session: Mutex<Option<StoredSession>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out holding `session`.
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>, DesklineError> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), DesklineError> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), DesklineError> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// JSON file store. A missing file means "logged out".
///
/// Writes go through a sibling temp file and a rename, and the file is
/// restricted to the owner on Unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<StoredSession>, DesklineError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };
        serde_json::from_str(&data).map(Some).map_err(storage_error)
    }

    fn save(&self, session: &StoredSession) -> Result<(), DesklineError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(storage_error)?;
        }

        let data = serde_json::to_string_pretty(session).map_err(storage_error)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = create_private(&tmp).map_err(storage_error)?;
        file.write_all(data.as_bytes()).map_err(storage_error)?;
        file.sync_all().map_err(storage_error)?;
        drop(file);

        std::fs::rename(&tmp, &self.path).map_err(storage_error)?;
        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), DesklineError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

/// Create `path` readable by the owner only. A leftover file is removed
/// first so its mode cannot carry over.
fn create_private(path: &Path) -> std::io::Result<File> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskline_core::{Credential, Role};

    fn session() -> StoredSession {
        StoredSession {
            credential: Credential::new("access-1", "refresh-1"),
            role: Some(Role::Usuario),
            user: None,
        }
    }

    #[test]
    fn memory_store_update_access_keeps_refresh() {
        let store = MemoryCredentialStore::with_session(session());
        store.update_access("access-2").unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.credential.access_token, "access-2");
        assert_eq!(loaded.credential.refresh_token, "refresh-1");
        assert_eq!(loaded.role, Some(Role::Usuario));
    }

    #[test]
    fn update_access_without_session_fails() {
        let store = MemoryCredentialStore::new();
        assert!(store.update_access("x").is_err());
    }

    #[test]
    fn file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/session.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&session()).unwrap();
        assert_eq!(store.load().unwrap(), Some(session()));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("session.json"));
        store.save(&session()).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn temp_file_is_owner_only_before_any_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("session.json.tmp");
        std::fs::write(&tmp, "stale").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let file = create_private(&tmp).unwrap();
        let mode = file.metadata().unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(file.metadata().unwrap().len(), 0);
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileCredentialStore::new(path);
        assert!(matches!(store.load(), Err(DesklineError::Storage { .. })));
    }
}
