//! [`StateStore`] implementations.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::SessionState;
use crate::core::{StateError, StateStore};

/// Keeps the state in a TOML file.
///
/// Saves go to a sibling temporary file which is synced, renamed over the
/// target, and then made durable by syncing the directory. `save` returns
/// only once the new state would survive a power loss; until then a crash
/// leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store at `path`. Nothing is read or written until used.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<SessionState>, StateError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&contents)?))
    }

    fn save(&mut self, state: &SessionState) -> Result<(), StateError> {
        let contents = toml::to_string_pretty(state)?;
        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &self.path)?;
        sync_parent(&self.path)?;
        trace!(path = %self.path.display(), nonce_counter = state.nonce_counter, "state saved");
        Ok(())
    }
}

/// Sync the directory holding `path` so a completed rename is durable.
fn sync_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[derive(Debug, Default)]
struct Shared {
    state: Option<SessionState>,
    saves: usize,
}

/// In-memory store. Clones share the same contents.
///
/// Counts saves, which makes persistence checkpoints observable.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Shared>>,
}

impl MemoryStateStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `state`.
    pub fn with_state(state: SessionState) -> Self {
        let store = Self::new();
        store.lock().state = Some(state);
        store
    }

    /// Most recently saved state.
    pub fn snapshot(&self) -> Option<SessionState> {
        self.lock().state.clone()
    }

    /// Number of saves so far.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // The guarded data is plain values; a panic elsewhere can't leave it torn
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<SessionState>, StateError> {
        Ok(self.snapshot())
    }

    fn save(&mut self, state: &SessionState) -> Result<(), StateError> {
        let mut shared = self.lock();
        shared.state = Some(state.clone());
        shared.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{LongTermKey, NoncePrefix, SessionKey};

    fn populated() -> SessionState {
        SessionState {
            long_term_key: Some(LongTermKey::from_bytes([0x11; 16])),
            auth_sequence: 7,
            session_key: Some(SessionKey::from_bytes([0x22; 32])),
            nonce_prefix: Some(NoncePrefix::from_bytes([0x33; 8])),
            nonce_counter: 1234,
            message_sequence: 5,
            command_sequence: 6,
        }
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStateStore::new(dir.path().join("pod.toml"));

        store.save(&populated()).unwrap();
        assert_eq!(store.load().unwrap(), Some(populated()));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_file_store_save_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStateStore::new(dir.path().join("pod.toml"));

        store.save(&populated()).unwrap();
        let mut next = populated();
        next.nonce_counter += 1;
        store.save(&next).unwrap();

        assert_eq!(store.load().unwrap(), Some(next));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_file_store_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStateStore::new(dir.path().join("absent").join("pod.toml"));
        assert!(matches!(store.save(&populated()), Err(StateError::Io(_))));
    }

    #[test]
    fn test_sync_parent_of_bare_file_name() {
        sync_parent(Path::new("pod-state.toml")).unwrap();
    }

    #[test]
    fn test_file_store_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("absent.toml"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_keys_are_hex() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStateStore::new(dir.path().join("pod.toml"));
        store.save(&populated()).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains(&"11".repeat(16)));
        assert!(contents.contains("nonce_counter = 1234"));
    }

    #[test]
    fn test_file_store_unpaired_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStateStore::new(dir.path().join("pod.toml"));

        store.save(&SessionState::default()).unwrap();
        assert_eq!(store.load().unwrap(), Some(SessionState::default()));
    }

    #[test]
    fn test_file_store_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pod.toml");
        fs::write(&path, "nonce_counter = \"many\"").unwrap();

        let store = FileStateStore::new(path);
        assert!(matches!(store.load(), Err(StateError::Deserialize(_))));
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let mut store = MemoryStateStore::new();
        let observer = store.clone();

        store.save(&populated()).unwrap();
        store.save(&populated()).unwrap();
        assert_eq!(observer.save_count(), 2);
        assert_eq!(observer.snapshot(), Some(populated()));
    }
}
