//! Durable registry persistence.
//!
//! The registry is stored as one JSON array of [`SessionRecord`]s under a
//! single fixed slot key. The slot itself is abstracted behind
//! [`StorageSlot`] so hosts can supply whatever durable key-value string
//! storage they have; this module ships a file-backed implementation and an
//! in-memory one for tests.
//!
//! Loading is tolerant by contract: an absent slot or unparsable content
//! yields an empty registry, never an error. Cross-process change
//! notification is out of scope; the store does not watch the slot.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::SessionRecord;

/// Fixed slot key the registry lives under.
pub const STORED_GAMES_KEY: &str = "storedGames";

/// Durable key-value string storage, one string value per key.
///
/// Implementations must make `write` atomic from the caller's point of
/// view: a concurrent `read` sees either the old value or the new one,
/// never a partial write.
pub trait StorageSlot: Send + Sync {
    /// Reads the value for `key`, or `None` if the key has never been written.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Writes `value` under `key`, replacing any prior value.
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// File-backed slot: each key is a file inside a base directory.
///
/// The directory is created on first write. Writes go through a temp file
/// followed by a rename so readers never observe a partial value.
#[derive(Debug)]
pub struct FileSlot {
    base_dir: PathBuf,
}

impl FileSlot {
    /// Creates a slot rooted at the given directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Creates a slot at the platform data directory
    /// (e.g. `~/.local/share/game-roster` on Linux).
    ///
    /// Falls back to the current directory when the platform data
    /// directory cannot be determined.
    pub fn default_location() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("game-roster");
        Self::new(base)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl StorageSlot for FileSlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)
    }
}

/// In-memory slot for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot pre-seeded with a value for [`STORED_GAMES_KEY`].
    pub fn seeded(value: &str) -> Self {
        let slot = Self::new();
        slot.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(STORED_GAMES_KEY.to_string(), value.to_string());
        slot
    }
}

impl StorageSlot for MemorySlot {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persists the ordered registry sequence under [`STORED_GAMES_KEY`].
pub struct RegistryStore {
    slot: Box<dyn StorageSlot>,
}

impl std::fmt::Debug for RegistryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryStore").finish_non_exhaustive()
    }
}

impl RegistryStore {
    /// Creates a store over the given slot.
    pub fn new(slot: Box<dyn StorageSlot>) -> Self {
        Self { slot }
    }

    /// Loads the registry.
    ///
    /// Never fails the caller: an absent key, a slot read error, or
    /// unparsable content all yield an empty sequence. Parse and read
    /// failures are logged at warn level so corruption is visible without
    /// being fatal.
    pub fn load(&self) -> Vec<SessionRecord> {
        let content = match self.slot.read(STORED_GAMES_KEY) {
            Ok(Some(content)) => content,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read registry slot: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("registry slot held unparsable content, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Persists the full registry sequence, replacing prior content.
    pub fn save(&self, records: &[SessionRecord]) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(records).map_err(|source| StoreError::Serialize { source })?;
        self.slot
            .write(STORED_GAMES_KEY, &json)
            .map_err(|source| StoreError::Write { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> SessionRecord {
        SessionRecord::new(id.to_string(), format!("token-{id}"), format!("player-{id}"))
    }

    #[test]
    fn load_absent_slot_yields_empty() {
        let store = RegistryStore::new(Box::new(MemorySlot::new()));
        assert!(store.load().is_empty());
    }

    #[test]
    fn load_unparsable_slot_yields_empty() {
        let store = RegistryStore::new(Box::new(MemorySlot::seeded("{not valid}")));
        assert!(store.load().is_empty());
    }

    #[test]
    fn load_wrong_shape_yields_empty() {
        // Valid JSON, but not an array of records.
        let store = RegistryStore::new(Box::new(MemorySlot::seeded(r#"{"gameId":"g1"}"#)));
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_preserves_order() {
        let store = RegistryStore::new(Box::new(MemorySlot::new()));
        let records = vec![record("b"), record("a"), record("c")];
        store.save(&records).expect("save should succeed");

        let loaded = store.load();
        let ids: Vec<&str> = loaded.iter().map(|r| r.game_id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn save_replaces_prior_content() {
        let store = RegistryStore::new(Box::new(MemorySlot::new()));
        store.save(&[record("a"), record("b")]).expect("save");
        store.save(&[record("c")]).expect("save");

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].game_id, "c");
    }

    #[test]
    fn default_location_is_under_the_app_data_dir() {
        let slot = FileSlot::default_location();
        let debug = format!("{slot:?}");
        assert!(debug.contains("game-roster"));
    }

    #[test]
    fn file_slot_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slot = FileSlot::new(dir.path().to_path_buf());

        assert!(slot.read(STORED_GAMES_KEY).expect("read").is_none());
        slot.write(STORED_GAMES_KEY, "[]").expect("write");
        assert_eq!(
            slot.read(STORED_GAMES_KEY).expect("read").as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn file_slot_creates_base_dir_on_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("does/not/exist");
        let slot = FileSlot::new(nested.clone());

        slot.write(STORED_GAMES_KEY, "[]").expect("write");
        assert!(nested.join("storedGames.json").exists());
    }

    #[test]
    fn file_backed_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RegistryStore::new(Box::new(FileSlot::new(dir.path().to_path_buf())));

        store.save(&[record("g1")]).expect("save");
        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].game_id, "g1");
        assert_eq!(loaded[0].access_token, "token-g1");
    }

    #[test]
    fn file_backed_store_tolerates_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("storedGames.json"), "{not valid}").expect("write");
        let store = RegistryStore::new(Box::new(FileSlot::new(dir.path().to_path_buf())));
        assert!(store.load().is_empty());
    }
}
