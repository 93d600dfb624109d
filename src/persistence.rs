use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Maximum number of exchanges kept in the history
pub const MAX_HISTORY_ITEMS: usize = 20;

/// One finished exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub input: String,
    /// Rendered output markup
    #[serde(rename = "outputHtml")]
    pub output_html: String,
    pub model: String,
    /// ISO-8601 creation time, also the key for deletion
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn new(input: String, output_html: String, model: String) -> Self {
        Self {
            input,
            output_html,
            model,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Bounded, newest-first history of exchanges
///
/// Every mutation rewrites the whole collection.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<HistoryEntry>>;

    fn save(&self, entries: &[HistoryEntry]) -> Result<()>;

    /// Put `entry` in front and drop whatever falls beyond `cap`
    fn append_capped(&self, entry: HistoryEntry, cap: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.load()?;
        entries.insert(0, entry);
        entries.truncate(cap);
        self.save(&entries)?;
        Ok(entries)
    }

    /// Remove the entry with the given timestamp. Returns whether one was
    /// found; storage is left untouched otherwise.
    fn delete_by_key(&self, timestamp: &str) -> Result<bool> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|entry| entry.timestamp != timestamp);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        self.save(&[])
    }
}

/// History kept as a single JSON array in a file
pub struct FileHistoryStore {
    path: PathBuf,
    // Serializes load-modify-save cycles
    lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// `~/.config/quick-tl/history.json` (or the platform equivalent)
    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::settings::config_dir()?.join("history.json"))
    }

    pub fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        info!("Storing history in: {}", path.display());
        Ok(Self::new(path))
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        match serde_json::from_str::<Vec<HistoryEntry>>(&content) {
            Ok(entries) => {
                debug!("Loaded {} history entries", entries.len());
                Ok(entries)
            }
            Err(e) => {
                // An unreadable history is discarded rather than blocking every later save
                warn!(
                    "Discarding unreadable history file {}: {}",
                    self.path.display(),
                    e
                );
                std::fs::remove_file(&self.path).ok();
                Ok(Vec::new())
            }
        }
    }

    fn write_entries(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!("Saved {} history entries", entries.len());
        Ok(())
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        let _guard = self.locked();
        self.read_entries()
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        let _guard = self.locked();
        self.write_entries(entries)
    }

    fn append_capped(&self, entry: HistoryEntry, cap: usize) -> Result<Vec<HistoryEntry>> {
        let _guard = self.locked();
        let mut entries = self.read_entries()?;
        entries.insert(0, entry);
        entries.truncate(cap);
        self.write_entries(&entries)?;
        Ok(entries)
    }

    fn delete_by_key(&self, timestamp: &str) -> Result<bool> {
        let _guard = self.locked();
        let mut entries = self.read_entries()?;
        let before = entries.len();
        entries.retain(|entry| entry.timestamp != timestamp);
        if entries.len() == before {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.locked();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// History held in memory only
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryStore for InMemoryHistoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?
            .clone())
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        *self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))? = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            input: format!("input {n}"),
            output_html: format!("<p>output {n}</p>\n"),
            model: "llama3.2:3b".to_string(),
            timestamp: format!("2026-10-19T12:00:{n:02}.000Z"),
        }
    }

    fn file_store() -> (TempDir, FileHistoryStore) {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path().join("nested").join("history.json"));
        (dir, store)
    }

    #[test]
    fn test_entry_serializes_with_wire_names() {
        let json = serde_json::to_value(entry(1)).unwrap();
        assert_eq!(json["outputHtml"], "<p>output 1</p>\n");
        assert_eq!(json["timestamp"], "2026-10-19T12:00:01.000Z");
        assert!(json.get("output_html").is_none());
    }

    #[test]
    fn test_new_entry_timestamp_is_iso8601() {
        let entry = HistoryEntry::new("a".into(), "b".into(), "m".into());
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
        assert!(entry.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_append_is_newest_first_and_capped() {
        let (_dir, store) = file_store();
        for n in 0..25 {
            store.append_capped(entry(n), MAX_HISTORY_ITEMS).unwrap();
        }

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_ITEMS);
        assert_eq!(entries[0], entry(24));
        assert_eq!(entries[MAX_HISTORY_ITEMS - 1], entry(5));
    }

    #[test]
    fn test_delete_by_key() {
        let (_dir, store) = file_store();
        store.save(&[entry(3), entry(2), entry(1)]).unwrap();

        assert!(store.delete_by_key(&entry(2).timestamp).unwrap());
        assert_eq!(store.load().unwrap(), vec![entry(3), entry(1)]);
    }

    #[test]
    fn test_delete_unknown_key_leaves_storage_unchanged() {
        let (_dir, store) = file_store();
        store.save(&[entry(1)]).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        assert!(!store.delete_by_key("1999-01-01T00:00:00.000Z").unwrap());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_clear_on_empty_history_is_noop() {
        let (_dir, store) = file_store();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());

        let memory = InMemoryHistoryStore::default();
        memory.clear().unwrap();
        assert!(memory.load().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_entries() {
        let (_dir, store) = file_store();
        store.append_capped(entry(1), MAX_HISTORY_ITEMS).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let (_dir, store) = file_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());

        store.append_capped(entry(1), MAX_HISTORY_ITEMS).unwrap();
        assert_eq!(store.load().unwrap(), vec![entry(1)]);
    }

    #[test]
    fn test_in_memory_store_uses_default_operations() {
        let store = InMemoryHistoryStore::default();
        store.append_capped(entry(1), 2).unwrap();
        store.append_capped(entry(2), 2).unwrap();
        store.append_capped(entry(3), 2).unwrap();
        assert_eq!(store.load().unwrap(), vec![entry(3), entry(2)]);

        assert!(!store.delete_by_key("missing").unwrap());
        assert!(store.delete_by_key(&entry(3).timestamp).unwrap());
        assert_eq!(store.load().unwrap(), vec![entry(2)]);
    }
}
