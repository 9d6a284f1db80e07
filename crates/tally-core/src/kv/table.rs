//! Storage behind the caching helpers.
//!
//! A table maps string keys to [`Item`]s. Updates are expressed as
//! [`Update`] actions applied atomically per call, with the semantics of a
//! document store's `ADD`, `DELETE`, `SET` and `REMOVE` clauses: updating a
//! missing key creates it, and a string set emptied by a delete disappears.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from table backends.
#[derive(Error, Debug)]
pub enum TableError {
    /// The backing file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// The table file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a valid table.
    #[error("{path} is not a valid table: {source}")]
    Corrupt {
        /// The table file.
        path: Utf8PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result alias for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// One stored item. Every column is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Integer counter.
    #[serde(rename = "intCount", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// String set; never stored empty.
    #[serde(rename = "stringSet", default, skip_serializing_if = "Option::is_none")]
    pub string_set: Option<BTreeSet<String>>,
    /// JSON-encoded object.
    #[serde(rename = "dictionary", default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<String>,
    /// Epoch seconds after which the item is logically expired.
    #[serde(rename = "expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// A single update action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// `ADD count :n`; a missing counter starts at 0.
    AddCount(i64),
    /// `ADD stringSet :ss`.
    AddToSet(BTreeSet<String>),
    /// `DELETE stringSet :ss`.
    DeleteFromSet(BTreeSet<String>),
    /// `SET expiresAt = :t`.
    SetExpiresAt(i64),
    /// `REMOVE stringSet`.
    RemoveStringSet,
}

impl Item {
    /// Apply one update in place.
    pub fn apply(&mut self, update: &Update) {
        match update {
            Update::AddCount(n) => {
                self.count = Some(self.count.unwrap_or(0).saturating_add(*n));
            }
            Update::AddToSet(values) => {
                if !values.is_empty() {
                    self.string_set
                        .get_or_insert_with(BTreeSet::new)
                        .extend(values.iter().cloned());
                }
            }
            Update::DeleteFromSet(values) => {
                if let Some(set) = self.string_set.as_mut() {
                    set.retain(|v| !values.contains(v));
                    if set.is_empty() {
                        self.string_set = None;
                    }
                }
            }
            Update::SetExpiresAt(t) => self.expires_at = Some(*t),
            Update::RemoveStringSet => self.string_set = None,
        }
    }
}

/// A key-value table.
pub trait KvTable: Send + Sync {
    /// Fetch an item.
    fn get(&self, key: &str) -> TableResult<Option<Item>>;

    /// Replace an item entirely.
    fn put(&self, key: &str, item: Item) -> TableResult<()>;

    /// Apply updates to an item (creating it if missing) and return the
    /// updated item.
    fn update(&self, key: &str, updates: &[Update]) -> TableResult<Item>;
}

/// In-process table.
#[derive(Debug, Default)]
pub struct MemoryTable {
    items: Mutex<HashMap<String, Item>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvTable for MemoryTable {
    fn get(&self, key: &str) -> TableResult<Option<Item>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn put(&self, key: &str, item: Item) -> TableResult<()> {
        self.items.lock().insert(key.to_string(), item);
        Ok(())
    }

    fn update(&self, key: &str, updates: &[Update]) -> TableResult<Item> {
        let mut items = self.items.lock();
        let item = items.entry(key.to_string()).or_default();
        for update in updates {
            item.apply(update);
        }
        Ok(item.clone())
    }
}

/// Table persisted as a JSON object in one file.
///
/// Every operation reads the file, and writes replace it atomically. A
/// missing file is an empty table.
#[derive(Debug)]
pub struct JsonFileTable {
    path: Utf8PathBuf,
    lock: Mutex<()>,
}

type Items = BTreeMap<String, Item>;

impl JsonFileTable {
    /// Open (or lazily create) a table at `path`.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> TableResult<Items> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Items::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if contents.trim().is_empty() {
            return Ok(Items::new());
        }
        serde_json::from_str(&contents).map_err(|source| TableError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    #[instrument(skip(self, items), fields(path = %self.path, count = items.len()))]
    fn store(&self, items: &Items) -> TableResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let json = serde_json::to_vec_pretty(items).map_err(|source| TableError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&json).map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        debug!("table written");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> TableError {
        TableError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl KvTable for JsonFileTable {
    fn get(&self, key: &str) -> TableResult<Option<Item>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn put(&self, key: &str, item: Item) -> TableResult<()> {
        let _guard = self.lock.lock();
        let mut items = self.load()?;
        items.insert(key.to_string(), item);
        self.store(&items)
    }

    fn update(&self, key: &str, updates: &[Update]) -> TableResult<Item> {
        let _guard = self.lock.lock();
        let mut items = self.load()?;
        let item = items.entry(key.to_string()).or_default();
        for update in updates {
            item.apply(update);
        }
        let updated = item.clone();
        self.store(&items)?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn add_count_starts_from_zero() {
        let mut item = Item::default();
        item.apply(&Update::AddCount(3));
        item.apply(&Update::AddCount(-5));
        assert_eq!(item.count, Some(-2));
    }

    #[test]
    fn delete_that_empties_set_removes_it() {
        let mut item = Item {
            string_set: Some(set(&["a"])),
            ..Item::default()
        };
        item.apply(&Update::DeleteFromSet(set(&["a", "zzz"])));
        assert_eq!(item.string_set, None);
    }

    #[test]
    fn add_empty_set_stores_nothing() {
        let mut item = Item::default();
        item.apply(&Update::AddToSet(BTreeSet::new()));
        assert_eq!(item.string_set, None);
    }

    #[test]
    fn memory_update_creates_missing_item() {
        let table = MemoryTable::new();
        let item = table
            .update("k", &[Update::AddCount(1), Update::SetExpiresAt(42)])
            .unwrap();
        assert_eq!(item.count, Some(1));
        assert_eq!(item.expires_at, Some(42));
        assert_eq!(table.get("k").unwrap(), Some(item));
    }

    #[test]
    fn memory_put_overwrites_whole_item() {
        let table = MemoryTable::new();
        table
            .update("k", &[Update::AddToSet(set(&["x"])), Update::AddCount(4)])
            .unwrap();
        table
            .put(
                "k",
                Item {
                    count: Some(0),
                    ..Item::default()
                },
            )
            .unwrap();
        let item = table.get("k").unwrap().unwrap();
        assert_eq!(item.count, Some(0));
        assert_eq!(item.string_set, None);
    }

    #[test]
    fn json_file_round_trips_between_handles() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("nested/kv.json")).unwrap();

        let table = JsonFileTable::open(&path);
        assert_eq!(table.get("k").unwrap(), None);
        table.update("k", &[Update::AddToSet(set(&["b", "a"]))]).unwrap();

        let reopened = JsonFileTable::open(&path);
        let item = reopened.get("k").unwrap().unwrap();
        assert_eq!(item.string_set, Some(set(&["a", "b"])));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"stringSet\""));
        assert!(!raw.contains("intCount"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("kv.json")).unwrap();
        std::fs::write(&path, "[1, 2]").unwrap();
        let err = JsonFileTable::open(&path).get("k").unwrap_err();
        assert!(matches!(err, TableError::Corrupt { .. }));
    }
}
