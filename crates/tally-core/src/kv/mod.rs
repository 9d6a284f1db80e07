//! Key-value caching helpers for detections.
//!
//! Counters, string sets and JSON dictionaries stored under string keys,
//! each with an optional expiry. Detections use them to count events over
//! a window ([`KvStore::evaluate_threshold`]) or to remember what they have
//! seen ([`KvStore::check_account_age`]).
//!
//! # Expiry
//!
//! Expired items are not deleted eagerly; the storage layer is expected to
//! clean them up eventually. Readers that need exact timing pass
//! `force_ttl_check = true` to treat an expired item as missing.
//!
//! An expiry is given as a [`Ttl`]. Values below [`RELATIVE_TTL_LIMIT`] are
//! offsets from now; larger values are absolute epoch seconds. The default
//! is 90 days from now.
//!
//! # Example
//! ```
//! use tally_core::kv::{KvStore, MemoryTable, Ttl};
//!
//! let store = KvStore::new(MemoryTable::new());
//! assert_eq!(store.increment_counter("logins:alice", 1, Ttl::Default).unwrap(), 1);
//! assert_eq!(store.get_counter("logins:alice", false).unwrap(), 1);
//! ```

pub mod monitoring;
pub mod table;

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::Utf8PathBuf;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use crate::config::{self, Config};

pub use monitoring::Monitor;
pub use table::{Item, JsonFileTable, KvTable, MemoryTable, TableError, Update};

/// Default lifetime of an item: 90 days.
pub const DEFAULT_TTL_SECONDS: i64 = 90 * 24 * 60 * 60;

/// Expiry values below this are relative to now (seven days plus one second).
pub const RELATIVE_TTL_LIMIT: i64 = 604_801;

/// Errors from caching operations.
#[derive(Error, Debug)]
pub enum KvError {
    /// The storage backend failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// `put_dictionary` was given something other than a JSON object.
    #[error("value is not a dictionary")]
    NotADictionary,

    /// The value is a dictionary but cannot be serialized as JSON.
    #[error("value is a dictionary, but it is not JSON serializable: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored dictionary data could not be decoded.
    #[error("stored data could not be decoded as a JSON object: {0}")]
    Decode(#[source] serde_json::Error),

    /// A TTL string was neither an integer nor a decimal number.
    #[error("invalid expiry `{0}` (expected epoch or relative seconds)")]
    InvalidTtl(String),

    /// No table path configured and no data directory available.
    #[error("no kv table path configured and no user data directory found")]
    NoTablePath,
}

/// Result alias for caching operations.
pub type KvResult<T> = Result<T, KvError>;

/// An expiry request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ttl {
    /// 90 days from now.
    #[default]
    Default,
    /// Epoch seconds, or seconds from now when below [`RELATIVE_TTL_LIMIT`].
    At(i64),
}

impl Ttl {
    /// Resolve to absolute epoch seconds.
    pub const fn finalize(self, now: i64) -> i64 {
        match self {
            Self::Default => now.saturating_add(DEFAULT_TTL_SECONDS),
            Self::At(seconds) if seconds < RELATIVE_TTL_LIMIT => now.saturating_add(seconds),
            Self::At(seconds) => seconds,
        }
    }
}

impl From<Option<i64>> for Ttl {
    fn from(seconds: Option<i64>) -> Self {
        seconds.map_or(Self::Default, Self::At)
    }
}

impl FromStr for Ttl {
    type Err = KvError;

    /// Integers are taken as-is; decimals are truncated toward zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Self::At(n));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() && f.abs() < 9.0e18 => Ok(Self::At(f.trunc() as i64)),
            _ => Err(KvError::InvalidTtl(s.to_string())),
        }
    }
}

/// Whether an item's expiry has passed. A zero or missing expiry never
/// expires.
pub const fn ttl_expired(item: &Item, now: i64) -> bool {
    match item.expires_at {
        Some(t) => t != 0 && t <= now,
        None => false,
    }
}

/// Current time in epoch seconds.
pub fn system_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Caching helpers over a table.
pub struct KvStore<T: KvTable> {
    table: T,
    monitor: Monitor,
    clock: fn() -> i64,
}

impl<T: KvTable> std::fmt::Debug for KvStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one key for display.
#[derive(Debug, Clone, Serialize)]
pub struct KeyReport {
    /// The key.
    pub key: String,
    /// Stored item, if any.
    pub item: Option<Item>,
    /// Whether the item's expiry has passed.
    pub expired: bool,
}

impl KvStore<JsonFileTable> {
    /// Open the JSON-file table named by config, or `kv.json` in the user
    /// data directory.
    pub fn open(config: &Config) -> KvResult<Self> {
        let path: Utf8PathBuf = match config.kv.path.clone() {
            Some(p) => p,
            None => config::user_data_local_dir()
                .ok_or(KvError::NoTablePath)?
                .join("kv.json"),
        };
        Ok(Self::new(JsonFileTable::open(path)).with_monitor(Monitor::from_config(config)))
    }
}

impl<T: KvTable> KvStore<T> {
    /// Wrap a table with monitoring off and the system clock.
    pub fn new(table: T) -> Self {
        Self {
            table,
            monitor: Monitor::default(),
            clock: system_now,
        }
    }

    /// Replace the monitor.
    #[must_use]
    pub const fn with_monitor(mut self, monitor: Monitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Replace the clock.
    #[must_use]
    pub const fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying table.
    pub const fn table(&self) -> &T {
        &self.table
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn get_live(&self, key: &str, force_ttl_check: bool) -> KvResult<Option<Item>> {
        let item = self.table.get(key)?;
        Ok(item.filter(|i| !(force_ttl_check && ttl_expired(i, self.now()))))
    }

    /// Raw view of a key.
    pub fn inspect(&self, key: &str) -> KvResult<KeyReport> {
        self.monitor.wrap("kv.inspect", || {
            let item = self.table.get(key)?;
            let expired = item.as_ref().is_some_and(|i| ttl_expired(i, self.now()));
            Ok(KeyReport {
                key: key.to_string(),
                item,
                expired,
            })
        })
    }

    /// A counter's value; 0 when missing, or when expired and
    /// `force_ttl_check` is set.
    #[instrument(skip(self))]
    pub fn get_counter(&self, key: &str, force_ttl_check: bool) -> KvResult<i64> {
        self.monitor.wrap("kv.get_counter", || {
            Ok(self
                .get_live(key, force_ttl_check)?
                .and_then(|i| i.count)
                .unwrap_or(0))
        })
    }

    /// Add `by` to a counter (creating it at 0), refresh its expiry, and
    /// return the new count.
    #[instrument(skip(self))]
    pub fn increment_counter(&self, key: &str, by: i64, ttl: Ttl) -> KvResult<i64> {
        self.monitor.wrap("kv.increment_counter", || {
            let expires_at = ttl.finalize(self.now());
            let item = self
                .table
                .update(key, &[Update::AddCount(by), Update::SetExpiresAt(expires_at)])?;
            Ok(item.count.unwrap_or(0))
        })
    }

    /// Overwrite the item with a zero counter. Other columns are dropped.
    #[instrument(skip(self))]
    pub fn reset_counter(&self, key: &str) -> KvResult<()> {
        self.monitor.wrap("kv.reset_counter", || {
            let item = Item {
                count: Some(0),
                ..Item::default()
            };
            Ok(self.table.put(key, item)?)
        })
    }

    /// Set when a key expires.
    #[instrument(skip(self))]
    pub fn set_key_expiration(&self, key: &str, ttl: Ttl) -> KvResult<()> {
        self.monitor.wrap("kv.set_key_expiration", || {
            let expires_at = ttl.finalize(self.now());
            self.table.update(key, &[Update::SetExpiresAt(expires_at)])?;
            Ok(())
        })
    }

    /// Overwrite the item with a dictionary.
    ///
    /// The value must serialize to a JSON object.
    #[instrument(skip(self, value))]
    pub fn put_dictionary<V: Serialize + ?Sized>(&self, key: &str, value: &V, ttl: Ttl) -> KvResult<()> {
        self.monitor.wrap("kv.put_dictionary", || {
            let json = serde_json::to_value(value).map_err(KvError::Encode)?;
            if !json.is_object() {
                return Err(KvError::NotADictionary);
            }
            let data = serde_json::to_string(&json).map_err(KvError::Encode)?;
            let item = Item {
                dictionary: Some(data),
                expires_at: Some(ttl.finalize(self.now())),
                ..Item::default()
            };
            Ok(self.table.put(key, item)?)
        })
    }

    /// A stored dictionary; empty when missing, or when expired and
    /// `force_ttl_check` is set.
    #[instrument(skip(self))]
    pub fn get_dictionary(&self, key: &str, force_ttl_check: bool) -> KvResult<Map<String, Value>> {
        self.monitor.wrap("kv.get_dictionary", || {
            let data = self
                .get_live(key, force_ttl_check)?
                .and_then(|i| i.dictionary)
                .filter(|d| !d.is_empty());
            match data {
                Some(d) => serde_json::from_str(&d).map_err(KvError::Decode),
                None => Ok(Map::new()),
            }
        })
    }

    /// A string set's members; empty when missing, or when expired and
    /// `force_ttl_check` is set.
    #[instrument(skip(self))]
    pub fn get_string_set(&self, key: &str, force_ttl_check: bool) -> KvResult<BTreeSet<String>> {
        self.monitor.wrap("kv.get_string_set", || {
            Ok(self
                .get_live(key, force_ttl_check)?
                .and_then(|i| i.string_set)
                .unwrap_or_default())
        })
    }

    /// Overwrite the item with a string set. An empty set resets the
    /// column instead.
    #[instrument(skip(self, values))]
    pub fn put_string_set<I, S>(&self, key: &str, values: I, ttl: Ttl) -> KvResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        self.monitor.wrap("kv.put_string_set", || {
            if set.is_empty() {
                return self.reset_string_set(key);
            }
            let item = Item {
                string_set: Some(set),
                expires_at: Some(ttl.finalize(self.now())),
                ..Item::default()
            };
            Ok(self.table.put(key, item)?)
        })
    }

    /// Add members, refresh the expiry, and return the new set. An empty
    /// input changes nothing and returns the current set.
    #[instrument(skip(self, values))]
    pub fn add_to_string_set<I, S>(&self, key: &str, values: I, ttl: Ttl) -> KvResult<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if set.is_empty() {
            return self.get_string_set(key, false);
        }
        self.monitor.wrap("kv.add_to_string_set", || {
            let expires_at = ttl.finalize(self.now());
            let item = self
                .table
                .update(key, &[Update::AddToSet(set), Update::SetExpiresAt(expires_at)])?;
            Ok(item.string_set.unwrap_or_default())
        })
    }

    /// Remove members, refresh the expiry, and return what is left. An
    /// empty input changes nothing and returns the current set.
    #[instrument(skip(self, values))]
    pub fn remove_from_string_set<I, S>(
        &self,
        key: &str,
        values: I,
        ttl: Ttl,
    ) -> KvResult<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if set.is_empty() {
            return self.get_string_set(key, false);
        }
        self.monitor.wrap("kv.remove_from_string_set", || {
            let expires_at = ttl.finalize(self.now());
            let item = self.table.update(
                key,
                &[Update::DeleteFromSet(set), Update::SetExpiresAt(expires_at)],
            )?;
            Ok(item.string_set.unwrap_or_default())
        })
    }

    /// Drop the string set column.
    #[instrument(skip(self))]
    pub fn reset_string_set(&self, key: &str) -> KvResult<()> {
        self.monitor.wrap("kv.reset_string_set", || {
            self.table.update(key, &[Update::RemoveStringSet])?;
            Ok(())
        })
    }

    /// Count one occurrence and report whether `threshold` was reached.
    ///
    /// The first occurrence starts a window of `expiry_seconds`. Reaching
    /// the threshold resets the counter and returns `true`.
    #[instrument(skip(self))]
    pub fn evaluate_threshold(&self, key: &str, threshold: i64, expiry_seconds: i64) -> KvResult<bool> {
        self.monitor.wrap("kv.evaluate_threshold", || {
            let count = self.increment_counter(key, 1, Ttl::Default)?;
            if count == 1 {
                self.set_key_expiration(key, Ttl::At(self.now().saturating_add(expiry_seconds)))?;
            } else if count >= threshold {
                self.reset_counter(key)?;
                return Ok(true);
            }
            Ok(false)
        })
    }

    /// Whether an account or user id was recorded as newly created: `key`
    /// is non-empty and its string set has members.
    #[instrument(skip(self))]
    pub fn check_account_age(&self, key: &str) -> KvResult<bool> {
        self.monitor.wrap("kv.check_account_age", || {
            if key.is_empty() {
                return Ok(false);
            }
            Ok(!self.get_string_set(key, false)?.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_675_000_000;

    fn fixed_now() -> i64 {
        NOW
    }

    fn later() -> i64 {
        NOW + 10 * DEFAULT_TTL_SECONDS
    }

    fn store() -> KvStore<MemoryTable> {
        KvStore::new(MemoryTable::new()).with_clock(fixed_now)
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn ttl_finalization() {
        assert_eq!(Ttl::Default.finalize(NOW), NOW + DEFAULT_TTL_SECONDS);
        assert_eq!(Ttl::At(86_400).finalize(NOW), NOW + 86_400);
        assert_eq!(Ttl::At(604_800).finalize(NOW), NOW + 604_800);
        assert_eq!(Ttl::At(604_801).finalize(NOW), 604_801);
        assert_eq!(Ttl::At(1_675_238_400).finalize(NOW), 1_675_238_400);
        assert_eq!(Ttl::from(None), Ttl::Default);
    }

    #[test]
    fn ttl_from_str_truncates_decimals() {
        assert_eq!("1675238800".parse::<Ttl>().unwrap(), Ttl::At(1_675_238_800));
        assert_eq!("1675238800.9".parse::<Ttl>().unwrap(), Ttl::At(1_675_238_800));
        assert_eq!(" 3600 ".parse::<Ttl>().unwrap(), Ttl::At(3600));
        assert!(matches!("soon".parse::<Ttl>(), Err(KvError::InvalidTtl(_))));
        assert!("inf".parse::<Ttl>().is_err());
    }

    #[test]
    fn ttl_expired_rules() {
        let item = |t| Item {
            expires_at: t,
            ..Item::default()
        };
        assert!(!ttl_expired(&item(None), NOW));
        assert!(!ttl_expired(&item(Some(0)), NOW));
        assert!(ttl_expired(&item(Some(NOW)), NOW));
        assert!(!ttl_expired(&item(Some(NOW + 1)), NOW));
    }

    #[test]
    fn counter_ops() {
        let s = store();
        assert_eq!(s.get_counter("panther", false).unwrap(), 0);
        assert_eq!(s.increment_counter("panther", 1, Ttl::Default).unwrap(), 1);
        assert_eq!(s.increment_counter("panther", -2, Ttl::Default).unwrap(), -1);
        assert_eq!(s.increment_counter("panther", 11, Ttl::Default).unwrap(), 10);
        assert_eq!(s.get_counter("panther", false).unwrap(), 10);
        s.reset_counter("panther").unwrap();
        assert_eq!(s.get_counter("panther", false).unwrap(), 0);
        assert_eq!(s.get_counter("does-not-exist", false).unwrap(), 0);
    }

    #[test]
    fn increment_sets_expiry() {
        let s = store();
        s.increment_counter("k", 1, Ttl::At(86_400)).unwrap();
        let item = s.table().get("k").unwrap().unwrap();
        assert_eq!(item.expires_at, Some(NOW + 86_400));

        s.set_key_expiration("k", Ttl::At(1_675_238_400)).unwrap();
        let item = s.table().get("k").unwrap().unwrap();
        assert_eq!(item.expires_at, Some(1_675_238_400));
    }

    #[test]
    fn reset_counter_drops_other_columns() {
        let s = store();
        s.add_to_string_set("k", ["a"], Ttl::Default).unwrap();
        s.reset_counter("k").unwrap();
        let item = s.table().get("k").unwrap().unwrap();
        assert_eq!(item.count, Some(0));
        assert_eq!(item.string_set, None);
        assert_eq!(item.expires_at, None);
    }

    #[test]
    fn force_ttl_check_hides_expired_values() {
        let table = MemoryTable::new();
        table
            .put(
                "old",
                Item {
                    count: Some(7),
                    string_set: Some(set(&["x"])),
                    dictionary: Some(r#"{"a":1}"#.into()),
                    expires_at: Some(NOW + 60),
                },
            )
            .unwrap();
        let s = KvStore::new(table).with_clock(later);

        assert_eq!(s.get_counter("old", false).unwrap(), 7);
        assert_eq!(s.get_counter("old", true).unwrap(), 0);
        assert_eq!(s.get_string_set("old", true).unwrap(), BTreeSet::new());
        assert!(s.get_dictionary("old", true).unwrap().is_empty());
        assert_eq!(s.get_dictionary("old", false).unwrap()["a"], json!(1));
    }

    #[test]
    fn dictionary_round_trip() {
        let s = store();
        let value = json!({"user": "alice", "attempts": [1, 2, 3], "nested": {"ok": true}});
        s.put_dictionary("d", &value, Ttl::Default).unwrap();
        let back = s.get_dictionary("d", false).unwrap();
        assert_eq!(Value::Object(back), value);
        assert_eq!(s.get_dictionary("missing", false).unwrap(), Map::new());
    }

    #[test]
    fn non_object_dictionary_is_rejected() {
        let s = store();
        let err = s.put_dictionary("d", &json!([1, 2]), Ttl::Default).unwrap_err();
        assert!(matches!(err, KvError::NotADictionary));
        let err = s.put_dictionary("d", "text", Ttl::Default).unwrap_err();
        assert!(matches!(err, KvError::NotADictionary));
        assert_eq!(s.table().get("d").unwrap(), None);
    }

    #[test]
    fn unserializable_dictionary_is_an_encode_error() {
        use std::collections::HashMap;
        let s = store();
        let mut bad: HashMap<(i32, i32), i32> = HashMap::new();
        bad.insert((1, 2), 3);
        let err = s.put_dictionary("d", &bad, Ttl::Default).unwrap_err();
        assert!(matches!(err, KvError::Encode(_)));
    }

    #[test]
    fn undecodable_dictionary_is_a_decode_error() {
        let table = MemoryTable::new();
        table
            .put(
                "d",
                Item {
                    dictionary: Some("{not json".into()),
                    ..Item::default()
                },
            )
            .unwrap();
        let err = KvStore::new(table).get_dictionary("d", false).unwrap_err();
        assert!(matches!(err, KvError::Decode(_)));
    }

    #[test]
    fn string_set_ops() {
        let s = store();
        assert_eq!(s.add_to_string_set("strs", ["b", "a"], Ttl::Default).unwrap(), set(&["a", "b"]));
        assert_eq!(s.get_string_set("strs", false).unwrap(), set(&["a", "b"]));
        assert_eq!(s.add_to_string_set("strs", ["c"], Ttl::Default).unwrap(), set(&["a", "b", "c"]));
        assert_eq!(
            s.add_to_string_set("strs", Vec::<String>::new(), Ttl::Default).unwrap(),
            set(&["a", "b", "c"])
        );
        assert_eq!(
            s.add_to_string_set("strs", ["b", "c", "d"], Ttl::Default).unwrap(),
            set(&["a", "b", "c", "d"])
        );
        assert_eq!(
            s.add_to_string_set("strs", [""], Ttl::Default).unwrap(),
            set(&["", "a", "b", "c", "d"])
        );
        assert_eq!(
            s.remove_from_string_set("strs", [""], Ttl::Default).unwrap(),
            set(&["a", "b", "c", "d"])
        );
        assert_eq!(
            s.remove_from_string_set("strs", Vec::<String>::new(), Ttl::Default).unwrap(),
            set(&["a", "b", "c", "d"])
        );
        s.reset_string_set("strs").unwrap();
        assert_eq!(s.get_string_set("strs", false).unwrap(), BTreeSet::new());
    }

    #[test]
    fn removing_every_member_empties_the_set() {
        let s = store();
        s.put_string_set("k", ["a", "b"], Ttl::Default).unwrap();
        assert_eq!(s.remove_from_string_set("k", ["a", "b"], Ttl::Default).unwrap(), BTreeSet::new());
    }

    #[test]
    fn put_empty_string_set_resets() {
        let s = store();
        s.put_string_set("k", ["a"], Ttl::Default).unwrap();
        s.put_string_set("k", Vec::<&str>::new(), Ttl::Default).unwrap();
        assert_eq!(s.get_string_set("k", false).unwrap(), BTreeSet::new());
    }

    #[test]
    fn threshold_fires_and_resets() {
        let s = store();
        assert!(!s.evaluate_threshold("errors", 3, 3600).unwrap());
        let item = s.table().get("errors").unwrap().unwrap();
        assert_eq!(item.expires_at, Some(NOW + 3600));

        assert!(!s.evaluate_threshold("errors", 3, 3600).unwrap());
        assert!(s.evaluate_threshold("errors", 3, 3600).unwrap());
        assert_eq!(s.get_counter("errors", false).unwrap(), 0);
        // The window starts over after a reset.
        assert!(!s.evaluate_threshold("errors", 3, 3600).unwrap());
    }

    #[test]
    fn threshold_of_one_never_fires_on_first_hit() {
        let s = store();
        assert!(!s.evaluate_threshold("k", 1, 60).unwrap());
        assert!(s.evaluate_threshold("k", 1, 60).unwrap());
    }

    #[test]
    fn account_age() {
        let s = store();
        assert!(!s.check_account_age("").unwrap());
        assert!(!s.check_account_age("acct-1").unwrap());
        s.add_to_string_set("acct-1", ["created"], Ttl::Default).unwrap();
        assert!(s.check_account_age("acct-1").unwrap());
    }

    #[test]
    fn monitored_store_behaves_the_same() {
        let s = store().with_monitor(Monitor::new(true));
        assert_eq!(s.add_to_string_set("strs", ["a", "b"], Ttl::Default).unwrap(), set(&["a", "b"]));
        assert_eq!(s.get_string_set("strs", false).unwrap(), set(&["a", "b"]));
    }

    #[test]
    fn far_future_expiry_saturates() {
        let s = store();
        assert!(!s.evaluate_threshold("k", 3, i64::MAX).unwrap());
        let item = s.inspect("k").unwrap().item.unwrap();
        assert_eq!(item.expires_at, Some(i64::MAX));
        assert_eq!(Ttl::Default.finalize(i64::MAX - 1), i64::MAX);
        assert_eq!(Ttl::At(10).finalize(i64::MAX), i64::MAX);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_put_string_set_is_traced_as_put() {
        let s = store().with_monitor(Monitor::new(true));
        s.put_string_set("strs", ["a"], Ttl::Default).unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            s.put_string_set("strs", Vec::<String>::new(), Ttl::Default)
                .unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().clone()).unwrap();
        let first = logs.lines().find(|l| l.contains("calling")).unwrap();
        assert!(first.contains("kv.put_string_set"), "{logs}");
        assert!(s.get_string_set("strs", false).unwrap().is_empty());
    }

    #[test]
    fn json_file_store_persists() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.kv.path = Some(Utf8PathBuf::try_from(tmp.path().join("kv.json")).unwrap());

        let s = KvStore::open(&config).unwrap();
        s.increment_counter("k", 5, Ttl::Default).unwrap();
        let again = KvStore::open(&config).unwrap();
        assert_eq!(again.get_counter("k", false).unwrap(), 5);

        let report = again.inspect("k").unwrap();
        assert!(!report.expired);
        assert_eq!(report.item.and_then(|i| i.count), Some(5));
    }
}
