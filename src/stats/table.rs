//! Per-path response size table.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Last observed response content length per request path.
///
/// One coarse lock guards the whole table. Entries are overwritten, never
/// aggregated and never removed. `-1` records a response of unknown size.
#[derive(Debug, Default)]
pub struct StatsTable {
    entries: Mutex<HashMap<String, i64>>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `path` and return the value now recorded.
    pub fn update(&self, path: &str, content_length: i64) -> i64 {
        let mut entries = self.lock();
        entries.insert(path.to_string(), content_length);
        entries[path]
    }

    /// Last recorded value for `path`, if any.
    pub fn get(&self, path: &str) -> Option<i64> {
        self.lock().get(path).copied()
    }

    /// Number of distinct paths seen.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted copy of the whole table.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.lock()
            .iter()
            .map(|(path, bytes)| (path.clone(), *bytes))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // A panic mid-update can't leave a half-written i64 behind.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
