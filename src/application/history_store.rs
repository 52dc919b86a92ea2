use std::sync::Arc;

use crate::domain::{AppError, HistoryEntry};
use crate::storage::{KeyValueStore, HISTORY_KEY};
use crate::utils::get_timestamp_millis;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Completed downloads, newest first, mirrored to local storage.
///
/// The in-memory list is authoritative; write failures are logged and the
/// session carries on.
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    capacity: usize,
    storage: Arc<dyn KeyValueStore>,
    last_id: u64,
}

impl HistoryStore {
    /// Malformed or missing persisted state yields an empty history.
    pub fn load(storage: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        let mut entries = match storage.get(HISTORY_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<HistoryEntry>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed download history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "download history unavailable");
                Vec::new()
            }
        };
        let capacity = capacity.max(1);
        entries.truncate(capacity);
        let last_id = entries.iter().map(|e| e.id).max().unwrap_or(0);

        Self {
            entries,
            capacity,
            storage,
            last_id,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time-derived id, bumped past the previous one when the clock repeats.
    pub fn next_id(&mut self) -> u64 {
        let id = get_timestamp_millis().max(self.last_id.saturating_add(1));
        self.last_id = id;
        id
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.last_id = self.last_id.max(entry.id);
        self.entries.insert(0, entry);
        self.entries.truncate(self.capacity);
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "download history not saved");
        }
    }

    /// Callers are expected to have confirmed with the user.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.storage.remove(HISTORY_KEY) {
            let err = AppError::from(e);
            tracing::warn!(error = %err, "persisted download history not removed");
        }
    }

    fn persist(&self) -> Result<(), AppError> {
        let json = serde_json::to_string(&self.entries)
            .map_err(|e| AppError::PersistenceDegraded(e.to_string()))?;
        self.storage.set(HISTORY_KEY, &json)?;
        Ok(())
    }
}
