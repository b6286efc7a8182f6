//! The secret cache: stable-identity entries with TTL-driven refresh.
//!
//! Entries are created once per composite secret key and never removed, so
//! holders of an entry reference can keep it for the life of the process.
//! Contents only ever move from absent to present and from one snapshot to a
//! newer one; a failed refresh bumps the checked timestamp and keeps the last
//! good snapshot, which is what lets consumers ride out backend outages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::secrets::types::{SecretContents, SecretKey};

#[derive(Debug)]
struct EntryState {
    contents: Option<Arc<SecretContents>>,
    content_hash: u32,
    /// When the current contents were loaded.
    content_at: Instant,
    /// When a caller last read this entry.
    accessed_at: Instant,
    /// When the last refresh attempt happened, success or failure.
    /// `None` until the first attempt, so a new entry refreshes immediately.
    checked_at: Option<Instant>,
}

/// One cached secret. Stable identity: lives until process exit.
#[derive(Debug)]
pub struct SecretEntry {
    key: String,
    state: Mutex<EntryState>,
}

impl SecretEntry {
    fn new(key: String, now: Instant) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState {
                contents: None,
                content_hash: 0,
                content_at: now,
                accessed_at: now,
                checked_at: None,
            }),
        }
    }

    /// The composite key this entry was created for, for logging.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// A snapshot of the current contents, usable outside any lock.
    pub fn contents(&self) -> Option<Arc<SecretContents>> {
        self.state.lock().unwrap().contents.clone()
    }

    /// Whether contents have ever been loaded. Once true, always true.
    pub fn has_contents(&self) -> bool {
        self.state.lock().unwrap().contents.is_some()
    }

    /// Hash of the current contents, 0 while absent.
    pub fn content_hash(&self) -> u32 {
        self.state.lock().unwrap().content_hash
    }

    /// Are the contents older than the TTL? Stale contents remain usable.
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        let state = self.state.lock().unwrap();
        now.saturating_duration_since(state.content_at) > ttl
    }

    /// Is it time to check for a new value?
    pub fn needs_refresh(&self, now: Instant, ttl: Duration) -> bool {
        let state = self.state.lock().unwrap();
        match state.checked_at {
            Some(checked_at) => now.saturating_duration_since(checked_at) > ttl,
            None => true,
        }
    }

    /// Install new contents and stamp all timestamps.
    pub(crate) fn update_contents(&self, contents: Arc<SecretContents>, now: Instant) {
        let mut state = self.state.lock().unwrap();
        state.content_hash = contents.content_hash();
        state.contents = Some(contents);
        state.content_at = now;
        state.accessed_at = now;
        state.checked_at = Some(now);
    }

    /// Record a refresh attempt that produced nothing.
    ///
    /// Only the checked timestamp moves, so an unreachable backend is not
    /// hammered on every access while the last good value stays served.
    pub(crate) fn note_failed_update(&self, now: Instant) {
        self.state.lock().unwrap().checked_at = Some(now);
    }

    fn touch(&self, now: Instant) {
        self.state.lock().unwrap().accessed_at = now;
    }

    #[cfg(test)]
    fn accessed_at(&self) -> Instant {
        self.state.lock().unwrap().accessed_at
    }
}

/// Process-wide map from composite secret key to its entry.
#[derive(Debug, Default)]
pub struct SecretCache {
    entries: Mutex<HashMap<String, Arc<SecretEntry>>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up or create the entry for a key and mark it accessed.
    ///
    /// Idempotent: concurrent calls for the same key all land on one entry.
    /// A created entry starts without contents and due for refresh.
    pub fn resolve_entry(&self, key: &SecretKey, now: Instant) -> Arc<SecretEntry> {
        let key_text = key.to_string();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key_text)
            .or_insert_with_key(|key_text| Arc::new(SecretEntry::new(key_text.clone(), now)));
        entry.touch(now);
        Arc::clone(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
