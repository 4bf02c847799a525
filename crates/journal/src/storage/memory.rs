//! In-memory storage implementation
//!
//! Used by tests and by callers that keep their own persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Result, anyhow};

use super::JournalStore;
use crate::models::{Comment, Entry};

/// In-memory implementation of JournalStore
///
/// Maps protected by RwLocks for thread-safe access.
pub struct InMemoryJournalStore {
    entries: RwLock<BTreeMap<u64, Entry>>,
    comments: RwLock<BTreeMap<u64, Comment>>,
    usermap: RwLock<HashMap<u64, String>>,
    meta: RwLock<HashMap<String, String>>,
}

impl InMemoryJournalStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            comments: RwLock::new(BTreeMap::new()),
            usermap: RwLock::new(HashMap::new()),
            meta: RwLock::new(HashMap::new()),
        }
    }

    /// All stored comments in id order
    pub fn comments(&self) -> Result<Vec<Comment>> {
        Ok(read(&self.comments)?.values().cloned().collect())
    }

    /// All stored entries in item id order
    pub fn entries(&self) -> Result<Vec<Entry>> {
        Ok(read(&self.entries)?.values().cloned().collect())
    }
}

impl Default for InMemoryJournalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JournalStore for InMemoryJournalStore {
    fn store_entry(&self, entry: Entry) -> Result<()> {
        write(&self.entries)?.insert(entry.itemid, entry);
        Ok(())
    }

    fn get_entry(&self, itemid: u64) -> Result<Option<Entry>> {
        Ok(read(&self.entries)?.get(&itemid).cloned())
    }

    fn count_entries(&self) -> Result<usize> {
        Ok(read(&self.entries)?.len())
    }

    fn store_comments(&self, comments: &BTreeMap<u64, Comment>, meta_only: bool) -> Result<()> {
        let mut stored = write(&self.comments)?;
        for (id, incoming) in comments {
            let target = stored.entry(*id).or_insert_with(|| Comment::new(*id));
            overlay(&mut target.poster_id, &incoming.poster_id);
            overlay(&mut target.item_id, &incoming.item_id);
            overlay(&mut target.parent_id, &incoming.parent_id);
            overlay(&mut target.state, &incoming.state);
            if !meta_only {
                overlay(&mut target.subject, &incoming.subject);
                overlay(&mut target.body, &incoming.body);
                overlay(&mut target.time, &incoming.time);
            }
        }
        Ok(())
    }

    fn get_comment(&self, comment_id: u64) -> Result<Option<Comment>> {
        Ok(read(&self.comments)?.get(&comment_id).cloned())
    }

    fn last_comment_id(&self, full_only: bool) -> Result<Option<u64>> {
        let comments = read(&self.comments)?;
        Ok(comments
            .values()
            .rev()
            .find(|c| !full_only || c.has_body())
            .map(|c| c.comment_id))
    }

    fn store_usermap(&self, usermap: &BTreeMap<u64, String>) -> Result<()> {
        let mut stored = write(&self.usermap)?;
        for (id, user) in usermap {
            stored.insert(*id, user.clone());
        }
        Ok(())
    }

    fn get_username(&self, poster_id: u64) -> Result<Option<String>> {
        Ok(read(&self.usermap)?.get(&poster_id).cloned())
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(read(&self.meta)?.get(key).cloned())
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        write(&self.meta)?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn overlay<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *target = Some(value.clone());
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("journal store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("journal store lock poisoned"))
}
