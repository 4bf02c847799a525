//! Storage trait definitions

use std::collections::BTreeMap;

use anyhow::Result;

use crate::models::{Comment, Entry};

/// Trait for journal storage operations
///
/// The sync engine never reads or writes this on its own; the
/// [`sync_journal`](crate::sync::sync_journal) driver and callers use it to
/// keep synced data and the resume state between runs.
pub trait JournalStore: Send + Sync {
    /// Insert or replace an entry
    fn store_entry(&self, entry: Entry) -> Result<()>;

    /// Get an entry by item id
    fn get_entry(&self, itemid: u64) -> Result<Option<Entry>>;

    /// Count stored entries
    fn count_entries(&self) -> Result<usize>;

    /// Store comment fragments
    ///
    /// With `meta_only` set only poster, item, parent and state are written.
    /// Fields missing from a fragment never erase a stored value.
    fn store_comments(&self, comments: &BTreeMap<u64, Comment>, meta_only: bool) -> Result<()>;

    /// Get a comment by id
    fn get_comment(&self, comment_id: u64) -> Result<Option<Comment>>;

    /// Highest stored comment id; with `full_only`, only comments with a body count
    fn last_comment_id(&self, full_only: bool) -> Result<Option<u64>>;

    /// Record poster id to username mappings
    fn store_usermap(&self, usermap: &BTreeMap<u64, String>) -> Result<()>;

    /// Look up a poster's username
    fn get_username(&self, poster_id: u64) -> Result<Option<String>>;

    /// Get a metadata value such as the last sync token
    fn get_meta(&self, key: &str) -> Result<Option<String>>;

    /// Set a metadata value
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;
}
