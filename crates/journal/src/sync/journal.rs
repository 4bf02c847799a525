//! Full journal sync into a store

use anyhow::Result;
use log::info;

use super::comments::{CommentPass, CommentSyncCursor};
use super::entries::{EntrySyncCursor, EntrySyncState};
use super::merge::merge_entry;
use crate::models::{CommentPosition, SyncToken};
use crate::protocol::ProtocolClient;
use crate::storage::JournalStore;

/// Metadata key holding the entry resume token
pub const LASTSYNC_KEY: &str = "lastsync";

/// What a sync run covers
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub entries: bool,
    pub comments: bool,
    /// Fail on unrecognized entry properties instead of keeping them
    pub strict: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            entries: true,
            comments: true,
            strict: false,
        }
    }
}

/// Progress report sent after every page
#[derive(Debug, Clone, PartialEq)]
pub enum SyncProgress {
    Entries {
        state: EntrySyncState,
        fetched: u64,
        total: u64,
    },
    Comments {
        pass: CommentPass,
        start: u64,
        max_id: Option<u64>,
    },
}

/// Statistics from a sync operation
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Number of entries fetched and stored
    pub entries_stored: usize,
    /// Number of comment records written by the metadata pass
    pub comments_meta: usize,
    /// Number of comment records written by the body pass
    pub comments_full: usize,
    /// Number of username mappings received
    pub usernames: usize,
    /// Number of protocol pages processed
    pub pages: usize,
    /// Duration of the sync operation
    pub duration_ms: u64,
}

/// Sync entries and comments from the server into `store`
///
/// Resumes from the token and comment ids already in the store. The entry
/// token is saved after every completed page, so an interrupted run loses
/// at most one page of work.
pub fn sync_journal(
    client: &ProtocolClient,
    store: &dyn JournalStore,
    options: &SyncOptions,
    mut progress: impl FnMut(SyncProgress),
) -> Result<SyncStats> {
    let start = std::time::Instant::now();
    let mut stats = SyncStats::default();

    if options.entries {
        sync_entries(client, store, options.strict, &mut stats, &mut progress)?;
    }
    if options.comments {
        sync_comments(client, store, &mut stats, &mut progress)?;
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Sync of {} complete: {} entries, {} comments in {}ms",
        client.credential().journal(),
        stats.entries_stored,
        stats.comments_full,
        stats.duration_ms
    );
    Ok(stats)
}

fn sync_entries(
    client: &ProtocolClient,
    store: &dyn JournalStore,
    strict: bool,
    stats: &mut SyncStats,
    progress: &mut impl FnMut(SyncProgress),
) -> Result<()> {
    let lastsync = store.get_meta(LASTSYNC_KEY)?.map(SyncToken::new);
    let mut saved = lastsync.clone();
    let mut cursor = EntrySyncCursor::new(client, lastsync).strict(strict);

    while let Some(page) = cursor.advance()? {
        stats.pages += 1;
        for entry in page.entries {
            let existing = store.get_entry(entry.itemid)?;
            store.store_entry(merge_entry(existing, entry))?;
            stats.entries_stored += 1;
        }

        let token = cursor.resume_token();
        if token != saved.as_ref() {
            if let Some(token) = token {
                store.set_meta(LASTSYNC_KEY, token.as_str())?;
                saved = Some(token.clone());
            }
        }

        progress(SyncProgress::Entries {
            state: page.state,
            fetched: page.fetched,
            total: page.total,
        });
    }
    Ok(())
}

fn sync_comments(
    client: &ProtocolClient,
    store: &dyn JournalStore,
    stats: &mut SyncStats,
    progress: &mut impl FnMut(SyncProgress),
) -> Result<()> {
    let position = CommentPosition::after(store.last_comment_id(false)?, store.last_comment_id(true)?);
    let mut cursor = CommentSyncCursor::resume(client, position);

    while let Some(page) = cursor.advance()? {
        stats.pages += 1;
        store.store_usermap(&page.usermap)?;
        stats.usernames += page.usermap.len();

        let meta_only = page.pass == CommentPass::Meta;
        store.store_comments(&page.comment_map(), meta_only)?;
        if meta_only {
            stats.comments_meta += page.comments.len();
        } else {
            stats.comments_full += page.comments.len();
        }

        progress(SyncProgress::Comments {
            pass: page.pass,
            start: page.start,
            max_id: page.max_id,
        });
    }

    let remaining = cursor.into_remaining();
    if !remaining.is_empty() {
        info!("{} comments have no body yet", remaining.len());
    }
    Ok(())
}
