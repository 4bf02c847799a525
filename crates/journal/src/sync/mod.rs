//! Sync engine for entries and comments
//!
//! Both cursors are strictly sequential: every page depends on the
//! previous one. Progress can be persisted between pages and a run
//! resumed later without re-fetching completed work.

mod comments;
mod entries;
mod journal;
mod merge;
mod timing;

pub use comments::{CommentPage, CommentPass, CommentSyncCursor};
pub use entries::{EntryPage, EntrySyncCursor, EntrySyncState};
pub use journal::{LASTSYNC_KEY, SyncOptions, SyncProgress, SyncStats, sync_journal};
pub use merge::{merge_comment, merge_entry, merge_into};
pub use timing::{next_poll_at, poll_interval_elapsed};
