//! Journal crate - Client-side sync engine for a remote journal service
//!
//! This crate provides:
//! - The flat protocol client with challenge-response authentication
//! - Domain models (Entry, Comment, Friend) and persisted sync state
//! - Tree-based and streaming decoders for the comment export
//! - Resumable entry and comment sync cursors
//! - Storage trait abstractions and a full-sync driver
//!
//! All protocol calls are blocking and strictly sequential within a sync.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod protocol;
pub mod storage;
pub mod sync;

pub use config::JournalConfig;
pub use error::{JournalError, Result};
pub use export::{CommentDecoder, CommentExportPage, TreeDecoder, default_decoder};
#[cfg(feature = "streaming")]
pub use export::StreamDecoder;
pub use models::{
    Comment, CommentPosition, CommentSetting, CommentState, Entry, Friend, FriendKind, Screening,
    Security, SyncToken,
};
pub use protocol::{
    Credential, EventSelector, FriendLists, FriendsUpdate, ProtocolClient, Transport,
    UreqTransport,
};
pub use storage::{InMemoryJournalStore, JournalStore};
pub use sync::{
    CommentPage, CommentPass, CommentSyncCursor, EntryPage, EntrySyncCursor, EntrySyncState,
    SyncOptions, SyncProgress, SyncStats, merge_comment, poll_interval_elapsed, sync_journal,
};
