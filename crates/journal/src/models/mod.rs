//! Domain models for journal entities

mod comment;
mod entry;
mod friend;
mod sync_state;

pub use comment::{Comment, CommentState};
pub use entry::{
    CommentSetting, Entry, EntryBuilder, KNOWN_EXTRA_PROPS, Screening, Security, format_ljtime,
    parse_ljtime, truncate_to_minute,
};
pub use friend::{Friend, FriendKind};
pub use sync_state::{CommentPosition, SyncToken};
