//! Persisted sync progress
//!
//! Entry sync is resumed from a [`SyncToken`]; comment sync from a
//! [`CommentPosition`]. Both are small enough for the caller to keep in
//! whatever metadata store it already has.

use serde::{Deserialize, Serialize};

/// Opaque entry-sync resume token
///
/// Server timestamps in `YYYY-MM-DD HH:MM:SS` form, so string order is
/// time order. Tokens only ever move forward.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(pub String);

impl SyncToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Advance `current` to `candidate` if the candidate is later
    pub fn advance(current: &mut Option<SyncToken>, candidate: &str) {
        let later = match current {
            Some(token) => candidate > token.as_str(),
            None => true,
        };
        if later {
            *current = Some(SyncToken::new(candidate));
        }
    }
}

impl From<&str> for SyncToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SyncToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Where a comment sync stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPosition {
    /// Highest comment id in the journal, once the server has reported it
    pub max_id: Option<u64>,
    /// Next id the metadata pass will request
    pub meta_start: u64,
    /// Next id the body pass will request
    pub body_start: u64,
}

impl CommentPosition {
    /// Position for a journal that has never been synced
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Position continuing after the highest ids already stored
    pub fn after(last_meta: Option<u64>, last_body: Option<u64>) -> Self {
        Self {
            max_id: None,
            meta_start: last_meta.map_or(0, |id| id + 1),
            body_start: last_body.map_or(0, |id| id + 1),
        }
    }
}
