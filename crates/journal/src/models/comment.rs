//! Comment model as delivered by the comment export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentState {
    Active,
    Deleted,
    Screened,
}

impl CommentState {
    /// Parse the export's `state` attribute. A missing attribute means active.
    pub fn from_wire(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("A") => Some(CommentState::Active),
            Some("D") => Some(CommentState::Deleted),
            Some("S") => Some(CommentState::Screened),
            Some(_) => None,
        }
    }

    /// Wire value; active comments carry no attribute
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            CommentState::Active => None,
            CommentState::Deleted => Some("D"),
            CommentState::Screened => Some("S"),
        }
    }
}

/// A comment, possibly only partially known
///
/// The metadata pass and the body pass of an export each fill a different
/// subset of fields. Unset fields stay `None` until the other pass supplies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: u64,
    pub poster_id: Option<u64>,
    /// Entry the comment belongs to
    pub item_id: Option<u64>,
    pub parent_id: Option<u64>,
    /// `None` when the page carried no `state` attribute
    pub state: Option<CommentState>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(comment_id: u64) -> Self {
        Self {
            comment_id,
            poster_id: None,
            item_id: None,
            parent_id: None,
            state: None,
            subject: None,
            body: None,
            time: None,
        }
    }

    /// Effective state; comments without an explicit state are active
    pub fn state(&self) -> CommentState {
        self.state.unwrap_or(CommentState::Active)
    }

    /// Whether the body pass has delivered this comment's content
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}
