//! Comment export decoding
//!
//! The export is an XML document:
//!
//! ```text
//! <livejournal>
//!   <maxid>421</maxid>
//!   <comments>
//!     <comment id='421' posterid='7' jitemid='1' parentid='2' state='S'>
//!       <subject>..</subject> <body>..</body> <date>2001-07-26T18:16:19Z</date>
//!     </comment>
//!   </comments>
//!   <usermaps><usermap id='7' user='someone'/></usermaps>
//! </livejournal>
//! ```
//!
//! The metadata and body halves of the export share this schema but fill
//! different fields. Two decoders are provided and must produce identical
//! pages for the same input.

mod tree;

#[cfg(feature = "streaming")]
mod stream;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{JournalError, Result};
use crate::models::{Comment, CommentState};

pub use tree::TreeDecoder;

#[cfg(feature = "streaming")]
pub use stream::StreamDecoder;

/// One decoded page of the comment export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentExportPage {
    /// Highest comment id in the whole journal, if this page reports it
    pub max_id: Option<u64>,
    pub comments: BTreeMap<u64, Comment>,
    /// Poster id to username
    pub usermap: BTreeMap<u64, String>,
}

impl CommentExportPage {
    /// Highest comment id on this page
    pub fn last_id(&self) -> Option<u64> {
        self.comments.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    fn comment_mut(&mut self, id: u64) -> &mut Comment {
        self.comments.entry(id).or_insert_with(|| Comment::new(id))
    }

    fn add_usermap(&mut self, id: Option<&str>, user: Option<&str>) -> Result<()> {
        let id = parse_id(id, "usermap")?;
        let user = user.ok_or_else(|| {
            JournalError::decode(format!("usermap {} has no 'user' attribute", id))
        })?;
        self.usermap.insert(id, user.to_string());
        Ok(())
    }
}

/// Decodes one comment export document
pub trait CommentDecoder: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn decode(&self, document: &str) -> Result<CommentExportPage>;
}

/// The preferred decoder: event-based when the `streaming` feature is
/// compiled in, tree-based otherwise.
pub fn default_decoder() -> Box<dyn CommentDecoder> {
    #[cfg(feature = "streaming")]
    {
        Box::new(StreamDecoder)
    }
    #[cfg(not(feature = "streaming"))]
    {
        Box::new(TreeDecoder)
    }
}

/// Start (or continue) the comment with the given attributes
///
/// Attributes present on the element overwrite earlier values; absent ones
/// leave the field as it was.
fn open_comment<'a>(
    page: &mut CommentExportPage,
    get: impl Fn(&str) -> Option<&'a str>,
) -> Result<u64> {
    let id = parse_id(get("id"), "comment")?;

    let poster_id = optional_id(get("posterid"), "posterid")?;
    let item_id = optional_id(get("jitemid"), "jitemid")?;
    let parent_id = optional_id(get("parentid"), "parentid")?;
    let state = match get("state") {
        Some(raw) => Some(CommentState::from_wire(Some(raw)).ok_or_else(|| {
            JournalError::decode(format!("comment {} has invalid state {:?}", id, raw))
        })?),
        None => None,
    };

    let comment = page.comment_mut(id);
    if poster_id.is_some() {
        comment.poster_id = poster_id;
    }
    if item_id.is_some() {
        comment.item_id = item_id;
    }
    if parent_id.is_some() {
        comment.parent_id = parent_id;
    }
    if state.is_some() {
        comment.state = state;
    }
    Ok(id)
}

/// Apply the text of a `<subject>`, `<body>` or `<date>` child
fn apply_field(comment: &mut Comment, field: &str, text: &str) -> Result<()> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    match field {
        "subject" => comment.subject = Some(text),
        "body" => comment.body = Some(text),
        "date" => {
            let time = DateTime::parse_from_rfc3339(text.trim()).map_err(|e| {
                JournalError::decode(format!(
                    "comment {} has invalid date {:?}: {}",
                    comment.comment_id, text, e
                ))
            })?;
            comment.time = Some(time.with_timezone(&Utc));
        }
        _ => {}
    }
    Ok(())
}

fn is_comment_field(name: &str) -> bool {
    matches!(name, "subject" | "body" | "date")
}

fn parse_max_id(text: &str) -> Result<u64> {
    text.trim()
        .parse()
        .map_err(|_| JournalError::decode(format!("invalid maxid {:?}", text)))
}

fn parse_id(value: Option<&str>, element: &str) -> Result<u64> {
    let value =
        value.ok_or_else(|| JournalError::decode(format!("{} has no 'id' attribute", element)))?;
    value
        .trim()
        .parse()
        .map_err(|_| JournalError::decode(format!("{} has invalid id {:?}", element, value)))
}

fn optional_id(value: Option<&str>, attribute: &str) -> Result<Option<u64>> {
    value
        .map(|v| {
            v.trim().parse().map_err(|_| {
                JournalError::decode(format!("invalid {} attribute {:?}", attribute, v))
            })
        })
        .transpose()
}
