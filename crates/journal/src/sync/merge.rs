//! Merging partial records delivered by separate passes

use std::collections::BTreeMap;

use log::debug;

use crate::error::{JournalError, Result};
use crate::models::{Comment, Entry};

/// Combine two fragments of the same comment
///
/// Every field takes whichever side defines it. A field defined on both
/// sides with different values is a [`JournalError::Conflict`] naming the
/// field.
pub fn merge_comment(existing: Comment, incoming: Comment) -> Result<Comment> {
    let id = existing.comment_id;
    if incoming.comment_id != id {
        return Err(JournalError::Conflict {
            comment_id: id,
            field: "id",
        });
    }

    Ok(Comment {
        comment_id: id,
        poster_id: pick(id, "posterid", existing.poster_id, incoming.poster_id)?,
        item_id: pick(id, "jitemid", existing.item_id, incoming.item_id)?,
        parent_id: pick(id, "parentid", existing.parent_id, incoming.parent_id)?,
        state: pick(id, "state", existing.state, incoming.state)?,
        subject: pick(id, "subject", existing.subject, incoming.subject)?,
        body: pick(id, "body", existing.body, incoming.body)?,
        time: pick(id, "date", existing.time, incoming.time)?,
    })
}

/// Fold `incoming` into `accumulator`, returning the merged record
///
/// The accumulator is left untouched when the merge fails.
pub fn merge_into(accumulator: &mut BTreeMap<u64, Comment>, incoming: Comment) -> Result<Comment> {
    let id = incoming.comment_id;
    let merged = match accumulator.get(&id) {
        Some(existing) => merge_comment(existing.clone(), incoming)?,
        None => incoming,
    };
    accumulator.insert(id, merged.clone());
    Ok(merged)
}

/// Entries are replaced wholesale by a later delivery of the same id
pub fn merge_entry(existing: Option<Entry>, incoming: Entry) -> Entry {
    if let Some(old) = existing {
        if old != incoming {
            debug!("Replacing entry {}", incoming.itemid);
        }
    }
    incoming
}

fn pick<T: PartialEq>(
    comment_id: u64,
    field: &'static str,
    existing: Option<T>,
    incoming: Option<T>,
) -> Result<Option<T>> {
    match (existing, incoming) {
        (Some(a), Some(b)) if a != b => Err(JournalError::Conflict { comment_id, field }),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}
