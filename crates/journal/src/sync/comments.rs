//! Comment sync cursor
//!
//! Two passes over the comment id space: the metadata pass (poster, state,
//! linkage) and then the body pass (subject, text, date). Both page by
//! start id and share one lazily created web session.

use std::collections::BTreeMap;

use log::{debug, info};

use super::merge::merge_comment;
use crate::error::{JournalError, Result};
use crate::export::{CommentDecoder, default_decoder};
use crate::models::{Comment, CommentPosition};
use crate::protocol::{ExportKind, ProtocolClient};

/// Which traversal a comment page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentPass {
    Meta,
    Body,
    Done,
}

/// Result of one [`CommentSyncCursor::advance`] step
#[derive(Debug, Clone, PartialEq)]
pub struct CommentPage {
    pub pass: CommentPass,
    /// Start id the page was requested with
    pub start: u64,
    /// Highest comment id in the journal, once known
    pub max_id: Option<u64>,
    /// Comments on this page, merged with everything seen earlier
    pub comments: Vec<Comment>,
    /// Poster id to username, as delivered by this page
    pub usermap: BTreeMap<u64, String>,
}

impl CommentPage {
    /// Comments keyed by id, the shape storage expects
    pub fn comment_map(&self) -> BTreeMap<u64, Comment> {
        self.comments
            .iter()
            .map(|c| (c.comment_id, c.clone()))
            .collect()
    }
}

/// Resumable, page-at-a-time comment sync
///
/// The session token is created on the first fetch and kept for the
/// lifetime of the cursor. A cursor must not be shared between callers.
pub struct CommentSyncCursor<'a> {
    client: &'a ProtocolClient,
    decoder: Box<dyn CommentDecoder>,
    session: Option<String>,
    pass: CommentPass,
    position: CommentPosition,
    /// Merged records from the metadata pass still waiting for a body
    accumulated: BTreeMap<u64, Comment>,
}

impl<'a> CommentSyncCursor<'a> {
    /// Sync every comment from id 0
    pub fn new(client: &'a ProtocolClient) -> Self {
        Self::resume(client, CommentPosition::fresh())
    }

    /// Continue from a previously persisted position
    pub fn resume(client: &'a ProtocolClient, position: CommentPosition) -> Self {
        Self {
            client,
            decoder: default_decoder(),
            session: None,
            pass: CommentPass::Meta,
            position,
            accumulated: BTreeMap::new(),
        }
    }

    /// Use a specific decoder instead of the default one
    pub fn with_decoder(mut self, decoder: Box<dyn CommentDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn pass(&self) -> CommentPass {
        self.pass
    }

    pub fn is_done(&self) -> bool {
        self.pass == CommentPass::Done
    }

    /// Current position, safe to persist between pages
    pub fn position(&self) -> CommentPosition {
        self.position
    }

    /// Fetch and merge the next page
    ///
    /// Returns `None` once both passes are finished.
    pub fn advance(&mut self) -> Result<Option<CommentPage>> {
        loop {
            match self.pass {
                CommentPass::Done => return Ok(None),
                CommentPass::Meta if self.exhausted(self.position.meta_start) => {
                    self.finish_meta();
                }
                CommentPass::Body if self.exhausted(self.position.body_start) => {
                    self.finish_body();
                }
                pass => return self.fetch(pass).map(Some),
            }
        }
    }

    /// Comments that never received a body, consuming the cursor
    pub fn into_remaining(self) -> Vec<Comment> {
        self.accumulated.into_values().collect()
    }

    /// Whether `start` is past the known end of the comment stream
    fn exhausted(&self, start: u64) -> bool {
        self.position
            .max_id
            .is_some_and(|max| max == 0 || start > max)
    }

    fn finish_meta(&mut self) {
        info!(
            "Comment metadata pass complete, {} comments pending bodies",
            self.accumulated.len()
        );
        self.pass = CommentPass::Body;
    }

    fn finish_body(&mut self) {
        info!("Comment body pass complete");
        self.pass = CommentPass::Done;
    }

    fn session(&mut self) -> Result<String> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        debug!("Generating export session");
        let session = self.client.generate_session()?;
        self.session = Some(session.clone());
        Ok(session)
    }

    fn fetch(&mut self, pass: CommentPass) -> Result<CommentPage> {
        let (kind, start) = match pass {
            CommentPass::Meta => (ExportKind::Meta, self.position.meta_start),
            _ => (ExportKind::Body, self.position.body_start),
        };

        let session = self.session()?;
        let document = self.client.export_comments(kind, start, &session)?;
        let page = self.decoder.decode(&document)?;

        let next = match page.last_id() {
            Some(last) if last < start => {
                return Err(JournalError::protocol(format!(
                    "comment export for start id {} returned ids only up to {}",
                    start, last
                )));
            }
            Some(last) => Some(last + 1),
            None => None,
        };
        debug!(
            "Decoded {} comments from {:?} page at {} ({} decoder)",
            page.comments.len(),
            pass,
            start,
            self.decoder.name()
        );

        // Nothing is committed until every comment on the page merges
        let mut merged = BTreeMap::new();
        for (id, incoming) in page.comments {
            let comment = match self.accumulated.get(&id) {
                Some(existing) => merge_comment(existing.clone(), incoming)?,
                None => incoming,
            };
            merged.insert(id, comment);
        }

        if self.position.max_id.is_none() {
            if let Some(max_id) = page.max_id {
                info!("Journal has comments up to id {}", max_id);
                self.position.max_id = Some(max_id);
            }
        }
        for (id, comment) in &merged {
            if pass == CommentPass::Body {
                self.accumulated.remove(id);
            } else {
                self.accumulated.insert(*id, comment.clone());
            }
        }
        let comments: Vec<Comment> = merged.into_values().collect();

        let finished = match next {
            Some(next) => {
                match pass {
                    CommentPass::Meta => self.position.meta_start = next,
                    _ => self.position.body_start = next,
                }
                self.exhausted(next)
            }
            None => true,
        };
        if finished {
            match pass {
                CommentPass::Meta => self.finish_meta(),
                _ => self.finish_body(),
            }
        }

        Ok(CommentPage {
            pass,
            start,
            max_id: self.position.max_id,
            comments,
            usermap: page.usermap,
        })
    }
}
