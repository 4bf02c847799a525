//! Entry sync cursor
//!
//! Listing walks `syncitems` until the server's total is accounted for and
//! records a stub (item id and change time) for every entry-typed item.
//! Fetching then pulls full entries with `getevents`, restarting from the
//! token the sync began at, until no stubs remain.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::error::{JournalError, Result};
use crate::models::{Entry, SyncToken};
use crate::protocol::{EventSelector, ProtocolClient, SyncItem};

/// Prefix of `syncitems` keys that name journal entries
const ENTRY_KEY_PREFIX: &str = "L-";

/// Phase of an entry sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySyncState {
    Listing,
    Fetching,
    Done,
}

/// Result of one [`EntrySyncCursor::advance`] step
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPage {
    /// Phase the page belonged to
    pub state: EntrySyncState,
    /// Items listed (while listing) or entries fetched (while fetching) so far
    pub fetched: u64,
    /// Total the current phase is working towards
    pub total: u64,
    /// Entries retrieved by this page; always empty while listing
    pub entries: Vec<Entry>,
}

/// Resumable, page-at-a-time entry sync
///
/// Call [`advance`](Self::advance) until it returns `None`. After each page
/// [`resume_token`](Self::resume_token) is safe to persist: a new cursor
/// started from it never misses an entry.
pub struct EntrySyncCursor<'a> {
    client: &'a ProtocolClient,
    strict: bool,
    state: EntrySyncState,
    /// Token the sync started from
    initial: Option<SyncToken>,
    /// Latest change time seen while listing
    listing_token: Option<SyncToken>,
    /// Latest change time of a fetched entry
    fetch_token: Option<SyncToken>,
    /// Entries still to fetch: item id to change time
    pending: BTreeMap<u64, String>,
    /// Keys of every item listed so far, entries or not
    seen: HashSet<String>,
    /// Total reported by the first listing page
    grand_total: Option<u64>,
    listed: u64,
    stubs: u64,
    fetched: u64,
}

impl<'a> EntrySyncCursor<'a> {
    /// Start a sync after `lastsync` (or from the beginning if `None`)
    pub fn new(client: &'a ProtocolClient, lastsync: Option<SyncToken>) -> Self {
        Self {
            client,
            strict: false,
            state: EntrySyncState::Listing,
            listing_token: lastsync.clone(),
            fetch_token: lastsync.clone(),
            initial: lastsync,
            pending: BTreeMap::new(),
            seen: HashSet::new(),
            grand_total: None,
            listed: 0,
            stubs: 0,
            fetched: 0,
        }
    }

    /// Reject entry properties this crate does not recognize
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn state(&self) -> EntrySyncState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == EntrySyncState::Done
    }

    /// Number of entries still waiting to be fetched
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Token to persist so a later sync resumes without gaps
    pub fn resume_token(&self) -> Option<&SyncToken> {
        match self.state {
            EntrySyncState::Listing => self.initial.as_ref(),
            EntrySyncState::Fetching => self.fetch_token.as_ref(),
            EntrySyncState::Done => self.listing_token.as_ref(),
        }
    }

    /// Perform one protocol round and report progress
    ///
    /// Returns `None` once the sync is complete.
    pub fn advance(&mut self) -> Result<Option<EntryPage>> {
        match self.state {
            EntrySyncState::Listing => self.list_page().map(Some),
            EntrySyncState::Fetching => self.fetch_page().map(Some),
            EntrySyncState::Done => Ok(None),
        }
    }

    fn list_page(&mut self) -> Result<EntryPage> {
        let page = self.client.sync_items(self.listing_token.as_ref())?;

        // Items at the resume token itself may be delivered again
        let mut page_keys = HashSet::new();
        let fresh: Vec<&SyncItem> = page
            .items
            .iter()
            .filter(|item| {
                !self.seen.contains(&item.key) && page_keys.insert(item.key.as_str())
            })
            .collect();
        self.check_listing(page.total, fresh.len() as u64)?;

        let mut stubs = Vec::new();
        for item in &fresh {
            let Some(id) = item.key.strip_prefix(ENTRY_KEY_PREFIX) else {
                continue;
            };
            let itemid: u64 = id
                .parse()
                .map_err(|_| JournalError::decode(format!("invalid sync item {:?}", item.key)))?;
            stubs.push((itemid, item.time.as_str()));
        }

        for item in &page.items {
            SyncToken::advance(&mut self.listing_token, &item.time);
        }
        for (itemid, time) in stubs {
            let pending = self.pending.entry(itemid).or_default();
            if time > pending.as_str() {
                *pending = time.to_string();
            }
        }
        self.seen.extend(fresh.iter().map(|item| item.key.clone()));

        self.listed += fresh.len() as u64;
        let total = self.grand_total.unwrap_or(self.listed);
        debug!(
            "Listed {}/{} sync items ({} already seen)",
            self.listed,
            total,
            page.items.len() - fresh.len()
        );

        if self.listed >= total {
            self.stubs = self.pending.len() as u64;
            if self.pending.is_empty() {
                info!("Sync listing found no changed entries");
                self.state = EntrySyncState::Done;
            } else {
                info!("Sync listing complete, {} entries to fetch", self.stubs);
                self.state = EntrySyncState::Fetching;
            }
        }

        Ok(EntryPage {
            state: EntrySyncState::Listing,
            fetched: self.listed,
            total,
            entries: Vec::new(),
        })
    }

    /// Hold the listing to the total the first page reported
    ///
    /// Each page's total counts the items remaining after the requested
    /// token, so items listed before this page plus the page's total must
    /// still reach the first page's total. Only keys not listed before count.
    fn check_listing(&mut self, page_total: u64, fresh: u64) -> Result<()> {
        let grand_total = *self.grand_total.get_or_insert(page_total);

        if self.listed + page_total < grand_total {
            return Err(JournalError::InconsistentListing(format!(
                "server total shrank to {} remaining after {} of {} items",
                page_total, self.listed, grand_total
            )));
        }

        let listed = self.listed + fresh;
        if listed > grand_total {
            return Err(JournalError::InconsistentListing(format!(
                "server delivered {} items but reported a total of {}",
                listed, grand_total
            )));
        }
        if fresh == 0 && listed < grand_total {
            return Err(JournalError::InconsistentListing(format!(
                "server stopped after {} of {} items",
                listed, grand_total
            )));
        }
        Ok(())
    }

    fn fetch_page(&mut self) -> Result<EntryPage> {
        let selector = EventSelector::SyncItems(self.fetch_token.clone());
        let events = self.client.get_events(&selector, self.strict)?;

        let mut removed = 0;
        for itemid in events.keys() {
            match self.pending.remove(itemid) {
                Some(time) => {
                    SyncToken::advance(&mut self.fetch_token, &time);
                    removed += 1;
                }
                None => debug!("Entry {} was not in the sync listing", itemid),
            }
        }

        if removed == 0 {
            return Err(JournalError::InconsistentListing(format!(
                "getevents returned none of the {} pending entries",
                self.pending.len()
            )));
        }

        self.fetched += removed;
        debug!("Fetched {}/{} entries", self.fetched, self.stubs);

        if self.pending.is_empty() {
            info!("Entry sync complete, {} entries fetched", self.fetched);
            self.state = EntrySyncState::Done;
        }

        Ok(EntryPage {
            state: EntrySyncState::Fetching,
            fetched: self.fetched,
            total: self.stubs,
            entries: events.into_values().collect(),
        })
    }
}
