//! Flat protocol client
//!
//! Builds authenticated requests, sends them through a [`Transport`] and
//! turns non-OK responses into typed errors. The per-operation methods are
//! thin wrappers over [`ProtocolClient::call`].

use std::collections::BTreeMap;

use log::{debug, warn};

use super::auth::Credential;
use super::normalize::{apply_prop, entry_from_event, entry_params, friend_from_item};
use super::transport::Transport;
use super::wire::{RequestEnvelope, ResponseEnvelope};
use crate::error::{JournalError, Result};
use crate::models::{Entry, Friend, SyncToken};

/// Path of the flat protocol endpoint
pub const FLAT_PATH: &str = "/interface/flat";
/// Path of the comment export endpoint
pub const EXPORT_PATH: &str = "/export_comments.bml";

/// Which entries a `getevents` call selects
#[derive(Debug, Clone, PartialEq)]
pub enum EventSelector {
    /// A single item
    One(u64),
    /// The most recent N items
    LastN(u32),
    /// Items changed after the given sync token (all items if `None`)
    SyncItems(Option<SyncToken>),
}

/// One `syncitems` record: an item key such as `L-12` and its change time
#[derive(Debug, Clone, PartialEq)]
pub struct SyncItem {
    pub key: String,
    pub time: String,
}

/// One page of `syncitems`
#[derive(Debug, Clone, PartialEq)]
pub struct SyncItemsPage {
    pub items: Vec<SyncItem>,
    /// Number of items the server reports as changed since the requested token
    pub total: u64,
}

/// Result of `getfriends`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FriendLists {
    pub friends: Vec<Friend>,
    /// Only filled when friend-ofs were requested
    pub friend_ofs: Vec<Friend>,
}

/// Result of `checkfriends`
#[derive(Debug, Clone, PartialEq)]
pub struct FriendsUpdate {
    /// Whether friends have posted since `last_update`
    pub has_new: bool,
    /// Opaque marker to pass to the next check
    pub last_update: Option<String>,
    /// Server-recommended seconds to wait before checking again
    pub interval_secs: u64,
}

/// Which half of the comment export to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Meta,
    Body,
}

impl ExportKind {
    fn as_param(&self) -> &'static str {
        match self {
            ExportKind::Meta => "comment_meta",
            ExportKind::Body => "comment_body",
        }
    }
}

/// Client for the journal's flat protocol
pub struct ProtocolClient {
    transport: Box<dyn Transport>,
    credential: Credential,
    client_tag: String,
}

impl ProtocolClient {
    /// Protocol version sent with every request
    const PROTOCOL_VERSION: u32 = 1;

    /// Default interval for `checkfriends` when the server sends none
    const DEFAULT_CHECK_INTERVAL_SECS: u64 = 90;

    pub fn new(transport: impl Transport + 'static, credential: Credential) -> Self {
        Self {
            transport: Box::new(transport),
            credential,
            client_tag: format!("Rust-journal/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Perform one flat-protocol call
    ///
    /// When `requires_auth` is set a fresh challenge is fetched first, so an
    /// authenticated call costs two round trips.
    pub fn call(
        &self,
        mode: &str,
        params: RequestEnvelope,
        requires_auth: bool,
    ) -> Result<ResponseEnvelope> {
        if let Some(key) = params.reserved_key() {
            return Err(JournalError::User(format!(
                "parameter '{}' is reserved by the client",
                key
            )));
        }

        let mut request = RequestEnvelope::new()
            .with("mode", mode)
            .with("clientversion", &self.client_tag)
            .with("ver", Self::PROTOCOL_VERSION);

        if requires_auth {
            let challenge = self.get_challenge()?;
            request.extend(self.credential.auth_fields(&challenge));
        }
        request.extend(params);

        debug!("Calling {} ({} parameters)", mode, request.iter().count());
        let response = self.transport.post_form(FLAT_PATH, &request.encode())?;
        if !response.is_success() {
            return Err(JournalError::Transport(format!(
                "HTTP {} from {} ({})",
                response.status, FLAT_PATH, mode
            )));
        }

        let envelope = ResponseEnvelope::decode(&response.body)?;
        if !envelope.is_ok() {
            let message = envelope
                .error_message()
                .unwrap_or("server reported failure without a message");
            return Err(JournalError::protocol(message));
        }
        Ok(envelope)
    }

    /// Obtain a one-time authentication challenge
    pub fn get_challenge(&self) -> Result<String> {
        let response = self.call("getchallenge", RequestEnvelope::new(), false)?;
        Ok(response.require("challenge")?.to_string())
    }

    /// Verify the credentials; returns the account's display name
    pub fn login(&self) -> Result<Option<String>> {
        let response = self.call("login", RequestEnvelope::new(), true)?;
        Ok(response.get("name").map(str::to_string))
    }

    /// Post a new entry, filling in its `itemid` and `anum`
    pub fn post_event(&self, entry: &mut Entry) -> Result<()> {
        let mut params = RequestEnvelope::new();
        entry_params(entry, &mut params);

        let response = self.call("postevent", params, true)?;
        entry.itemid = response
            .get_u64("itemid")?
            .ok_or_else(|| JournalError::decode("postevent response is missing 'itemid'"))?;
        entry.anum = response.get_u32("anum")?.unwrap_or(0);
        Ok(())
    }

    /// Replace an existing entry's content
    ///
    /// An empty event would delete the entry on the server, so it is
    /// refused here; use [`delete_event`](Self::delete_event) instead.
    pub fn edit_event(&self, entry: &Entry) -> Result<()> {
        if entry.event.is_empty() {
            return Err(JournalError::User(format!(
                "refusing to blank entry {} without an explicit delete",
                entry.itemid
            )));
        }

        let mut params = RequestEnvelope::new().with("itemid", entry.itemid);
        entry_params(entry, &mut params);
        self.call("editevent", params, true)?;
        Ok(())
    }

    /// Delete an entry (the server's API is an edit with an empty event)
    pub fn delete_event(&self, itemid: u64) -> Result<()> {
        let params = RequestEnvelope::new()
            .with("itemid", itemid)
            .with("event", "");
        self.call("editevent", params, true)?;
        Ok(())
    }

    /// Fetch entries keyed by itemid
    ///
    /// Unknown property names are kept in `props`, or rejected with
    /// [`JournalError::UnknownField`] when `strict` is set.
    pub fn get_events(&self, selector: &EventSelector, strict: bool) -> Result<BTreeMap<u64, Entry>> {
        let mut params = RequestEnvelope::new().with("lineendings", "unix");
        match selector {
            EventSelector::One(itemid) => {
                params.insert("selecttype", "one");
                params.insert("itemid", itemid);
            }
            EventSelector::LastN(count) => {
                params.insert("selecttype", "lastn");
                params.insert("howmany", count);
            }
            EventSelector::SyncItems(lastsync) => {
                params.insert("selecttype", "syncitems");
                if let Some(token) = lastsync {
                    params.insert("lastsync", token.as_str());
                }
            }
        }

        let response = self.call("getevents", params, true)?;

        let mut entries = BTreeMap::new();
        for event in response.array("events")? {
            let entry = entry_from_event(&event)?;
            entries.insert(entry.itemid, entry);
        }

        for prop in response.array("prop")? {
            let itemid = prop.require_u64("itemid")?;
            let name = prop.require("name")?;
            let value = prop.get("value").unwrap_or("");
            match entries.get_mut(&itemid) {
                Some(entry) => apply_prop(entry, name, value, strict)?,
                None if strict => {
                    return Err(JournalError::decode(format!(
                        "property '{}' for unknown item {}",
                        name, itemid
                    )));
                }
                None => warn!("Skipping property '{}' for unknown item {}", name, itemid),
            }
        }

        Ok(entries)
    }

    /// Fetch a single entry
    pub fn get_event(&self, itemid: u64, strict: bool) -> Result<Option<Entry>> {
        let mut entries = self.get_events(&EventSelector::One(itemid), strict)?;
        Ok(entries.remove(&itemid))
    }

    /// List items changed after `lastsync`
    pub fn sync_items(&self, lastsync: Option<&SyncToken>) -> Result<SyncItemsPage> {
        let mut params = RequestEnvelope::new();
        if let Some(token) = lastsync {
            params.insert("lastsync", token.as_str());
        }

        let response = self.call("syncitems", params, true)?;
        let total = response
            .get_u64("sync_total")?
            .ok_or_else(|| JournalError::decode("syncitems response is missing 'sync_total'"))?;

        let items = response
            .array("sync")?
            .map(|item| {
                Ok(SyncItem {
                    key: item.require("item")?.to_string(),
                    time: item.require("time")?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SyncItemsPage { items, total })
    }

    /// Create a web session, used as a cookie for the comment export
    pub fn generate_session(&self) -> Result<String> {
        let response = self.call("sessiongenerate", RequestEnvelope::new(), true)?;
        Ok(response.require("ljsession")?.to_string())
    }

    /// Fetch the friends list, optionally with the friend-of list in the same call
    pub fn get_friends(&self, include_friend_ofs: bool) -> Result<FriendLists> {
        let mut params = RequestEnvelope::new();
        if include_friend_ofs {
            params.insert("includefriendof", 1);
        }

        let response = self.call("getfriends", params, true)?;
        Ok(FriendLists {
            friends: collect_friends(&response, "friend")?,
            friend_ofs: collect_friends(&response, "friendof")?,
        })
    }

    /// Fetch the list of accounts that friended this one
    pub fn friend_of(&self) -> Result<Vec<Friend>> {
        let response = self.call("friendof", RequestEnvelope::new(), true)?;
        collect_friends(&response, "friendof")
    }

    /// Ask whether friends have posted since `last_update`
    ///
    /// The first check (without a marker) never reports new posts. Callers
    /// should wait `interval_secs` before checking again.
    pub fn check_friends(&self, last_update: Option<&str>) -> Result<FriendsUpdate> {
        let mut params = RequestEnvelope::new();
        if let Some(marker) = last_update {
            params.insert("lastupdate", marker);
        }

        let response = self.call("checkfriends", params, true)?;
        Ok(FriendsUpdate {
            has_new: response.flag("new"),
            last_update: response.get("lastupdate").map(str::to_string),
            interval_secs: response
                .get_u64("interval")?
                .unwrap_or(Self::DEFAULT_CHECK_INTERVAL_SECS),
        })
    }

    /// Fetch one page of the comment export starting at comment id `start`
    ///
    /// A rejected session (HTTP 401/403) is a protocol failure; other
    /// non-success statuses are transport failures.
    pub fn export_comments(&self, kind: ExportKind, start: u64, session: &str) -> Result<String> {
        let mut path = format!("{}?get={}&startid={}", EXPORT_PATH, kind.as_param(), start);
        if let Some(journal) = self.credential.usejournal() {
            path.push_str(&format!("&authas={}", urlencoding::encode(journal)));
        }

        debug!("Fetching {} from {}", kind.as_param(), start);
        let cookie = format!("ljsession={}", session);
        let response = self.transport.get(&path, &[("Cookie", cookie.as_str())])?;

        match response.status {
            200..=299 => Ok(response.body),
            401 | 403 => Err(JournalError::protocol(format!(
                "comment export rejected the session (HTTP {})",
                response.status
            ))),
            status => Err(JournalError::Transport(format!(
                "HTTP {} from {}",
                status, EXPORT_PATH
            ))),
        }
    }
}

fn collect_friends(response: &ResponseEnvelope, base: &str) -> Result<Vec<Friend>> {
    response
        .array(base)?
        .map(|item| friend_from_item(&item))
        .collect()
}
