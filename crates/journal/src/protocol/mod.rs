//! Journal flat protocol
//!
//! This module provides:
//! - Request/response framing for the key-value wire format
//! - Challenge-response authentication
//! - The protocol client and its per-operation wrappers
//! - Conversion of wire records to domain models

mod auth;
mod client;
mod normalize;
mod transport;
mod wire;

pub use auth::{Credential, challenge_response};
pub use client::{
    EXPORT_PATH, EventSelector, ExportKind, FLAT_PATH, FriendLists, FriendsUpdate, ProtocolClient,
    SyncItem, SyncItemsPage,
};
pub use normalize::{apply_prop, entry_from_event, entry_params, friend_from_item};
pub use transport::{HttpResponse, Transport, UreqTransport};
pub use wire::{ArrayItem, RESERVED_KEYS, RequestEnvelope, ResponseEnvelope};
