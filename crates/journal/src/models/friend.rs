//! Friend relationships

use serde::{Deserialize, Serialize};

/// Kind of account on the other side of a friend relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FriendKind {
    User,
    Community,
    News,
    Syndicated,
    Shared,
}

impl FriendKind {
    /// Parse the `type` field; personal journals carry none
    pub fn from_wire(value: Option<&str>) -> Option<Self> {
        match value {
            None => Some(FriendKind::User),
            Some("community") => Some(FriendKind::Community),
            Some("news") => Some(FriendKind::News),
            Some("syndicated") => Some(FriendKind::Syndicated),
            Some("shared") => Some(FriendKind::Shared),
            Some(_) => None,
        }
    }
}

/// One entry of a friends or friend-of list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub username: String,
    pub fullname: Option<String>,
    /// Foreground color as an HTML color, e.g. `#ff0000`
    pub foreground: Option<String>,
    pub background: Option<String>,
    /// Bitfield of friend groups
    pub groupmask: Option<u32>,
    pub kind: FriendKind,
}

impl std::fmt::Display for Friend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fullname {
            Some(name) => write!(f, "{}: {}", self.username, name),
            None => write!(f, "{}", self.username),
        }
    }
}
