//! Journal entry (post) model

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format of timestamps on the flat protocol, e.g. `2005-12-04 10:24:00`
const LJTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LJTIME_FORMAT_SHORT: &str = "%Y-%m-%d %H:%M";

/// Properties the server is known to send that have no typed attribute.
/// They are kept in [`Entry::props`] even in strict mode.
pub const KNOWN_EXTRA_PROPS: &[&str] = &[
    "revnum",
    "revtime",
    "commentalter",
    "unknown8bit",
    "useragent",
];

/// Who may read an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    #[default]
    Public,
    Private,
    /// All friends (allowmask 1)
    Friends,
    /// A custom friend-group bitmask
    Custom(u32),
}

/// Comment policy for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommentSetting {
    #[default]
    Normal,
    /// Comments disabled
    None,
    /// Comments allowed, but no email notifications
    NoEmail,
}

/// Which comments are screened on arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Screening {
    /// Use the journal default
    #[default]
    Default,
    All,
    Anonymous,
    NonFriends,
    None,
}

impl Screening {
    /// Wire value of the `opt_screening` property
    pub fn as_wire(&self) -> &'static str {
        match self {
            Screening::Default => "",
            Screening::All => "A",
            Screening::Anonymous => "R",
            Screening::NonFriends => "F",
            Screening::None => "N",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "" => Some(Screening::Default),
            "A" => Some(Screening::All),
            "R" => Some(Screening::Anonymous),
            "F" => Some(Screening::NonFriends),
            "N" => Some(Screening::None),
            _ => None,
        }
    }
}

/// A journal entry
///
/// Entries are replaced wholesale when re-delivered; they are never
/// merged field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub itemid: u64,
    /// Random number the server mixes into public URLs
    pub anum: u32,
    pub subject: Option<String>,
    /// Entry body
    pub event: String,
    pub moodid: Option<u32>,
    pub mood: Option<String>,
    pub music: Option<String>,
    pub location: Option<String>,
    /// Tags, kept sorted
    pub taglist: Vec<String>,
    pub pickeyword: Option<String>,
    pub preformatted: bool,
    pub backdated: bool,
    pub comments: CommentSetting,
    /// Display time chosen by the author. No time zone, minute precision.
    pub time: NaiveDateTime,
    pub security: Security,
    pub screening: Screening,
    pub has_screened: bool,
    /// Properties without a typed attribute
    pub props: BTreeMap<String, String>,
}

impl Entry {
    /// Create a new entry builder
    pub fn builder(event: impl Into<String>, time: NaiveDateTime) -> EntryBuilder {
        EntryBuilder::new(event.into(), time)
    }

    /// Numeric id used in public URLs
    pub fn display_itemid(&self) -> u64 {
        (self.itemid << 8) + u64::from(self.anum)
    }

    /// Public URL of the entry on the default server
    pub fn url(&self, journal: &str) -> String {
        format!(
            "https://{}.livejournal.com/{}.html",
            journal.replace('_', "-"),
            self.display_itemid()
        )
    }
}

/// Builder for creating Entry instances
pub struct EntryBuilder {
    entry: Entry,
}

impl EntryBuilder {
    fn new(event: String, time: NaiveDateTime) -> Self {
        Self {
            entry: Entry {
                itemid: 0,
                anum: 0,
                subject: None,
                event,
                moodid: None,
                mood: None,
                music: None,
                location: None,
                taglist: Vec::new(),
                pickeyword: None,
                preformatted: false,
                backdated: false,
                comments: CommentSetting::Normal,
                time: truncate_to_minute(time),
                security: Security::Public,
                screening: Screening::Default,
                has_screened: false,
                props: BTreeMap::new(),
            },
        }
    }

    pub fn itemid(mut self, itemid: u64, anum: u32) -> Self {
        self.entry.itemid = itemid;
        self.entry.anum = anum;
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.entry.subject = Some(subject.into());
        self
    }

    pub fn mood(mut self, moodid: Option<u32>, mood: Option<String>) -> Self {
        self.entry.moodid = moodid;
        self.entry.mood = mood;
        self
    }

    pub fn music(mut self, music: impl Into<String>) -> Self {
        self.entry.music = Some(music.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.entry.location = Some(location.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry.taglist = tags.into_iter().map(Into::into).collect();
        self.entry.taglist.sort();
        self
    }

    pub fn pickeyword(mut self, keyword: impl Into<String>) -> Self {
        self.entry.pickeyword = Some(keyword.into());
        self
    }

    pub fn preformatted(mut self, preformatted: bool) -> Self {
        self.entry.preformatted = preformatted;
        self
    }

    pub fn backdated(mut self, backdated: bool) -> Self {
        self.entry.backdated = backdated;
        self
    }

    pub fn comments(mut self, comments: CommentSetting) -> Self {
        self.entry.comments = comments;
        self
    }

    pub fn security(mut self, security: Security) -> Self {
        self.entry.security = security;
        self
    }

    pub fn screening(mut self, screening: Screening) -> Self {
        self.entry.screening = screening;
        self
    }

    pub fn build(self) -> Entry {
        self.entry
    }
}

/// Drop seconds and sub-second precision; the server only keeps minutes.
pub fn truncate_to_minute(time: NaiveDateTime) -> NaiveDateTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Format a time the way the flat protocol expects it
pub fn format_ljtime(time: &NaiveDateTime) -> String {
    time.format(LJTIME_FORMAT).to_string()
}

/// Parse a flat-protocol time. Seconds, if present, are discarded.
pub fn parse_ljtime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, LJTIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, LJTIME_FORMAT_SHORT))
        .ok()
        .map(truncate_to_minute)
}
