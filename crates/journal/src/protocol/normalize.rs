//! Conversion between flat-protocol records and domain models

use log::debug;

use super::wire::{ArrayItem, RequestEnvelope};
use crate::error::{JournalError, Result};
use crate::models::{
    CommentSetting, Entry, Friend, FriendKind, KNOWN_EXTRA_PROPS, Screening, Security,
    parse_ljtime,
};

/// Build an entry from one `events_N_*` record
///
/// Properties arrive separately and are folded in with [`apply_prop`].
pub fn entry_from_event(event: &ArrayItem<'_>) -> Result<Entry> {
    let itemid = event.require_u64("itemid")?;
    let anum = event.get_u32("anum")?.unwrap_or(0);

    let eventtime = event.require("eventtime")?;
    let time = parse_ljtime(eventtime)
        .ok_or_else(|| JournalError::decode(format!("bad eventtime {:?}", eventtime)))?;

    let mut entry = Entry::builder(decode_event_text(event.require("event")?)?, time)
        .itemid(itemid, anum)
        .build();
    entry.subject = event.get("subject").map(str::to_string);
    entry.security = parse_security(event.get("security"), event.get("allowmask"))?;
    Ok(entry)
}

/// Fold one property into an entry
///
/// Known properties set typed attributes. Anything else is kept verbatim in
/// `props`, unless `strict` is set and the name is not a known extra.
pub fn apply_prop(entry: &mut Entry, name: &str, value: &str, strict: bool) -> Result<()> {
    match name {
        "current_mood" => entry.mood = Some(value.to_string()),
        "current_moodid" => {
            let moodid = value
                .parse()
                .map_err(|_| JournalError::decode(format!("bad current_moodid {:?}", value)))?;
            entry.moodid = Some(moodid);
        }
        "current_music" => entry.music = Some(value.to_string()),
        "current_location" => entry.location = Some(value.to_string()),
        "picture_keyword" => entry.pickeyword = Some(value.to_string()),
        "taglist" => {
            let mut tags: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            tags.sort();
            entry.taglist = tags;
        }
        "opt_preformatted" => entry.preformatted = value == "1",
        "opt_backdated" => entry.backdated = value == "1",
        "opt_nocomments" => {
            if value == "1" {
                entry.comments = CommentSetting::None;
            }
        }
        "opt_noemail" => {
            if value == "1" && entry.comments != CommentSetting::None {
                entry.comments = CommentSetting::NoEmail;
            }
        }
        "opt_screening" => {
            entry.screening = Screening::from_wire(value)
                .ok_or_else(|| JournalError::decode(format!("bad opt_screening {:?}", value)))?;
        }
        "hasscreened" => entry.has_screened = value == "1",
        _ => {
            if strict && !KNOWN_EXTRA_PROPS.contains(&name) {
                return Err(JournalError::UnknownField {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
            debug!("Keeping unrecognized property {} on item {}", name, entry.itemid);
            entry.props.insert(name.to_string(), value.to_string());
        }
    }
    Ok(())
}

/// Add an entry's content, time, security and properties to a request
pub fn entry_params(entry: &Entry, req: &mut RequestEnvelope) {
    req.insert("event", &entry.event);
    req.insert("lineendings", "unix");
    req.insert("subject", entry.subject.as_deref().unwrap_or(""));

    match entry.security {
        Security::Public => req.insert("security", "public"),
        Security::Private => req.insert("security", "private"),
        Security::Friends => {
            req.insert("security", "usemask");
            req.insert("allowmask", 1);
        }
        Security::Custom(mask) => {
            req.insert("security", "usemask");
            req.insert("allowmask", mask);
        }
    }

    let time = &entry.time;
    req.insert("year", time.format("%Y"));
    req.insert("mon", time.format("%-m"));
    req.insert("day", time.format("%-d"));
    req.insert("hour", time.format("%-H"));
    req.insert("min", time.format("%-M"));

    let flag = |on: bool| if on { "1" } else { "0" };
    let props: [(&str, String); 11] = [
        ("current_mood", entry.mood.clone().unwrap_or_default()),
        (
            "current_moodid",
            entry.moodid.map(|id| id.to_string()).unwrap_or_default(),
        ),
        ("current_music", entry.music.clone().unwrap_or_default()),
        ("current_location", entry.location.clone().unwrap_or_default()),
        ("picture_keyword", entry.pickeyword.clone().unwrap_or_default()),
        ("taglist", entry.taglist.join(", ")),
        ("opt_preformatted", flag(entry.preformatted).to_string()),
        (
            "opt_nocomments",
            flag(entry.comments == CommentSetting::None).to_string(),
        ),
        (
            "opt_noemail",
            flag(entry.comments == CommentSetting::NoEmail).to_string(),
        ),
        ("opt_backdated", flag(entry.backdated).to_string()),
        ("opt_screening", entry.screening.as_wire().to_string()),
    ];
    for (name, value) in props {
        req.insert(format!("prop_{}", name), value);
    }
}

/// Build a friend from one `friend_N_*` or `friendof_N_*` record
pub fn friend_from_item(item: &ArrayItem<'_>) -> Result<Friend> {
    let kind = FriendKind::from_wire(item.get("type")).ok_or_else(|| {
        JournalError::decode(format!("unknown friend type: {:?}", item.get("type")))
    })?;

    Ok(Friend {
        username: item.require("user")?.to_string(),
        fullname: item.get("name").map(str::to_string),
        foreground: item.get("fg").map(str::to_string),
        background: item.get("bg").map(str::to_string),
        groupmask: item.get_u32("groupmask")?,
        kind,
    })
}

/// Entry text comes back URL-encoded so it can span lines
fn decode_event_text(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|text| text.into_owned())
        .map_err(|e| JournalError::decode(format!("bad event encoding: {}", e)))
}

fn parse_security(security: Option<&str>, allowmask: Option<&str>) -> Result<Security> {
    match security {
        None | Some("public") => Ok(Security::Public),
        Some("private") => Ok(Security::Private),
        Some("usemask") => {
            let mask: u32 = allowmask
                .unwrap_or("0")
                .parse()
                .map_err(|_| JournalError::decode(format!("bad allowmask {:?}", allowmask)))?;
            if mask == 1 {
                Ok(Security::Friends)
            } else {
                Ok(Security::Custom(mask))
            }
        }
        Some(other) => Err(JournalError::decode(format!(
            "unknown security level {:?}",
            other
        ))),
    }
}
