//! Integration tests for the journal crate
//!
//! These tests drive the client and both sync cursors against an
//! in-process fake server, from the wire format up to the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use journal::protocol::{
    HttpResponse, RequestEnvelope, ResponseEnvelope, Transport, challenge_response, entry_params,
};
use journal::sync::LASTSYNC_KEY;
use journal::{
    CommentPass, CommentState, CommentSyncCursor, Credential, Entry, EntrySyncCursor,
    EntrySyncState, FriendKind, InMemoryJournalStore, JournalError, JournalStore, ProtocolClient,
    Security, SyncOptions, SyncProgress, SyncToken, TreeDecoder, sync_journal,
};

const CHALLENGE: &str = "c0:1073113200:2831:60:2/nSfMIyU7tBzusVHFcb";
const SECRET: &str = "test";
const SESSION: &str = "ws:fake:1:abc";

/// An entry as the fake server keeps it: wire fields plus non-empty props
struct FakeRecord {
    itemid: u64,
    anum: u32,
    sync_time: String,
    fields: BTreeMap<String, String>,
    props: BTreeMap<String, String>,
}

impl FakeRecord {
    fn from_params(
        itemid: u64,
        anum: u32,
        sync_time: &str,
        params: &BTreeMap<String, String>,
    ) -> Self {
        let num = |key: &str| params[key].parse::<u32>().unwrap();
        let eventtime = format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:00",
            num("year"),
            num("mon"),
            num("day"),
            num("hour"),
            num("min")
        );

        let mut fields = BTreeMap::new();
        fields.insert(
            "event".to_string(),
            urlencoding::encode(&params["event"]).into_owned(),
        );
        fields.insert("eventtime".to_string(), eventtime);
        for key in ["subject", "security", "allowmask"] {
            if let Some(value) = params.get(key).filter(|v| !v.is_empty()) {
                fields.insert(key.to_string(), value.clone());
            }
        }

        // The server drops empty and zero-valued props
        let props = params
            .iter()
            .filter_map(|(k, v)| k.strip_prefix("prop_").map(|name| (name, v)))
            .filter(|(_, v)| !v.is_empty() && v.as_str() != "0")
            .map(|(name, v)| (name.to_string(), v.clone()))
            .collect();

        Self {
            itemid,
            anum,
            sync_time: sync_time.to_string(),
            fields,
            props,
        }
    }
}

struct FakeComment {
    poster: u64,
    jitemid: u64,
    parent: Option<u64>,
    state: Option<&'static str>,
    subject: Option<String>,
    body: String,
    date: String,
}

struct FakeState {
    records: Vec<FakeRecord>,
    /// Non-entry sync items (key, time)
    others: Vec<(String, String)>,
    comments: BTreeMap<u64, FakeComment>,
    users: BTreeMap<u64, String>,
    sync_page: usize,
    event_page: usize,
    comment_page: usize,
    /// Added to `sync_total` on every syncitems call after the first
    listing_drift: i64,
    /// Added to poster ids in body documents
    body_poster_offset: u64,
    syncitems_calls: usize,
    sessions: usize,
    export_requests: Vec<(String, u64)>,
    clock: u32,
}

#[derive(Clone)]
struct FakeJournal {
    state: Arc<Mutex<FakeState>>,
}

impl FakeJournal {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                records: Vec::new(),
                others: Vec::new(),
                comments: BTreeMap::new(),
                users: BTreeMap::new(),
                sync_page: 2,
                event_page: 2,
                comment_page: 2,
                listing_drift: 0,
                body_poster_offset: 0,
                syncitems_calls: 0,
                sessions: 0,
                export_requests: Vec::new(),
                clock: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn client(&self) -> ProtocolClient {
        ProtocolClient::new(self.clone(), Credential::new("ljrb_test", SECRET))
    }

    fn add_entry(&self, entry: &Entry, sync_time: &str) {
        let mut req = RequestEnvelope::new();
        entry_params(entry, &mut req);
        let params = req
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let record = FakeRecord::from_params(entry.itemid, entry.anum, sync_time, &params);
        self.state().records.push(record);
    }

    fn add_prop(&self, itemid: u64, name: &str, value: &str) {
        let mut state = self.state();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.itemid == itemid)
            .unwrap();
        record.props.insert(name.to_string(), value.to_string());
    }

    fn add_other(&self, key: &str, time: &str) {
        self.state().others.push((key.to_string(), time.to_string()));
    }

    fn add_comment(&self, id: u64, poster: u64, jitemid: u64, body: &str) {
        let mut state = self.state();
        state.users.entry(poster).or_insert_with(|| format!("user{}", poster));
        state.comments.insert(
            id,
            FakeComment {
                poster,
                jitemid,
                parent: None,
                state: None,
                subject: None,
                body: body.to_string(),
                date: "2005-12-04T10:24:00Z".to_string(),
            },
        );
    }
}

impl FakeState {
    fn syncitems(&mut self, params: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let lastsync = params.get("lastsync").cloned().unwrap_or_default();
        let mut items: Vec<(String, String)> = self
            .records
            .iter()
            .map(|r| (format!("L-{}", r.itemid), r.sync_time.clone()))
            .chain(self.others.iter().cloned())
            .filter(|(_, time)| *time > lastsync)
            .collect();
        items.sort_by(|a, b| a.1.cmp(&b.1));

        let mut total = items.len() as i64;
        if self.syncitems_calls > 0 {
            total += self.listing_drift;
        }
        self.syncitems_calls += 1;

        items.truncate(self.sync_page);
        let mut out = vec![
            pair("sync_total", total),
            pair("sync_count", items.len()),
        ];
        for (i, (key, time)) in items.into_iter().enumerate() {
            let n = i + 1;
            out.push(pair(format!("sync_{n}_item"), key));
            out.push(pair(format!("sync_{n}_time"), time));
            out.push(pair(format!("sync_{n}_action"), "create"));
        }
        out
    }

    fn getevents(&self, params: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let mut selected: Vec<&FakeRecord> = match params["selecttype"].as_str() {
            "one" => {
                let itemid: u64 = params["itemid"].parse().unwrap();
                self.records.iter().filter(|r| r.itemid == itemid).collect()
            }
            "syncitems" => {
                let lastsync = params.get("lastsync").cloned().unwrap_or_default();
                self.records
                    .iter()
                    .filter(|r| r.sync_time > lastsync)
                    .collect()
            }
            other => panic!("unsupported selecttype {}", other),
        };
        selected.sort_by(|a, b| a.sync_time.cmp(&b.sync_time));
        selected.truncate(self.event_page);

        let mut out = vec![pair("events_count", selected.len())];
        let mut props = Vec::new();
        for (i, record) in selected.iter().enumerate() {
            let n = i + 1;
            out.push(pair(format!("events_{n}_itemid"), record.itemid));
            out.push(pair(format!("events_{n}_anum"), record.anum));
            for (key, value) in &record.fields {
                out.push(pair(format!("events_{n}_{key}"), value));
            }
            for (name, value) in &record.props {
                props.push((record.itemid, name.clone(), value.clone()));
            }
        }

        out.push(pair("prop_count", props.len()));
        for (i, (itemid, name, value)) in props.into_iter().enumerate() {
            let n = i + 1;
            out.push(pair(format!("prop_{n}_itemid"), itemid));
            out.push(pair(format!("prop_{n}_name"), name));
            out.push(pair(format!("prop_{n}_value"), value));
        }
        out
    }

    fn postevent(&mut self, params: &BTreeMap<String, String>) -> Vec<(String, String)> {
        let itemid = self.records.iter().map(|r| r.itemid).max().unwrap_or(0) + 1;
        self.clock += 1;
        let sync_time = format!("2006-01-01 00:00:{:02}", self.clock);
        self.records
            .push(FakeRecord::from_params(itemid, 77, &sync_time, params));
        vec![pair("itemid", itemid), pair("anum", 77)]
    }

    fn export(&mut self, kind: &str, start: u64) -> String {
        self.export_requests.push((kind.to_string(), start));
        let page: Vec<(&u64, &FakeComment)> = self
            .comments
            .range(start..)
            .take(self.comment_page)
            .collect();

        let mut doc = String::from("<?xml version=\"1.0\" encoding='utf-8'?>\n<livejournal>\n");
        if kind == "comment_meta" {
            let max = self.comments.keys().next_back().copied().unwrap_or(0);
            doc.push_str(&format!("<maxid>{}</maxid>\n", max));
        }
        doc.push_str("<comments>\n");
        for (id, c) in &page {
            if kind == "comment_meta" {
                doc.push_str(&format!("<comment id='{}' posterid='{}'", id, c.poster));
                if let Some(state) = c.state {
                    doc.push_str(&format!(" state='{}'", state));
                }
                doc.push_str(" />\n");
            } else {
                doc.push_str(&format!(
                    "<comment id='{}' jitemid='{}' posterid='{}'",
                    id,
                    c.jitemid,
                    c.poster + self.body_poster_offset
                ));
                if let Some(parent) = c.parent {
                    doc.push_str(&format!(" parentid='{}'", parent));
                }
                doc.push_str(">\n");
                if let Some(subject) = &c.subject {
                    doc.push_str(&format!("<subject>{}</subject>\n", escape(subject)));
                }
                doc.push_str(&format!("<body>{}</body>\n", escape(&c.body)));
                doc.push_str(&format!("<date>{}</date>\n</comment>\n", c.date));
            }
        }
        doc.push_str("</comments>\n");
        if kind == "comment_meta" {
            doc.push_str("<usermaps>\n");
            for (_, c) in &page {
                doc.push_str(&format!(
                    "<usermap id='{}' user='{}' />\n",
                    c.poster, self.users[&c.poster]
                ));
            }
            doc.push_str("</usermaps>\n");
        }
        doc.push_str("</livejournal>\n");
        doc
    }
}

impl Transport for FakeJournal {
    fn post_form(&self, path: &str, body: &str) -> journal::Result<HttpResponse> {
        assert_eq!(path, "/interface/flat");
        let params = parse_form(body);
        let mode = params["mode"].clone();

        let mut reply = vec![pair("success", "OK")];
        if mode == "getchallenge" {
            reply.push(pair("challenge", CHALLENGE));
            return Ok(respond(reply));
        }

        let expected = challenge_response(CHALLENGE, SECRET);
        if params.get("auth_response") != Some(&expected) {
            return Ok(respond(vec![
                pair("success", "FAIL"),
                pair("errmsg", "Invalid password"),
            ]));
        }

        let mut state = self.state();
        let fields = match mode.as_str() {
            "login" => vec![pair("name", "Test User")],
            "syncitems" => state.syncitems(&params),
            "getevents" => state.getevents(&params),
            "postevent" => state.postevent(&params),
            "sessiongenerate" => {
                state.sessions += 1;
                vec![pair("ljsession", SESSION)]
            }
            "getfriends" => {
                let mut out = vec![
                    pair("friend_count", 2),
                    pair("friend_1_user", "frank"),
                    pair("friend_1_name", "Frank"),
                    pair("friend_1_fg", "#000000"),
                    pair("friend_1_bg", "#ffffff"),
                    pair("friend_1_groupmask", 1),
                    pair("friend_2_user", "lj_news"),
                    pair("friend_2_type", "news"),
                ];
                if params.contains_key("includefriendof") {
                    out.push(pair("friendof_count", 1));
                    out.push(pair("friendof_1_user", "fan"));
                }
                out
            }
            "checkfriends" => vec![
                pair("lastupdate", "2006-01-01 00:00:00"),
                pair("new", if params.contains_key("lastupdate") { 1 } else { 0 }),
                pair("interval", 120),
            ],
            other => vec![
                pair("success", "FAIL"),
                pair("errmsg", format!("Unknown method {}", other)),
            ],
        };
        reply.extend(fields);
        Ok(respond(reply))
    }

    fn get(&self, path: &str, headers: &[(&str, &str)]) -> journal::Result<HttpResponse> {
        let (route, query) = path.split_once('?').unwrap();
        assert_eq!(route, "/export_comments.bml");

        let cookie = format!("ljsession={}", SESSION);
        if !headers.contains(&("Cookie", cookie.as_str())) {
            return Ok(HttpResponse {
                status: 403,
                body: String::new(),
            });
        }

        let query = parse_form(query);
        let start: u64 = query["startid"].parse().unwrap();
        Ok(HttpResponse::ok(self.state().export(&query["get"], start)))
    }
}

fn pair(key: impl ToString, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn respond(pairs: Vec<(String, String)>) -> HttpResponse {
    // Later keys win, so a FAIL status overrides the leading OK
    HttpResponse::ok(ResponseEnvelope::from_pairs(pairs).encode())
}

fn parse_form(body: &str) -> BTreeMap<String, String> {
    body.split('&')
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.to_string(), urlencoding::decode(v).unwrap().into_owned()))
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn time(day: u32, hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2005, 12, day)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

/// Five entries, one non-entry sync item, six comments
fn seeded_journal() -> FakeJournal {
    let fake = FakeJournal::new();
    for itemid in 1..=5u64 {
        let text = format!("entry {} text\nwith a second line", itemid);
        let mut builder = Entry::builder(text, time(itemid as u32, 10, 0))
            .itemid(itemid, itemid as u32 * 10)
            .subject(format!("subject {}", itemid));
        if itemid == 2 {
            builder = builder.music("Low - Words").tags(["music", "bands"]);
        }
        if itemid == 3 {
            builder = builder.security(Security::Friends);
        }
        fake.add_entry(&builder.build(), &format!("2005-12-0{} 12:00:00", itemid));
    }
    fake.add_other("C-1", "2005-12-02 13:00:00");

    for id in 1..=6u64 {
        fake.add_comment(id, 100 + id % 2, (id + 1) / 2, &format!("comment <{}> & more", id));
    }
    fake
}

#[test]
fn test_full_sync_into_store() {
    let fake = seeded_journal();
    let client = fake.client();
    let store = InMemoryJournalStore::new();

    let mut reports = Vec::new();
    let stats =
        sync_journal(&client, &store, &SyncOptions::default(), |p| reports.push(p)).unwrap();

    assert_eq!(stats.entries_stored, 5);
    assert_eq!(stats.comments_meta, 6);
    assert_eq!(stats.comments_full, 6);
    assert_eq!(store.count_entries().unwrap(), 5);

    let second = store.get_entry(2).unwrap().unwrap();
    assert_eq!(second.event, "entry 2 text\nwith a second line");
    assert_eq!(second.subject.as_deref(), Some("subject 2"));
    assert_eq!(second.music.as_deref(), Some("Low - Words"));
    assert_eq!(second.taglist, vec!["bands", "music"]);
    assert_eq!(second.anum, 20);
    assert_eq!(store.get_entry(3).unwrap().unwrap().security, Security::Friends);

    let comment = store.get_comment(5).unwrap().unwrap();
    assert_eq!(comment.body.as_deref(), Some("comment <5> & more"));
    assert_eq!(comment.poster_id, Some(101));
    assert_eq!(comment.item_id, Some(3));
    assert_eq!(comment.state(), CommentState::Active);
    assert_eq!(store.get_username(101).unwrap().as_deref(), Some("user101"));
    assert_eq!(store.get_username(100).unwrap().as_deref(), Some("user100"));

    assert_eq!(
        store.get_meta(LASTSYNC_KEY).unwrap().as_deref(),
        Some("2005-12-05 12:00:00")
    );

    let entry_reports: Vec<(EntrySyncState, u64, u64)> = reports
        .iter()
        .filter_map(|p| match p {
            SyncProgress::Entries {
                state,
                fetched,
                total,
            } => Some((*state, *fetched, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(
        entry_reports,
        vec![
            (EntrySyncState::Listing, 2, 6),
            (EntrySyncState::Listing, 4, 6),
            (EntrySyncState::Listing, 6, 6),
            (EntrySyncState::Fetching, 2, 5),
            (EntrySyncState::Fetching, 4, 5),
            (EntrySyncState::Fetching, 5, 5),
        ]
    );

    // one session for both passes
    assert_eq!(fake.state().sessions, 1);
}

#[test]
fn test_non_entry_items_count_but_are_ignored() {
    let fake = FakeJournal::new();
    fake.add_other("C-1", "2005-12-01 00:00:00");
    fake.add_other("C-2", "2005-12-02 00:00:00");
    fake.add_entry(
        &Entry::builder("only", time(3, 0, 0)).itemid(9, 1).build(),
        "2005-12-03 00:00:00",
    );

    let client = fake.client();
    let mut cursor = EntrySyncCursor::new(&client, None);

    let first = cursor.advance().unwrap().unwrap();
    assert_eq!((first.fetched, first.total), (2, 3));
    assert_eq!(cursor.pending(), 0);

    cursor.advance().unwrap();
    assert_eq!(cursor.state(), EntrySyncState::Fetching);
    assert_eq!(cursor.pending(), 1);

    let page = cursor.advance().unwrap().unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].itemid, 9);
    assert!(cursor.advance().unwrap().is_none());
}

#[test]
fn test_idempotent_resume() {
    let fake = seeded_journal();
    let client = fake.client();

    let mut cursor = EntrySyncCursor::new(&client, None);
    let mut fetched = 0;
    while let Some(page) = cursor.advance().unwrap() {
        fetched += page.entries.len();
    }
    assert_eq!(fetched, 5);
    let token = cursor.resume_token().cloned();
    assert_eq!(token, Some(SyncToken::new("2005-12-05 12:00:00")));

    let mut again = EntrySyncCursor::new(&client, token.clone());
    let mut refetched = 0;
    while let Some(page) = again.advance().unwrap() {
        refetched += page.entries.len();
    }
    assert_eq!(refetched, 0);
    assert_eq!(again.resume_token().cloned(), token);
}

#[test]
fn test_second_sync_run_is_a_no_op() {
    let fake = seeded_journal();
    let client = fake.client();
    let store = InMemoryJournalStore::new();

    sync_journal(&client, &store, &SyncOptions::default(), |_| {}).unwrap();
    fake.state().export_requests.clear();

    let stats = sync_journal(&client, &store, &SyncOptions::default(), |_| {}).unwrap();
    assert_eq!(stats.entries_stored, 0);
    assert_eq!(stats.comments_meta, 0);
    assert_eq!(stats.comments_full, 0);

    // only the metadata request past the last stored id
    assert_eq!(
        fake.state().export_requests,
        vec![("comment_meta".to_string(), 7)]
    );
}

#[test]
fn test_new_entry_after_sync() {
    let fake = seeded_journal();
    let client = fake.client();
    let store = InMemoryJournalStore::new();
    let entries_only = SyncOptions {
        comments: false,
        ..Default::default()
    };

    sync_journal(&client, &store, &entries_only, |_| {}).unwrap();

    let mut entry = Entry::builder("posted later", time(20, 8, 30)).build();
    client.post_event(&mut entry).unwrap();
    assert_eq!(entry.itemid, 6);

    let stats = sync_journal(&client, &store, &entries_only, |_| {}).unwrap();
    assert_eq!(stats.entries_stored, 1);
    assert_eq!(store.get_entry(6).unwrap().unwrap().event, "posted later");
    assert_eq!(
        store.get_meta(LASTSYNC_KEY).unwrap().as_deref(),
        Some("2006-01-01 00:00:01")
    );
}

#[test]
fn test_entry_round_trip() {
    let fake = FakeJournal::new();
    let client = fake.client();

    let written = NaiveDate::from_ymd_opt(2005, 12, 4)
        .unwrap()
        .and_hms_opt(10, 24, 59)
        .unwrap();
    let mut entry = Entry::builder("Body with  spaces, 100% + symbols &c.\nand a newline", written)
        .subject("A subject")
        .mood(Some(12), Some("sleepy".to_string()))
        .music("Low - Words")
        .location("Home")
        .tags(["zeta", "alpha", "mid"])
        .pickeyword("default")
        .preformatted(true)
        .security(Security::Custom(6))
        .build();
    assert_eq!(entry.time, time(4, 10, 24));

    client.post_event(&mut entry).unwrap();
    assert_eq!((entry.itemid, entry.anum), (1, 77));

    let fetched = client.get_event(entry.itemid, true).unwrap().unwrap();
    assert_eq!(fetched, entry);
    assert_eq!(fetched.taglist, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_unknown_props_follow_strict_flag() {
    let fake = seeded_journal();
    fake.add_prop(4, "newfangled", "yes");
    fake.add_prop(4, "revnum", "3");
    let client = fake.client();

    let relaxed = client.get_event(4, false).unwrap().unwrap();
    assert_eq!(relaxed.props.get("newfangled").map(String::as_str), Some("yes"));
    assert_eq!(relaxed.props.get("revnum").map(String::as_str), Some("3"));

    let err = client.get_event(4, true).unwrap_err();
    assert!(matches!(err, JournalError::UnknownField { ref name, .. } if name == "newfangled"));

    let store = InMemoryJournalStore::new();
    let strict = SyncOptions {
        strict: true,
        comments: false,
        ..Default::default()
    };
    let err = sync_journal(&client, &store, &strict, |_| {}).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<JournalError>(),
        Some(JournalError::UnknownField { .. })
    ));
}

#[test]
fn test_comment_dedup_across_passes() {
    let fake = FakeJournal::new();
    fake.add_comment(420, 1129145, 7, "the body");
    let client = fake.client();

    let mut cursor = CommentSyncCursor::new(&client);
    let meta = cursor.advance().unwrap().unwrap();
    assert_eq!(meta.pass, CommentPass::Meta);
    assert_eq!(meta.comments[0].body, None);
    assert_eq!(meta.usermap[&1129145], "user1129145");

    let body = cursor.advance().unwrap().unwrap();
    assert_eq!(body.pass, CommentPass::Body);
    assert_eq!(body.comments.len(), 1);
    let merged = &body.comments[0];
    assert_eq!(merged.comment_id, 420);
    assert_eq!(merged.poster_id, Some(1129145));
    assert_eq!(merged.item_id, Some(7));
    assert_eq!(merged.body.as_deref(), Some("the body"));

    assert!(cursor.advance().unwrap().is_none());
    assert!(cursor.into_remaining().is_empty());
}

#[test]
fn test_comment_conflict_is_surfaced() {
    let fake = FakeJournal::new();
    fake.add_comment(420, 5, 7, "the body");
    fake.state().body_poster_offset = 1;
    let client = fake.client();

    let store = InMemoryJournalStore::new();
    let comments_only = SyncOptions {
        entries: false,
        ..Default::default()
    };
    let err = sync_journal(&client, &store, &comments_only, |_| {}).unwrap_err();
    match err.downcast_ref::<JournalError>() {
        Some(JournalError::Conflict { comment_id, field }) => {
            assert_eq!(*comment_id, 420);
            assert_eq!(*field, "posterid");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // the metadata page was stored before the conflict
    let stored = store.get_comment(420).unwrap().unwrap();
    assert_eq!(stored.poster_id, Some(5));
    assert_eq!(stored.body, None);
}

#[test]
fn test_comment_pagination_terminates() {
    let fake = FakeJournal::new();
    for id in 1..=999u64 {
        fake.add_comment(id, 1, 1, "x");
    }
    fake.state().comment_page = 100;
    let client = fake.client();

    let mut cursor = CommentSyncCursor::new(&client).with_decoder(Box::new(TreeDecoder));
    let mut pages = 0;
    while let Some(page) = cursor.advance().unwrap() {
        pages += 1;
        assert!(pages <= 20, "pagination did not terminate");
        assert_eq!(page.max_id, Some(999));
    }

    let requests = fake.state().export_requests.clone();
    assert_eq!(requests.len(), 20);
    for kind in ["comment_meta", "comment_body"] {
        let starts: Vec<u64> = requests
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(starts.len(), 10);
        assert_eq!(starts[0], 0);
        assert!(starts.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(*starts.last().unwrap(), 901);
    }

    let position = cursor.position();
    assert_eq!((position.meta_start, position.body_start), (1000, 1000));
}

#[test]
fn test_comment_states_and_threading() {
    let fake = FakeJournal::new();
    fake.add_comment(1, 10, 1, "parent");
    fake.add_comment(2, 11, 1, "reply");
    {
        let mut state = fake.state();
        let reply = state.comments.get_mut(&2).unwrap();
        reply.parent = Some(1);
        reply.state = Some("S");
        reply.subject = Some("re: parent".to_string());
    }
    let client = fake.client();
    let store = InMemoryJournalStore::new();
    let comments_only = SyncOptions {
        entries: false,
        ..Default::default()
    };
    sync_journal(&client, &store, &comments_only, |_| {}).unwrap();

    let reply = store.get_comment(2).unwrap().unwrap();
    assert_eq!(reply.parent_id, Some(1));
    assert_eq!(reply.state(), CommentState::Screened);
    assert_eq!(reply.subject.as_deref(), Some("re: parent"));
    assert_eq!(store.get_comment(1).unwrap().unwrap().parent_id, None);
}

#[test]
fn test_inconsistent_total_is_surfaced() {
    let fake = seeded_journal();
    fake.state().listing_drift = -1;
    let client = fake.client();
    let store = InMemoryJournalStore::new();

    let err = sync_journal(&client, &store, &SyncOptions::default(), |_| {}).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<JournalError>(),
        Some(JournalError::InconsistentListing(_))
    ));
    assert_eq!(store.get_meta(LASTSYNC_KEY).unwrap(), None);
    assert_eq!(store.count_entries().unwrap(), 0);
}

#[test]
fn test_wrong_password_is_protocol_error() {
    let fake = FakeJournal::new();
    let client = ProtocolClient::new(fake.clone(), Credential::new("ljrb_test", "wrong"));

    let err = client.login().unwrap_err();
    assert!(matches!(err, JournalError::Protocol { ref message } if message == "Invalid password"));
    assert!(!err.is_retryable());

    assert_eq!(fake.client().login().unwrap().as_deref(), Some("Test User"));
}

#[test]
fn test_friends() {
    let fake = FakeJournal::new();
    let client = fake.client();

    let lists = client.get_friends(true).unwrap();
    assert_eq!(lists.friends.len(), 2);
    assert_eq!(lists.friends[0].username, "frank");
    assert_eq!(lists.friends[0].groupmask, Some(1));
    assert_eq!(lists.friends[1].kind, FriendKind::News);
    assert_eq!(lists.friend_ofs[0].username, "fan");

    let first = client.check_friends(None).unwrap();
    assert!(!first.has_new);
    assert_eq!(first.interval_secs, 120);

    let next = client.check_friends(first.last_update.as_deref()).unwrap();
    assert!(next.has_new);
}
