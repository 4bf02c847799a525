//! Poll interval bookkeeping for `checkfriends`
//!
//! The server tells the client how long to wait between checks. These
//! helpers only answer whether the wait is over; sleeping is up to the caller.

use chrono::{DateTime, Duration, Utc};

/// Whether `interval_secs` have passed since `last_poll`
///
/// Returns `true` if the client has never polled.
pub fn poll_interval_elapsed(last_poll: Option<DateTime<Utc>>, interval_secs: u64) -> bool {
    poll_interval_elapsed_at(last_poll, interval_secs, Utc::now())
}

/// Earliest time the next poll is allowed, `None` if polling is allowed now
pub fn next_poll_at(last_poll: Option<DateTime<Utc>>, interval_secs: u64) -> Option<DateTime<Utc>> {
    let last = last_poll?;
    let next = last + Duration::seconds(interval_secs as i64);
    (next > Utc::now()).then_some(next)
}

fn poll_interval_elapsed_at(
    last_poll: Option<DateTime<Utc>>,
    interval_secs: u64,
    now: DateTime<Utc>,
) -> bool {
    match last_poll {
        Some(last) => (now - last).num_seconds() >= interval_secs as i64,
        None => true,
    }
}
