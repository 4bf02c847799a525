//! Challenge-response authentication
//!
//! Every authenticated request carries a fresh one-time challenge obtained
//! from `getchallenge` and the response `md5_hex(challenge + md5_hex(secret))`.
//! The hash is fixed by the server; it is not a local choice.

use anyhow::Context;
use md5::{Digest, Md5};

use super::wire::RequestEnvelope;

/// Environment variable holding the account password
const PASSWORD_ENV: &str = "LJ_PASSWORD";

/// Account credentials for one session
#[derive(Clone)]
pub struct Credential {
    username: String,
    secret: String,
    usejournal: Option<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            usejournal: None,
        }
    }

    /// Act on another journal (e.g. a community) while logged in as this user
    pub fn acting_as(mut self, journal: impl Into<String>) -> Self {
        self.usejournal = Some(journal.into());
        self
    }

    /// Build credentials for `username`, taking the password from `LJ_PASSWORD`
    pub fn from_env(username: impl Into<String>) -> anyhow::Result<Self> {
        let secret = std::env::var(PASSWORD_ENV)
            .with_context(|| format!("{} environment variable not set", PASSWORD_ENV))?;
        Ok(Self::new(username, secret))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn usejournal(&self) -> Option<&str> {
        self.usejournal.as_deref()
    }

    /// The journal being synced: the acted-as journal, or the user's own
    pub fn journal(&self) -> &str {
        self.usejournal.as_deref().unwrap_or(&self.username)
    }

    /// Authentication fields answering `challenge`
    pub fn auth_fields(&self, challenge: &str) -> RequestEnvelope {
        let mut fields = RequestEnvelope::new()
            .with("user", &self.username)
            .with("auth_method", "challenge")
            .with("auth_challenge", challenge)
            .with("auth_response", challenge_response(challenge, &self.secret));
        if let Some(journal) = &self.usejournal {
            fields.insert("usejournal", journal);
        }
        fields
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("usejournal", &self.usejournal)
            .finish()
    }
}

/// Derive the response to a server challenge
pub fn challenge_response(challenge: &str, secret: &str) -> String {
    let secret_hash = md5_hex(secret);
    md5_hex(&format!("{}{}", challenge, secret_hash))
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
