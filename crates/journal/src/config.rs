//! Configuration loading for journal sync
//!
//! Supports loading settings from (in order of priority):
//! 1. JSON file in the config directory (~/.config/ljsync/ljsync.json)
//! 2. Environment variables (fallback)
//!
//! The account password is never part of the config; see
//! [`Credential::from_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::protocol::{Credential, ProtocolClient, UreqTransport};

/// Settings filename in the ljsync config directory
const CONFIG_FILE: &str = "ljsync.json";

const DEFAULT_SERVER: &str = "https://www.livejournal.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one journal account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_server")]
    pub server_url: String,
    pub username: String,
    /// Community journal to act on instead of the user's own
    #[serde(default)]
    pub usejournal: Option<String>,
    /// Reject entry properties this crate does not know
    #[serde(default)]
    pub strict_props: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl JournalConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            server_url: default_server(),
            username: username.into(),
            usejournal: None,
            strict_props: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load settings using the following priority:
    /// 1. JSON file (~/.config/ljsync/ljsync.json)
    /// 2. Environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            let loaded: Self = config::load_json(CONFIG_FILE)?;
            return loaded.validate();
        }
        Self::from_env()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let loaded: Self = config::load_json_file(path)?;
        loaded.validate()
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(json).context("Failed to parse journal config")?;
        parsed.validate()
    }

    /// Load settings from environment variables
    ///
    /// `LJ_USERNAME` is required; `LJ_SERVER`, `LJ_USEJOURNAL`, `LJ_STRICT`
    /// and `LJ_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let username = var("LJ_USERNAME").context("LJ_USERNAME environment variable not set")?;

        let mut loaded = Self::new(username);
        if let Some(server) = var("LJ_SERVER") {
            loaded.server_url = server;
        }
        loaded.usejournal = var("LJ_USEJOURNAL").filter(|j| !j.is_empty());
        if let Some(strict) = var("LJ_STRICT") {
            loaded.strict_props = matches!(strict.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(timeout) = var("LJ_TIMEOUT_SECS") {
            loaded.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid LJ_TIMEOUT_SECS: {}", timeout))?;
        }
        loaded.validate()
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Get the default settings file path (~/.config/ljsync/ljsync.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    fn validate(self) -> Result<Self> {
        if self.username.trim().is_empty() {
            anyhow::bail!("Journal config has an empty username");
        }
        self.server()?;
        Ok(self)
    }

    /// Parsed server base URL
    pub fn server(&self) -> Result<Url> {
        Url::parse(&self.server_url)
            .with_context(|| format!("Invalid server URL: {}", self.server_url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// HTTP transport for the configured server
    pub fn transport(&self) -> Result<UreqTransport> {
        Ok(UreqTransport::new(self.server()?, self.timeout()))
    }

    /// Credential for the configured account and journal
    pub fn credential(&self, secret: impl Into<String>) -> Credential {
        let credential = Credential::new(self.username.clone(), secret);
        match &self.usejournal {
            Some(journal) => credential.acting_as(journal.clone()),
            None => credential,
        }
    }

    /// Ready-to-use protocol client, reading the password from `LJ_PASSWORD`
    pub fn client_from_env(&self) -> Result<ProtocolClient> {
        let mut credential = Credential::from_env(self.username.clone())?;
        if let Some(journal) = &self.usejournal {
            credential = credential.acting_as(journal.clone());
        }
        Ok(ProtocolClient::new(self.transport()?, credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_with_defaults() {
        let parsed = JournalConfig::from_json(r#"{ "username": "ljrb_test" }"#).unwrap();
        assert_eq!(parsed.username, "ljrb_test");
        assert_eq!(parsed.server_url, "https://www.livejournal.com");
        assert_eq!(parsed.timeout(), Duration::from_secs(30));
        assert!(!parsed.strict_props);
        assert_eq!(parsed.usejournal, None);
    }

    #[test]
    fn test_invalid_server_url() {
        let json = r#"{ "username": "a", "server_url": "not a url" }"#;
        assert!(JournalConfig::from_json(json).is_err());
    }

    #[test]
    fn test_missing_username() {
        assert!(JournalConfig::from_json("{}").is_err());
        assert!(JournalConfig::from_json(r#"{ "username": " " }"#).is_err());
    }

    #[test]
    fn test_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LJ_USERNAME", "ljrb_test"),
            ("LJ_SERVER", "http://localhost:8080"),
            ("LJ_USEJOURNAL", "community"),
            ("LJ_STRICT", "yes"),
            ("LJ_TIMEOUT_SECS", "5"),
        ]);
        let loaded = JournalConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(loaded.server().unwrap().as_str(), "http://localhost:8080/");
        assert_eq!(loaded.usejournal.as_deref(), Some("community"));
        assert!(loaded.strict_props);
        assert_eq!(loaded.timeout_secs, 5);

        let credential = loaded.credential("secret");
        assert_eq!(credential.username(), "ljrb_test");
        assert_eq!(credential.journal(), "community");
    }

    #[test]
    fn test_from_vars_requires_username() {
        assert!(JournalConfig::from_vars(|_| None).is_err());
        let bad_timeout = JournalConfig::from_vars(|k| match k {
            "LJ_USERNAME" => Some("a".to_string()),
            "LJ_TIMEOUT_SECS" => Some("soon".to_string()),
            _ => None,
        });
        assert!(bad_timeout.is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ljsync.json");

        let mut original = JournalConfig::new("ljrb_test");
        original.usejournal = Some("community".to_string());
        config::save_json_file(&path, &original).unwrap();

        let loaded = JournalConfig::from_file(&path).unwrap();
        assert_eq!(loaded, original);
        assert!(loaded.transport().is_ok());
    }
}
