//! Error types shared by the protocol client, decoders and sync cursors

/// Result alias used throughout the sync engine
pub type Result<T> = std::result::Result<T, JournalError>;

/// Failures surfaced by the sync engine
///
/// None of these are retried internally. Only the caller knows whether
/// resuming from its last persisted token is safe.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// The server could not be reached, or answered with a non-success HTTP status
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered but reported a failure
    #[error("server error: {message}")]
    Protocol { message: String },

    /// A response could not be decoded (wire format or XML)
    #[error("decode error: {0}")]
    Decode(String),

    /// Two fragments for the same comment disagree on a shared field
    #[error("conflicting values for field '{field}' of comment {comment_id}")]
    Conflict { comment_id: u64, field: &'static str },

    /// An entry property that is not recognized (strict mode only)
    #[error("unknown property '{name}' (value {value:?})")]
    UnknownField { name: String, value: String },

    /// The caller asked for something unsafe or malformed
    #[error("{0}")]
    User(String),

    /// The server-reported listing total changed in a way the delivered items cannot explain
    #[error("inconsistent sync listing: {0}")]
    InconsistentListing(String),
}

impl JournalError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether the caller may simply repeat the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<ureq::Error> for JournalError {
    fn from(err: ureq::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
