//! Flat protocol framing
//!
//! Requests are `key=value` pairs, percent-encoded and joined with `&`.
//! Responses are alternating key and value lines. Every value is a string;
//! numbers and booleans (`"1"`) are conventions on top.

use std::collections::HashMap;

use crate::error::{JournalError, Result};

/// Keys the client sets itself; callers may not pass them as parameters
pub const RESERVED_KEYS: &[&str] = &[
    "mode",
    "ver",
    "clientversion",
    "user",
    "auth_method",
    "auth_challenge",
    "auth_response",
    "usejournal",
];

/// Ordered key/value parameters of one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEnvelope {
    params: Vec<(String, String)>,
}

impl RequestEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value for the same key in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append all parameters of `other`, in order
    pub fn extend(&mut self, other: RequestEnvelope) {
        for (key, value) in other.params {
            self.insert(key, value);
        }
    }

    /// First parameter whose key is reserved, if any
    pub fn reserved_key(&self) -> Option<&str> {
        self.params
            .iter()
            .map(|(k, _)| k.as_str())
            .find(|k| RESERVED_KEYS.contains(k))
    }

    /// Serialize as an `application/x-www-form-urlencoded` body
    pub fn encode(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Decoded fields of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    fields: HashMap<String, String>,
}

impl ResponseEnvelope {
    /// Status key carried by every response
    pub const STATUS_KEY: &'static str = "success";
    /// Key holding the server's message when the status is not OK
    pub const ERROR_KEY: &'static str = "errmsg";

    /// Decode a response body of alternating key and value lines
    ///
    /// Lines may end in `\n` or `\r\n`. A later duplicate key overwrites an earlier one.
    pub fn decode(body: &str) -> Result<Self> {
        let lines: Vec<&str> = body.lines().collect();
        if lines.len() % 2 != 0 {
            return Err(JournalError::decode(format!(
                "response has an odd number of lines ({})",
                lines.len()
            )));
        }

        let fields = lines
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        Ok(Self { fields })
    }

    /// Build an envelope from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Encode back into the line format (order is unspecified)
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push('\n');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Get a field that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| JournalError::decode(format!("response is missing '{}'", key)))
    }

    /// Get an optional numeric field
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key).map(|v| parse_number(key, v)).transpose()
    }

    /// Get an optional numeric field that must fit in 32 bits
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        self.get_u64(key)?.map(|v| narrow(key, v)).transpose()
    }

    /// Get a boolean flag; only `"1"` is true
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }

    pub fn is_ok(&self) -> bool {
        self.get(Self::STATUS_KEY) == Some("OK")
    }

    /// The server's error text, if it sent one
    pub fn error_message(&self) -> Option<&str> {
        self.get(Self::ERROR_KEY)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of records in the array named `base` (`base_count`, 0 if absent)
    pub fn array_len(&self, base: &str) -> Result<usize> {
        let key = format!("{}_count", base);
        Ok(self.get_u64(&key)?.unwrap_or(0) as usize)
    }

    /// Lazily iterate the records of the array named `base`
    ///
    /// Records are stored as `base_N_field` keys, numbered from 1.
    pub fn array<'a>(&'a self, base: &'a str) -> Result<impl Iterator<Item = ArrayItem<'a>> + 'a> {
        let count = self.array_len(base)?;
        Ok((1..=count).map(move |index| ArrayItem {
            envelope: self,
            base,
            index,
        }))
    }
}

/// Accessor for the fields of one array record
#[derive(Debug, Clone, Copy)]
pub struct ArrayItem<'a> {
    envelope: &'a ResponseEnvelope,
    base: &'a str,
    index: usize,
}

impl<'a> ArrayItem<'a> {
    /// 1-based position in the array
    pub fn index(&self) -> usize {
        self.index
    }

    fn key(&self, field: &str) -> String {
        format!("{}_{}_{}", self.base, self.index, field)
    }

    pub fn get(&self, field: &str) -> Option<&'a str> {
        self.envelope.get(&self.key(field))
    }

    pub fn require(&self, field: &str) -> Result<&'a str> {
        let key = self.key(field);
        self.envelope
            .get(&key)
            .ok_or_else(|| JournalError::decode(format!("response is missing '{}'", key)))
    }

    pub fn get_u64(&self, field: &str) -> Result<Option<u64>> {
        let key = self.key(field);
        self.envelope
            .get(&key)
            .map(|v| parse_number(&key, v))
            .transpose()
    }

    pub fn get_u32(&self, field: &str) -> Result<Option<u32>> {
        let key = self.key(field);
        self.get_u64(field)?.map(|v| narrow(&key, v)).transpose()
    }

    pub fn require_u64(&self, field: &str) -> Result<u64> {
        let key = self.key(field);
        parse_number(&key, self.require(field)?)
    }
}

fn narrow(key: &str, value: u64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| JournalError::decode(format!("'{}' is out of range: {}", key, value)))
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| JournalError::decode(format!("'{}' is not a number: {:?}", key, value)))
}
