//! Core shared types for loadcheck.
//!
//! This crate is intentionally small: the message model every validator reads, and the
//! content hash used to name recorded responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A unit of traffic exchanged with the system under test.
///
/// Validators only ever look at [`Message::payload_text`]; headers and properties are carried
/// along for senders and reporters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Message {
    #[inline]
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Self::default()
        }
    }

    /// A message without any payload (e.g. an empty reply).
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// The payload rendered as text. A missing payload renders as the empty string.
    #[inline]
    pub fn payload_text(&self) -> &str {
        self.payload.as_deref().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

impl From<&str> for Message {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

/// Name of a recorded response inside a dictionary directory.
///
/// The identifier is the 32-bit polynomial (`h = 31 * h + c`) string hash over UTF-16 code
/// units, rendered as a signed decimal. Dictionaries recorded by earlier harness versions use
/// the same naming, so they stay readable.
///
/// Distinct payloads can collide. Colliding responses share one file; the last recorded
/// content wins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(String);

impl ResponseId {
    pub fn for_payload(payload: &str) -> Self {
        Self(string_hash(payload).to_string())
    }

    /// Wrap an identifier read back from an index file.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier can be used as a plain file name inside the dictionary directory.
    ///
    /// Hand-edited index files may contain anything; never follow separators or `..` out of the
    /// directory.
    pub fn is_safe_file_name(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.contains(['/', '\\', '\0'])
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResponseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 32-bit wrapping polynomial hash over UTF-16 code units.
pub fn string_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Shorten `text` for log and error messages.
///
/// Payloads can be arbitrarily large; errors only need enough of them to tell requests apart.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_hash_matches_known_values() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("pong"), 3_446_776);
        assert_eq!(string_hash("ping"), 3_441_010);
        assert_eq!(string_hash("PONG"), 2_461_688);
    }

    #[test]
    fn string_hash_wraps_and_goes_negative() {
        // Long enough to overflow many times over.
        let text = "the quick brown fox jumps over the lazy dog";
        let expected = text
            .encode_utf16()
            .fold(0i64, |h, c| (h * 31 + i64::from(c)) as i32 as i64) as i32;
        assert_eq!(string_hash(text), expected);
        assert!(ResponseId::for_payload("polygenelubricants")
            .as_str()
            .starts_with('-'));
    }

    #[test]
    fn string_hash_uses_utf16_code_units() {
        // U+1F600 is a surrogate pair: 0xD83D 0xDE00.
        let expected = 0xD83Di32.wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(string_hash("\u{1F600}"), expected);
        assert_eq!(string_hash("é"), 0xE9);
    }

    #[test]
    fn response_id_file_name_safety() {
        assert!(ResponseId::for_payload("pong").is_safe_file_name());
        assert!(!ResponseId::from_raw("").is_safe_file_name());
        assert!(!ResponseId::from_raw("..").is_safe_file_name());
        assert!(!ResponseId::from_raw("../etc/passwd").is_safe_file_name());
    }

    #[test]
    fn missing_payload_renders_as_empty_text() {
        assert_eq!(Message::empty().payload_text(), "");
        assert_eq!(Message::new("ping").payload_text(), "ping");
    }

    #[test]
    fn message_serializes_without_empty_maps() {
        let msg = Message::new("ping").with_header("h", "v");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "payload": "ping", "headers": { "h": "v" } })
        );
    }

    #[test]
    fn excerpt_truncates_on_char_boundaries() {
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
        assert_eq!(excerpt("ééé", 2), "éé...");
    }
}
