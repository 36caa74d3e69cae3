use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::fmt;

/// A message sequence number as returned by `SEARCH`.
///
/// Sequence numbers are only meaningful within the session and mailbox selection they were
/// obtained in: the server may renumber messages when the mailbox changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an identifier token.
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    /// The identifier as sent by the server.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId::new(id)
    }
}

impl PartialEq<&str> for MessageId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Header values keyed by field name.
///
/// Fields that were not present in the response are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    fields: HashMap<String, String>,
}

impl HeaderSet {
    /// An empty set.
    pub fn new() -> Self {
        HeaderSet::default()
    }

    /// Record `value` for `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// The value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The `From` field.
    pub fn sender(&self) -> Option<&str> {
        self.get("From")
    }

    /// The `Subject` field.
    pub fn subject(&self) -> Option<&str> {
        self.get("Subject")
    }

    /// The `Date` field parsed as an RFC 2822 timestamp.
    ///
    /// Returns `None` if the field is absent or does not parse.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.get("Date")
            .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was found.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A slice of a message body as returned by a partial fetch.
///
/// The length is bounded by the requested range, not checked against the actual content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyExcerpt(String);

impl BodyExcerpt {
    /// Wrap excerpt text.
    pub fn new(text: impl Into<String>) -> Self {
        BodyExcerpt(text.into())
    }

    /// The excerpt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BodyExcerpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything extracted for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Sequence number the message was fetched by.
    pub id: MessageId,
    /// The requested header fields that were present.
    pub headers: HeaderSet,
    /// The fetched body slice.
    pub body: BodyExcerpt,
}

impl MessageRecord {
    /// Case-insensitive match of `keyword` against the subject, the sender and the body.
    pub fn matches(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        [self.headers.subject(), self.headers.sender(), Some(self.body.as_str())]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&keyword))
    }
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "message {}", self.id)?;
        for name in ["From", "Subject", "Date"] {
            if let Some(value) = self.headers.get(name) {
                writeln!(f, "{}: {}", name, value)?;
            }
        }
        write!(f, "{}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: &str, from: &str, body: &str) -> MessageRecord {
        let mut headers = HeaderSet::new();
        headers.insert("Subject", subject);
        headers.insert("From", from);
        MessageRecord {
            id: MessageId::new("7"),
            headers,
            body: BodyExcerpt::new(body),
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let r = record("Quarterly REPORT", "Ana <ana@example.com>", "see attached");
        assert!(r.matches("report"));
        assert!(r.matches("EXAMPLE.COM"));
        assert!(r.matches("Attached"));
        assert!(!r.matches("invoice"));
    }

    #[test]
    fn keyword_match_without_headers() {
        let r = MessageRecord {
            id: MessageId::new("1"),
            headers: HeaderSet::new(),
            body: BodyExcerpt::new("the ceti123 key"),
        };
        assert!(r.matches("CETI123"));
        assert!(!r.matches("subject"));
    }

    #[test]
    fn date_parses_rfc2822() {
        let mut headers = HeaderSet::new();
        headers.insert("Date", "Tue, 1 Jul 2003 10:52:37 +0200");
        let date = headers.date().unwrap();
        assert_eq!(date.timestamp(), 1057049557);

        headers.insert("Date", "yesterday");
        assert_eq!(headers.date(), None);
        assert_eq!(HeaderSet::new().date(), None);
    }

    #[test]
    fn display_lists_known_fields() {
        let r = record("Hi", "bob@example.com", "hello");
        assert_eq!(
            r.to_string(),
            "message 7\nFrom: bob@example.com\nSubject: Hi\nhello"
        );
    }
}
