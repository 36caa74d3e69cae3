use std::fmt;

/// The status word carried by a tagged completion line.
///
/// Matched case-sensitively against the protocol vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// `OK`: the command completed successfully.
    Ok,
    /// `NO`: the command was understood but failed.
    No,
    /// `BAD`: the command was not understood.
    Bad,
}

impl Status {
    /// The wire form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bad => "BAD",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the line stream for one command came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// The server sent the tagged completion line for the command.
    Tagged(Status),
    /// A short response containing an untagged `* OK` ended the read early.
    ///
    /// This is a heuristic and may cut off a longer response.
    Greeting,
    /// The stream reached end-of-input first.
    Closed,
}

/// The lines a server sent in answer to one command, in arrival order.
///
/// Each line keeps its original terminator. The tagged completion line is included when the
/// server sent one. The bytes are kept as received; the text view replaces invalid UTF-8 with
/// U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    tag: String,
    raw: Vec<u8>,
    data: String,
    completion: Completion,
}

impl RawResponse {
    pub(crate) fn new(
        tag: impl Into<String>,
        raw: impl Into<Vec<u8>>,
        completion: Completion,
    ) -> Self {
        let raw = raw.into();
        RawResponse {
            tag: tag.into(),
            data: String::from_utf8_lossy(&raw).into_owned(),
            raw,
            completion,
        }
    }

    /// Tag of the command this response answers, or `*` for the server greeting.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The accumulated text.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// The accumulated bytes, exactly as they arrived.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Iterate over the received lines, terminators included.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.data.split_inclusive('\n')
    }

    /// How the response ended.
    pub fn completion(&self) -> Completion {
        self.completion
    }

    /// The tagged status, if the server sent a completion line.
    pub fn status(&self) -> Option<Status> {
        match self.completion {
            Completion::Tagged(status) => Some(status),
            _ => None,
        }
    }

    /// Whether the server completed the command with `OK`.
    pub fn is_ok(&self) -> bool {
        self.status() == Some(Status::Ok)
    }

    /// Whether the response ended on a protocol signal rather than on end-of-stream.
    pub fn is_complete(&self) -> bool {
        self.completion != Completion::Closed
    }

    /// Number of bytes received.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether no data was received at all.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Consume the response, returning the accumulated text.
    pub fn into_string(self) -> String {
        self.data
    }
}

impl AsRef<str> for RawResponse {
    fn as_ref(&self) -> &str {
        &self.data
    }
}

impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}
