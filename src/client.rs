use bufstream::BufStream;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::classify::{self, Classifier, Verdict};
use super::conn::Transport;
use super::error::{Error, Result, ValidateError};
use super::parse;
use super::types::*;

static TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const GREETING_TAG: &str = "*";
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace(r"\", r"\\").replace("\"", "\\\""))
    };
}

fn validate_str(value: &str) -> Result<&str> {
    match value.chars().find(|&c| c == '\n' || c == '\r') {
        Some(c) => Err(Error::Validate(ValidateError(c))),
        None => Ok(value),
    }
}

fn is_atom_char(c: char) -> bool {
    c.is_ascii_graphic() && !matches!(c, '(' | ')' | '{' | '%' | '*' | '"' | '\\' | ']')
}

/// Render `value` as an atom if it is one, and as a quoted string otherwise.
fn astring(value: &str) -> Result<String> {
    let value = validate_str(value)?;
    if !value.is_empty() && value.chars().all(is_atom_char) {
        Ok(value.to_string())
    } else {
        Ok(quote!(value))
    }
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    match value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace(r"\\", r"\"),
        None => value.to_string(),
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Settings that govern how a [`Session`] waits for and delimits responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Longest time to wait for a command to complete. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Size bound for the greeting heuristic, see [`Classifier`]. `None` disables it.
    pub greeting_threshold: Option<usize>,
    /// Whether end-of-stream after some data counts as completion rather than an error.
    pub tolerate_early_close: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout: Some(Self::DEFAULT_TIMEOUT),
            greeting_threshold: Some(Classifier::DEFAULT_GREETING_THRESHOLD),
            tolerate_early_close: true,
        }
    }
}

impl SessionConfig {
    /// Default bound on how long one command may take.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Protocol-conformant settings: only a tagged completion line ends a response.
    pub fn strict() -> Self {
        SessionConfig {
            greeting_threshold: None,
            tolerate_early_close: false,
            ..SessionConfig::default()
        }
    }

    /// Replace the command timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the greeting heuristic threshold.
    pub fn with_greeting_threshold(mut self, threshold: Option<usize>) -> Self {
        self.greeting_threshold = threshold;
        self
    }

    fn classifier(&self) -> Classifier {
        Classifier::new(self.greeting_threshold)
    }
}

/// A live conversation with an IMAP server.
///
/// The session owns its transport, the tag counter and the mailbox selection state. Commands
/// are strictly sequential: each call writes one tagged command and reads until its response
/// is complete, so there is never more than one command outstanding. A session shared between
/// threads must be wrapped in a lock for the same reason.
///
/// When the greeting heuristic ends a response early, the command's tagged completion is still
/// on its way. The session remembers such commands and absorbs their completion lines when they
/// show up in a later response, applying any mailbox selection they confirm. While one is
/// pending, only tagged completion lines end a response. Servers complete commands in order, so
/// once a later command is completed by its own tagged line, anything still pending is given up.
///
/// After a timeout, a transport failure or a premature end of stream the session can no longer
/// tell which command the next lines belong to, and every further command fails with
/// [`Error::ConnectionLost`].
pub struct Session<T: Transport> {
    pub(crate) stream: BufStream<T>,
    tag: u32,
    selected: Option<String>,
    config: SessionConfig,
    classifier: Classifier,
    unfinished: Vec<Unfinished>,
    broken: bool,
}

/// A command whose response was cut short by the greeting heuristic.
#[derive(Debug)]
struct Unfinished {
    tag: String,
    verb: String,
    args: String,
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tag", &self.tag)
            .field("selected", &self.selected)
            .field("config", &self.config)
            .field("unfinished", &self.unfinished)
            .field("broken", &self.broken)
            .finish()
    }
}

enum Line {
    Data(Vec<u8>),
    Eof,
}

impl<T: Transport> Session<T> {
    /// Wrap a connected, already secured stream with default settings.
    ///
    /// No data is exchanged; call [`Session::read_greeting`] next if the server has not been
    /// heard from yet.
    pub fn new(stream: T) -> Session<T> {
        Session::with_config(stream, SessionConfig::default())
    }

    /// Wrap a connected stream with the given settings.
    pub fn with_config(stream: T, config: SessionConfig) -> Session<T> {
        Session {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
            selected: None,
            classifier: config.classifier(),
            config,
            unfinished: Vec::new(),
            broken: false,
        }
    }

    /// The settings this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The mailbox selected by the last successful `SELECT` or `EXAMINE`.
    pub fn selected_mailbox(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Read the server greeting, the single untagged line sent on connect.
    pub fn read_greeting(&mut self) -> Result<RawResponse> {
        let deadline = self.deadline();
        let line = self.next_line(GREETING_TAG, deadline, &[]);
        match self.check(line)? {
            Line::Data(line) => {
                trace!("S: {}", String::from_utf8_lossy(&line).trim_end());
                Ok(RawResponse::new(GREETING_TAG, line, Completion::Greeting))
            }
            Line::Eof => self.check(Err(Error::Protocol {
                tag: GREETING_TAG.to_string(),
                partial: RawResponse::new(GREETING_TAG, Vec::new(), Completion::Closed),
            })),
        }
    }

    /// Send `<tag> <verb> <args>` and collect the server's response to it.
    ///
    /// A `NO` or `BAD` completion is not an error; inspect [`RawResponse::status`]. Errors are
    /// reserved for the transport failing, the stream closing before anything resolvable
    /// arrived, and the configured timeout passing. Once one of those has happened, the session
    /// refuses further commands with [`Error::ConnectionLost`].
    pub fn send_command(&mut self, verb: &str, args: &str) -> Result<RawResponse> {
        if self.broken {
            return Err(Error::ConnectionLost);
        }
        validate_str(verb)?;
        validate_str(args)?;

        let (tag, command) = self.create_command(verb, args);
        let written = self.write_line(command.as_bytes());
        self.check(written)?;
        if verb.eq_ignore_ascii_case("LOGIN") {
            let user = args.split_whitespace().next().unwrap_or_default();
            debug!("C: {} {} {} ***", tag, verb, user);
        } else {
            debug!("C: {}", command);
        }

        let response = self.read_response(&tag);
        let response = self.check(response)?;
        match response.completion() {
            Completion::Greeting => self.unfinished.push(Unfinished {
                tag,
                verb: verb.to_string(),
                args: args.to_string(),
            }),
            Completion::Tagged(status) => {
                for u in self.unfinished.drain(..) {
                    debug!(tag = %u.tag, "no completion arrived, giving up on it");
                }
                self.track_selection(verb, args, Some(status));
            }
            Completion::Closed => {}
        }
        Ok(response)
    }

    /// Mark the session unusable if `result` is an error it cannot recover from.
    fn check<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(ref e) = result {
            if e.is_session_fatal() {
                self.broken = true;
            }
        }
        result
    }

    /// Log in with a user name and password.
    pub fn login(&mut self, username: &str, password: &str) -> Result<RawResponse> {
        let args = format!("{} {}", astring(username)?, astring(password)?);
        self.send_command("LOGIN", &args)
    }

    /// List the mailboxes under `reference_name` that match `mailbox_pattern`.
    pub fn list(&mut self, reference_name: &str, mailbox_pattern: &str) -> Result<RawResponse> {
        let args = format!(
            "{} {}",
            quote!(validate_str(reference_name)?),
            quote!(validate_str(mailbox_pattern)?)
        );
        self.send_command("LIST", &args)
    }

    /// Select a mailbox. The selection changes only if the server answers `OK`.
    pub fn select(&mut self, mailbox_name: &str) -> Result<RawResponse> {
        let args = astring(mailbox_name)?;
        self.send_command("SELECT", &args)
    }

    /// Search the selected mailbox, returning the matching sequence numbers in server order.
    pub fn search(&mut self, criteria: &str) -> Result<Vec<MessageId>> {
        let response = self.send_command("SEARCH", criteria)?;
        Ok(parse::extract_message_ids(response.as_str()))
    }

    /// Fetch the named header fields of message `id` without setting its `\Seen` flag.
    pub fn fetch_headers<S: AsRef<str>>(
        &mut self,
        id: &MessageId,
        fields: &[S],
    ) -> Result<HeaderSet> {
        let response = self.run_fetch_headers(id, fields)?;
        Ok(parse::extract_headers(response.as_str(), fields))
    }

    pub(crate) fn run_fetch_headers<S: AsRef<str>>(
        &mut self,
        id: &MessageId,
        fields: &[S],
    ) -> Result<RawResponse> {
        let names = fields
            .iter()
            .map(|f| f.as_ref().to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");
        self.send_command(
            "FETCH",
            &format!("{} (FLAGS BODY.PEEK[HEADER.FIELDS ({})])", id, names),
        )
    }

    /// Fetch the `range` bytes of the body text of message `id`.
    pub fn fetch_body_excerpt(
        &mut self,
        id: &MessageId,
        range: Range<u32>,
    ) -> Result<BodyExcerpt> {
        let response = self.run_fetch_body(id, range)?;
        Ok(parse::extract_body_excerpt(response.as_str(), response.tag()))
    }

    pub(crate) fn run_fetch_body(
        &mut self,
        id: &MessageId,
        range: Range<u32>,
    ) -> Result<RawResponse> {
        let len = range.end.saturating_sub(range.start);
        self.send_command(
            "FETCH",
            &format!("{} BODY.PEEK[TEXT]<{}.{}>", id, range.start, len),
        )
    }

    /// Noop always succeeds, and it does nothing.
    pub fn noop(&mut self) -> Result<RawResponse> {
        self.send_command("NOOP", "")
    }

    /// Tell the server the conversation is over and wait for it to confirm.
    ///
    /// The session, and with it the transport, is dropped afterwards.
    pub fn logout(mut self) -> Result<RawResponse> {
        self.send_command("LOGOUT", "")
    }

    fn track_selection(&mut self, verb: &str, args: &str, status: Option<Status>) {
        if status != Some(Status::Ok) {
            return;
        }
        if verb.eq_ignore_ascii_case("SELECT") || verb.eq_ignore_ascii_case("EXAMINE") {
            self.selected = Some(unquote(args));
        } else if verb.eq_ignore_ascii_case("CLOSE") || verb.eq_ignore_ascii_case("UNSELECT") {
            self.selected = None;
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.timeout.map(|t| Instant::now() + t)
    }

    fn read_response(&mut self, tag: &str) -> Result<RawResponse> {
        let deadline = self.deadline();
        let mut data = Vec::new();

        loop {
            let bytes = match self.next_line(tag, deadline, &data)? {
                Line::Data(bytes) => bytes,
                Line::Eof => return self.closed_early(tag, data),
            };
            let line = String::from_utf8_lossy(&bytes);
            trace!("S: {}", line.trim_end());
            if self.absorb_late_completion(&line) {
                continue;
            }
            data.extend_from_slice(&bytes);

            let classifier = if self.unfinished.is_empty() {
                self.classifier
            } else {
                Classifier::strict()
            };
            if let Verdict::Done(completion) = classifier.classify(&line, tag, data.len()) {
                if completion == Completion::Greeting {
                    warn!(tag, "response ended on a short untagged OK, it may be truncated");
                }
                return Ok(RawResponse::new(tag, data, completion));
            }
        }
    }

    /// If `line` completes an earlier, unfinished command, settle that command and return true.
    fn absorb_late_completion(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        let late = self.unfinished.iter().enumerate().find_map(|(i, u)| {
            classify::tagged_status(trimmed, &u.tag).map(|status| (i, status))
        });
        match late {
            Some((i, status)) => {
                let u = self.unfinished.remove(i);
                debug!(tag = %u.tag, %status, "late completion");
                self.track_selection(&u.verb, &u.args, Some(status));
                true
            }
            None => false,
        }
    }

    fn closed_early(&self, tag: &str, data: Vec<u8>) -> Result<RawResponse> {
        let partial = RawResponse::new(tag, data, Completion::Closed);
        if partial.is_empty() || !self.config.tolerate_early_close {
            return Err(Error::Protocol {
                tag: tag.to_string(),
                partial,
            });
        }
        warn!(tag, bytes = partial.len(), "stream closed before the command completed");
        Ok(partial)
    }

    /// Read one line, waiting no later than `deadline`. `data` is what the caller has
    /// accumulated so far and is only used to report partial data on timeout.
    fn next_line(&mut self, tag: &str, deadline: Option<Instant>, data: &[u8]) -> Result<Line> {
        let mut buf = Vec::new();

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(tag, data, &buf));
            }
            self.stream.get_mut().set_read_timeout(Some(remaining))?;
        }

        match self.readline(&mut buf) {
            Ok(0) => Ok(Line::Eof),
            Ok(_) => Ok(Line::Data(buf)),
            Err(ref e) if is_timeout(e) => Err(self.timed_out(tag, data, &buf)),
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                if buf.is_empty() {
                    Ok(Line::Eof)
                } else {
                    Ok(Line::Data(buf))
                }
            }
            Err(e) => Err(Error::Transport(e)),
        }
    }

    fn timed_out(&self, tag: &str, data: &[u8], pending: &[u8]) -> Error {
        let mut partial = data.to_vec();
        partial.extend_from_slice(pending);
        Error::Timeout {
            tag: tag.to_string(),
            after: self.config.timeout.unwrap_or_default(),
            partial: RawResponse::new(tag, partial, Completion::Closed),
        }
    }

    fn readline(&mut self, into: &mut Vec<u8>) -> io::Result<usize> {
        self.stream.read_until(LF, into)
    }

    fn create_command(&mut self, verb: &str, args: &str) -> (String, String) {
        self.tag += 1;
        let tag = format!("{}{}", TAG_PREFIX, self.tag);
        let command = if args.is_empty() {
            format!("{} {}", tag, verb)
        } else {
            format!("{} {} {}", tag, verb, args)
        };
        (tag, command)
    }

    fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        Ok(())
    }
}
