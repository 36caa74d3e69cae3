//! Decides, one line at a time, whether the server has finished answering a command.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::space1,
    combinator::{eof, value},
    sequence::{delimited, pair},
    IResult,
};

use crate::types::{Completion, Status};

/// Untagged greeting marker the early-exit heuristic looks for.
const GREETING_MARKER: &str = "* OK";

/// Outcome of classifying one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// More lines belong to the current response.
    Continue,
    /// The response is over.
    Done(Completion),
}

/// Classifies server lines for the command currently outstanding.
///
/// The authoritative completion signal is a line whose first token is the command's tag,
/// followed by `OK`, `NO` or `BAD`. A status word appearing anywhere else on a line, such as in a
/// header value, does not end the response.
///
/// Unless built with [`Classifier::strict`], the classifier also applies a greeting heuristic:
/// a line containing `* OK` ends the response while the accumulated size is below a threshold.
/// This keeps a session from hanging on servers that answer some informational commands with
/// only a greeting-style line, but it truncates any longer response that happens to start with
/// that marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    greeting_threshold: Option<usize>,
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(Some(Self::DEFAULT_GREETING_THRESHOLD))
    }
}

impl Classifier {
    /// Accumulated size below which the greeting heuristic applies.
    pub const DEFAULT_GREETING_THRESHOLD: usize = 200;

    /// A classifier with the given greeting threshold, or none to disable the heuristic.
    pub fn new(greeting_threshold: Option<usize>) -> Self {
        Classifier { greeting_threshold }
    }

    /// A classifier that only accepts the tagged completion line.
    pub fn strict() -> Self {
        Classifier::new(None)
    }

    /// The greeting threshold in effect, if the heuristic is enabled.
    pub fn greeting_threshold(&self) -> Option<usize> {
        self.greeting_threshold
    }

    /// Classify `line`, the latest line received for the command tagged `command_tag`.
    ///
    /// `accumulated` is the number of bytes received for the command so far, `line` included.
    pub fn classify(&self, line: &str, command_tag: &str, accumulated: usize) -> Verdict {
        if let Some(status) = tagged_status(line.trim(), command_tag) {
            return Verdict::Done(Completion::Tagged(status));
        }

        if self.is_short_greeting(line, accumulated) {
            return Verdict::Done(Completion::Greeting);
        }

        Verdict::Continue
    }

    fn is_short_greeting(&self, line: &str, accumulated: usize) -> bool {
        match self.greeting_threshold {
            Some(threshold) => accumulated < threshold && line.contains(GREETING_MARKER),
            None => false,
        }
    }
}

fn status_word(input: &str) -> IResult<&str, Status> {
    alt((
        value(Status::Ok, tag("OK")),
        value(Status::No, tag("NO")),
        value(Status::Bad, tag("BAD")),
    ))(input)
}

/// Parses `<tag> SP (OK|NO|BAD) [SP ...]` and returns the status word.
pub(crate) fn tagged_status(line: &str, command_tag: &str) -> Option<Status> {
    let parsed: IResult<&str, Status> =
        delimited(pair(tag(command_tag), space1), status_word, alt((space1, eof)))(line);
    parsed.ok().map(|(_, status)| status)
}
