//! Pulls message identifiers, header fields and body text out of accumulated server responses.
//!
//! Every function here is a pure function of its input. None of them fail: a response that
//! lacks the expected structure yields an empty result, since server payloads are free-form text
//! and partial or garbled data is normal.

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::types::{BodyExcerpt, HeaderSet, MessageId};

const SEARCH_MARKER: &str = "* SEARCH";

lazy_static! {
    static ref LITERAL: Regex = Regex::new(r"\{(\d+)\}\r?\n").unwrap();
}

/// Collect the identifiers from every `* SEARCH` line, in order of appearance.
///
/// ```
/// let ids = imap_skim::parse::extract_message_ids("* SEARCH 3 7 12\r\na5 OK done\r\n");
/// assert_eq!(ids, ["3", "7", "12"]);
/// ```
pub fn extract_message_ids(raw: &str) -> Vec<MessageId> {
    raw.lines()
        .filter_map(|line| line.split_once(SEARCH_MARKER).map(|(_, ids)| ids))
        .flat_map(str::split_whitespace)
        .map(MessageId::from)
        .collect()
}

/// Find the value of header `field_name`.
///
/// The first line containing `field_name:` supplies the value. If the line after it is folded
/// (starts with a space or tab), that line is appended too, joined by a single space. Only one
/// level of folding is handled and encoded words are left as they are.
pub fn extract_header_field(raw: &str, field_name: &str) -> Option<String> {
    let needle = format!("{}:", field_name);
    let mut lines = raw.lines().peekable();

    while let Some(line) = lines.next() {
        let Some((_, rest)) = line.split_once(needle.as_str()) else {
            continue;
        };

        let mut value = rest.trim().to_string();
        if let Some(next) = lines.peek() {
            let folded = next.trim();
            if next.starts_with(|c| c == ' ' || c == '\t') && !folded.is_empty() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(folded);
            }
        }
        return Some(value);
    }

    None
}

/// Extract each of `fields` that is present in `raw`.
pub fn extract_headers<S: AsRef<str>>(raw: &str, fields: &[S]) -> HeaderSet {
    let mut headers = HeaderSet::new();
    for field in fields {
        let field = field.as_ref();
        if let Some(value) = extract_header_field(raw, field) {
            headers.insert(field, value);
        }
    }
    headers
}

/// Extract body text from the response to the `FETCH` tagged `tag`.
///
/// The text starts on the line after the first `{`, and ends before the line holding the last
/// `<tag> OK`, or at the end of `raw` if there is none. The byte count declared inside the
/// braces is not consulted: the closing `)` of the fetch is kept, and if the completion line
/// is missing, a body that itself contains `<tag> OK` is cut short there. See
/// [`extract_literal_body`] for a variant that honours the declared length.
pub fn extract_body_excerpt(raw: &str, tag: &str) -> BodyExcerpt {
    let Some(open) = raw.find('{') else {
        return BodyExcerpt::default();
    };
    let Some(newline) = raw[open..].find('\n') else {
        return BodyExcerpt::default();
    };
    let start = open + newline + 1;

    let end_marker = format!("{} OK", tag);
    let text = match raw.rfind(end_marker.as_str()) {
        Some(end) if end >= start => match raw[..end].rfind('\n') {
            Some(last) if last >= start => &raw[start..last],
            _ => &raw[start..end],
        },
        _ => &raw[start..],
    };

    BodyExcerpt::new(text.trim())
}

/// The data of the first `{n}` literal in `raw`, exactly `n` bytes long.
///
/// The count is in wire bytes, so this works on the response as received rather than on its
/// text. Returns `None` if there is no literal marker, or if fewer than `n` bytes follow it.
pub fn declared_literal(raw: &[u8]) -> Option<&[u8]> {
    let captures = LITERAL.captures(raw)?;
    let len: usize = std::str::from_utf8(&captures[1]).ok()?.parse().ok()?;
    let start = captures.get(0)?.end();
    raw.get(start..start.checked_add(len)?)
}

/// Like [`extract_body_excerpt`], but reads exactly the declared literal length when the whole
/// literal was received, falling back to the tag-based heuristic otherwise.
///
/// Invalid UTF-8 in the body becomes U+FFFD after the literal has been cut out.
pub fn extract_literal_body(raw: &[u8], tag: &str) -> BodyExcerpt {
    match declared_literal(raw) {
        Some(literal) => BodyExcerpt::new(String::from_utf8_lossy(literal).trim()),
        None => extract_body_excerpt(&String::from_utf8_lossy(raw), tag),
    }
}
