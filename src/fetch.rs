//! Skimming the newest messages of a mailbox.
//!
//! [`Session::fetch_recent`] selects a mailbox, searches it, and fetches a handful of header
//! fields plus the start of the body text for the last few matches. Messages whose fetches the
//! server refuses are skipped and reported, while session-level failures abort the run.

use std::ops::Range;
use tracing::{debug, info, warn};

use crate::client::Session;
use crate::conn::Transport;
use crate::decode;
use crate::error::Result;
use crate::parse;
use crate::types::{BodyExcerpt, MessageId, MessageRecord, Status};

const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

/// What [`Session::fetch_recent`] should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Mailbox to select.
    pub mailbox: String,
    /// `SEARCH` criteria, sent as they are.
    pub criteria: String,
    /// How many of the last matches to fetch.
    pub count: usize,
    /// Header fields to fetch for each message.
    pub header_fields: Vec<String>,
    /// Byte range of the body text to fetch.
    pub body_range: Range<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            mailbox: "INBOX".to_string(),
            criteria: "ALL".to_string(),
            count: 5,
            header_fields: ["From", "Subject", "Date", CONTENT_TRANSFER_ENCODING]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            body_range: 0..500,
        }
    }
}

impl FetchConfig {
    /// Replace the mailbox to select.
    pub fn with_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    /// Replace the `SEARCH` criteria.
    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = criteria.into();
        self
    }

    /// Replace how many of the last matches to fetch.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

/// Outcome of [`Session::fetch_recent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Number of messages the search matched.
    pub found: usize,
    /// Messages that were fetched, oldest first.
    pub records: Vec<MessageRecord>,
    /// Messages the server would not return, or that yielded nothing.
    pub skipped: Vec<MessageId>,
}

impl Report {
    /// Number of messages that were fetched and parsed.
    pub fn parsed(&self) -> usize {
        self.records.len()
    }
}

fn refused(status: Option<Status>) -> bool {
    matches!(status, Some(Status::No) | Some(Status::Bad))
}

impl<T: Transport> Session<T> {
    /// Fetch headers and a body excerpt for the newest `config.count` messages matching
    /// `config.criteria` in `config.mailbox`.
    ///
    /// If the mailbox cannot be selected, an empty report is returned. Bodies sent with a
    /// `base64` transfer encoding are decoded when the header was fetched.
    pub fn fetch_recent(&mut self, config: &FetchConfig) -> Result<Report> {
        let mut report = Report::default();

        let selected = self.select(&config.mailbox)?;
        if refused(selected.status()) {
            warn!(mailbox = %config.mailbox, "cannot select mailbox");
            return Ok(report);
        }

        let ids = self.search(&config.criteria)?;
        report.found = ids.len();
        let newest = &ids[ids.len().saturating_sub(config.count)..];
        debug!(found = ids.len(), fetching = newest.len(), "searched {}", config.mailbox);

        for id in newest {
            match self.fetch_record(id, config)? {
                Some(record) => report.records.push(record),
                None => report.skipped.push(id.clone()),
            }
        }

        info!(
            found = report.found,
            parsed = report.parsed(),
            "fetched recent messages"
        );
        Ok(report)
    }

    fn fetch_record(
        &mut self,
        id: &MessageId,
        config: &FetchConfig,
    ) -> Result<Option<MessageRecord>> {
        let response = self.run_fetch_headers(id, &config.header_fields)?;
        if refused(response.status()) {
            warn!(%id, status = ?response.status(), "header fetch refused");
            return Ok(None);
        }
        let headers = parse::extract_headers(response.as_str(), &config.header_fields);

        let response = self.run_fetch_body(id, config.body_range.clone())?;
        if refused(response.status()) {
            warn!(%id, status = ?response.status(), "body fetch refused");
            return Ok(None);
        }
        let mut body = parse::extract_literal_body(response.as_bytes(), response.tag());

        let base64 = headers
            .get(CONTENT_TRANSFER_ENCODING)
            .map_or(false, |cte| cte.eq_ignore_ascii_case("base64"));
        if base64 {
            match decode::base64_text(body.as_str()) {
                Some(text) => body = BodyExcerpt::new(text.trim()),
                None => debug!(%id, "body is not valid base64, keeping it as is"),
            }
        }

        if headers.is_empty() && body.is_empty() {
            warn!(%id, "nothing could be extracted");
            return Ok(None);
        }

        Ok(Some(MessageRecord {
            id: id.clone(),
            headers,
            body,
        }))
    }
}
