//! Enable the test_helpers feature to expose helper methods to build
//! response and record values for testing your code that uses the imap_skim crate
//!
//! To use add a dev-dependency on imap_skim adding the feature "test_helpers"
//! e.g.
//!
//! ```toml
//! [dependencies]
//! imap-skim = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-skim = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
#[cfg(doc)]
use crate::types::*;

/// Methods to build a [`RawResponse`] object
pub mod responses {
    use crate::classify::{Classifier, Verdict};
    use crate::types::{Completion, RawResponse};

    /// Builds a [`RawResponse`] for the command tagged `tag` from `input`, the way a session
    /// with `classifier` would have delimited it.
    ///
    /// Lines after the one that ends the response are dropped. If no line ends it, the response
    /// is marked as [`Completion::Closed`].
    ///
    /// ```
    /// use imap_skim::{classify::Classifier, types::Status};
    ///
    /// let input = "* SEARCH 2 3\r\na4 OK SEARCH completed\r\n";
    /// let response = imap_skim::testing::responses::parse("a4", input, Classifier::strict());
    /// assert_eq!(response.status(), Some(Status::Ok));
    /// ```
    pub fn parse(tag: &str, input: &str, classifier: Classifier) -> RawResponse {
        let mut data = String::new();
        for line in input.split_inclusive('\n') {
            data.push_str(line);
            if let Verdict::Done(completion) = classifier.classify(line, tag, data.len()) {
                return RawResponse::new(tag, data, completion);
            }
        }
        RawResponse::new(tag, data, Completion::Closed)
    }
}

/// Methods to build a [`MessageRecord`] object
pub mod records {
    use crate::types::{BodyExcerpt, HeaderSet, MessageId, MessageRecord};

    /// Builds a [`MessageRecord`] from header name/value pairs and a body excerpt.
    ///
    /// ```
    /// let record = imap_skim::testing::records::build(
    ///     "7",
    ///     &[("From", "ana@example.com"), ("Subject", "Lunch")],
    ///     "Noon ok?",
    /// );
    /// assert!(record.matches("lunch"));
    /// ```
    pub fn build(id: &str, headers: &[(&str, &str)], body: &str) -> MessageRecord {
        let mut set = HeaderSet::new();
        for (name, value) in headers {
            set.insert(*name, *value);
        }
        MessageRecord {
            id: MessageId::from(id),
            headers: set,
            body: BodyExcerpt::new(body),
        }
    }
}
