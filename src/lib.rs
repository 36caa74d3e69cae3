//! A minimal IMAP client that skims a mailbox.
//!
//! This crate drives a single sequential IMAP conversation over any byte stream: it tags
//! commands, reads the server's lines until each command is complete, and pulls message
//! identifiers, header fields and body excerpts out of the text it received. It is deliberately
//! lenient: responses are treated as text rather than parsed against the full protocol grammar.
//!
//! The main type is [`Session`]. [`ClientBuilder`] connects one over TLS:
//!
//! ```no_run
//! # #[cfg(feature = "native-tls")]
//! # fn main() -> Result<(), imap_skim::Error> {
//! use imap_skim::{ClientBuilder, FetchConfig};
//!
//! let mut session = ClientBuilder::new("imap.example.com", 993).native_tls()?;
//! session.login("me@example.com", "password")?;
//!
//! let report = session.fetch_recent(&FetchConfig::default())?;
//! println!("{} found, {} parsed", report.found, report.parsed());
//! for record in &report.records {
//!     println!("{}", record);
//! }
//!
//! session.logout()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "native-tls"))]
//! # fn main() {}
//! ```
//!
//! Commands that are not covered by a dedicated method go through [`Session::send_command`],
//! which returns the accumulated [`RawResponse`]. The functions in [`parse`] extract data from
//! any such response:
//!
//! ```no_run
//! # fn run<T: imap_skim::Transport>(session: &mut imap_skim::Session<T>) -> imap_skim::Result<()> {
//! let response = session.send_command("SEARCH", "UNSEEN")?;
//! let ids = imap_skim::parse::extract_message_ids(response.as_str());
//! # Ok(())
//! # }
//! ```
//!
//! ## Response delimiting
//!
//! A response ends at the line carrying the command's tag and `OK`, `NO` or `BAD`. By default a
//! short response containing `* OK` also ends it early; see [`classify::Classifier`] and
//! [`SessionConfig::strict`] to turn that off. End-of-stream is reported through
//! [`Completion::Closed`] or [`Error::Protocol`], never silently.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: commands at `debug` (with `LOGIN` credentials redacted),
//! received lines at `trace`, and heuristic decisions at `warn`.
//!
//! ## Opting in to TLS backends
//!
//! `native-tls` is enabled by default. Enable the `rustls-tls` feature for
//! [`ClientBuilder::rustls`].

#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod client_builder;
mod conn;
mod fetch;

pub mod classify;
pub mod decode;
pub mod error;
pub mod parse;
pub mod types;

pub use crate::client::{Session, SessionConfig};
pub use crate::client_builder::{ClientBuilder, IMAPS_PORT};
pub use crate::conn::{Connection, SetReadTimeout, Transport};
pub use crate::error::{Error, Result};
pub use crate::fetch::{FetchConfig, Report};
pub use crate::types::*;

#[cfg(feature = "test_helpers")]
#[cfg_attr(docsrs, doc(cfg(feature = "test_helpers")))]
pub mod testing;

#[cfg(test)]
mod mock_stream;
