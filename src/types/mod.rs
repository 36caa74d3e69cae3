//! This module contains the values produced by a session: raw command responses and the
//! records extracted from them.

mod response;
pub use self::response::{Completion, RawResponse, Status};

mod message;
pub use self::message::{BodyExcerpt, HeaderSet, MessageId, MessageRecord};
