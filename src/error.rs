//! IMAP error types.

use std::error::Error as StdError;
use std::io::Error as IoError;
#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
use std::net::TcpStream;
use std::result;
use std::time::Duration;

use thiserror::Error;

use crate::types::RawResponse;

/// A convenience wrapper around `Result` for `imap_skim::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur in the IMAP client
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to the transport.
    #[error("transport error: {0}")]
    Transport(#[from] IoError),
    /// The TLS layer failed while setting up or managing the transport.
    #[error("TLS error: {0}")]
    Tls(Box<dyn StdError + Send + Sync + 'static>),
    /// The server closed the stream before the completion of `tag` could be determined.
    ///
    /// `partial` holds every line received for the command so far.
    #[error("connection closed before `{tag}` completed")]
    Protocol {
        /// Tag of the outstanding command.
        tag: String,
        /// Lines accumulated before the stream closed.
        partial: RawResponse,
    },
    /// No completion for `tag` arrived within the configured bound.
    #[error("no completion for `{tag}` within {after:?}")]
    Timeout {
        /// Tag of the outstanding command.
        tag: String,
        /// The bound that was exceeded.
        after: Duration,
        /// Lines accumulated before the deadline passed.
        partial: RawResponse,
    },
    /// A command argument could not be placed on the wire.
    #[error(transparent)]
    Validate(#[from] ValidateError),
    /// An earlier failure left the session out of step with the server.
    #[error("session is unusable after an earlier failure")]
    ConnectionLost,
}

#[cfg(feature = "native-tls")]
impl From<native_tls::Error> for Error {
    fn from(err: native_tls::Error) -> Error {
        Error::Tls(Box::new(err))
    }
}

#[cfg(feature = "native-tls")]
impl From<native_tls::HandshakeError<TcpStream>> for Error {
    fn from(err: native_tls::HandshakeError<TcpStream>) -> Error {
        match err {
            native_tls::HandshakeError::Failure(e) => Error::Tls(Box::new(e)),
            native_tls::HandshakeError::WouldBlock(_) => {
                Error::Transport(IoError::new(
                    std::io::ErrorKind::WouldBlock,
                    "TLS handshake would block",
                ))
            }
        }
    }
}

#[cfg(feature = "rustls-tls")]
impl From<rustls_connector::HandshakeError<TcpStream>> for Error {
    fn from(err: rustls_connector::HandshakeError<TcpStream>) -> Error {
        match err {
            rustls_connector::HandshakeError::Failure(e) => Error::Tls(Box::new(e)),
            rustls_connector::HandshakeError::WouldBlock(_) => {
                Error::Transport(IoError::new(
                    std::io::ErrorKind::WouldBlock,
                    "TLS handshake would block",
                ))
            }
        }
    }
}

impl Error {
    /// Whether the session this error came from must be torn down.
    ///
    /// Only argument validation failures leave the session usable: nothing was written.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, Error::Validate(_))
    }

    /// Partial response data, if the error carries any.
    pub fn partial(&self) -> Option<&RawResponse> {
        match self {
            Error::Protocol { partial, .. } | Error::Timeout { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// An invalid character was found in a command argument.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid character in input: {0:?}")]
pub struct ValidateError(pub char);
