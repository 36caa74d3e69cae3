//! The boundary between a [`Session`](crate::Session) and the byte stream it talks over.

use crate::error::{Error, Result};

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

#[cfg(feature = "native-tls")]
use native_tls::TlsStream;
#[cfg(feature = "rustls-tls")]
use rustls_connector::TlsStream as RustlsStream;

/// Must be implemented for a transport in order for a `Session` to bound how long it waits for
/// the server.
///
/// The session sets the remaining time before every line it reads, so an implementation must
/// make a blocked read return `TimedOut` or `WouldBlock` once the timeout passes.
pub trait SetReadTimeout {
    /// Set the timeout for subsequent reads to the given one.
    ///
    /// If `timeout` is `None`, the read timeout should be removed.
    ///
    /// See also `std::net::TcpStream::set_read_timeout`.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;
}

/// A duplex byte stream a session can run over.
pub trait Transport: Read + Write + SetReadTimeout {}

impl<T> Transport for T where T: Read + Write + SetReadTimeout {}

/// A boxed transport, for callers that pick the TLS backend at runtime.
pub type Connection = Box<dyn Transport + Send>;

impl SetReadTimeout for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_read_timeout(self, timeout).map_err(Error::Transport)
    }
}

#[cfg(feature = "native-tls")]
impl<T: SetReadTimeout + Read + Write> SetReadTimeout for TlsStream<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.get_mut().set_read_timeout(timeout)
    }
}

#[cfg(feature = "rustls-tls")]
impl<T: SetReadTimeout + Read + Write> SetReadTimeout for RustlsStream<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.get_mut().set_read_timeout(timeout)
    }
}

impl<T: SetReadTimeout + ?Sized> SetReadTimeout for Box<T> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }
}
