use crate::client::{Session, SessionConfig};
use crate::conn::Transport;
use crate::error::{Error, Result};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};
#[cfg(feature = "rustls-tls")]
use rustls_connector::{RustlsConnector, TlsStream as RustlsStream};

/// The port IMAP servers listen on for implicit TLS.
pub const IMAPS_PORT: u16 = 993;

/// A convenience builder for [`Session`]s over encrypted transports.
///
/// Every `Session`-yielding function connects, performs the TLS handshake and reads the server
/// greeting, so the returned session is ready for its first command.
///
/// Creating a [`Session`] using `native-tls` transport is straightforward:
/// ```no_run
/// # use imap_skim::ClientBuilder;
/// # fn main() -> Result<(), imap_skim::Error> {
/// let session = ClientBuilder::new("imap.example.com", 993).native_tls()?;
/// # Ok(())
/// # }
/// ```
///
/// Similarly, if using the `rustls-tls` feature you can create a [`Session`] using rustls:
/// ```no_run
/// # use imap_skim::ClientBuilder;
/// # fn main() -> Result<(), imap_skim::Error> {
/// let session = ClientBuilder::new("imap.example.com", 993).rustls()?;
/// # Ok(())
/// # }
/// ```
///
/// Timeouts apply to establishing the connection and, through [`SessionConfig`], to every
/// command afterwards:
/// ```no_run
/// # use imap_skim::{ClientBuilder, SessionConfig};
/// # use std::time::Duration;
/// # fn main() -> Result<(), imap_skim::Error> {
/// let session = ClientBuilder::new("imap.example.com", 993)
///     .connect_timeout(Duration::from_secs(5))
///     .config(SessionConfig::strict().with_timeout(Some(Duration::from_secs(10))))
///     .native_tls()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    connect_timeout: Option<Duration>,
    config: SessionConfig,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            connect_timeout: None,
            config: SessionConfig::default(),
        }
    }

    /// Give up on each resolved address if it does not accept the connection within `timeout`.
    pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Use `config` for the session.
    pub fn config(&mut self, config: SessionConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Return a new [`Session`] using a `native-tls` transport.
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    pub fn native_tls(&mut self) -> Result<Session<TlsStream<TcpStream>>> {
        self.connect(|domain, tcp| {
            let ssl_conn = TlsConnector::builder().build()?;
            Ok(TlsConnector::connect(&ssl_conn, domain, tcp)?)
        })
    }

    /// Return a new [`Session`] using `rustls` transport.
    #[cfg(feature = "rustls-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rustls-tls")))]
    pub fn rustls(&mut self) -> Result<Session<RustlsStream<TcpStream>>> {
        self.connect(|domain, tcp| {
            let ssl_conn = RustlsConnector::new_with_native_certs()?;
            Ok(ssl_conn.connect(domain, tcp)?)
        })
    }

    /// Make a [`Session`] using a custom TLS initialization. This function is intended
    /// to be used if your TLS setup requires custom work such as adding private CAs
    /// or other specific TLS parameters.
    ///
    /// The `handshake` argument should accept two parameters:
    ///
    /// - domain: [`&str`]
    /// - tcp: [`TcpStream`]
    ///
    /// and yield a `Result<C>` where `C` is a [`Transport`]. It should only perform
    /// TLS initialization over the given `tcp` socket and return the encrypted stream
    /// object, such as a [`native_tls::TlsStream`] or a [`rustls_connector::TlsStream`].
    ///
    /// Returning the `tcp` socket unchanged gives a plaintext session, which is only suitable
    /// for local testing.
    ///
    /// ```no_run
    /// # use imap_skim::ClientBuilder;
    /// # use rustls_connector::RustlsConnector;
    /// # fn main() -> Result<(), imap_skim::Error> {
    /// let session = ClientBuilder::new("imap.example.com", 993)
    ///     .connect(|domain, tcp| {
    ///         let ssl_conn = RustlsConnector::new_with_native_certs()?;
    ///         Ok(ssl_conn.connect(domain, tcp)?)
    ///     })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect<F, C>(&mut self, handshake: F) -> Result<Session<C>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: Transport,
    {
        let tcp = self.tcp()?;
        let tls = handshake(self.domain.as_ref(), tcp)?;

        let mut session = Session::with_config(tls, self.config);
        session.read_greeting()?;
        Ok(session)
    }

    fn tcp(&self) -> Result<TcpStream> {
        let addr = (self.domain.as_ref(), self.port);
        let Some(timeout) = self.connect_timeout else {
            return Ok(TcpStream::connect(addr)?);
        };

        // TcpStream::connect_timeout takes a single address, so try each resolved one in turn
        let mut last_err = None;
        for addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(tcp) => {
                    debug!(%addr, "connected");
                    return Ok(tcp);
                }
                Err(e) => {
                    warn!(%addr, error = %e, "couldn't connect");
                    last_err = Some(e);
                }
            }
        }

        Err(Error::Transport(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {}", self.domain.as_ref()),
            )
        })))
    }
}
