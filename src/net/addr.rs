//! Network addresses and error classification.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Address of a connection endpoint.
///
/// Covers both IP endpoints and unix-domain socket paths. Unnamed unix
/// sockets (for example an unbound `unixgram` sender) have no path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetAddr {
    /// An IP address and port.
    Inet(SocketAddr),

    /// A unix-domain socket, `None` if the socket is unnamed.
    Unix(Option<PathBuf>),
}

impl NetAddr {
    /// Returns the IP socket address, if this is an IP endpoint.
    #[must_use]
    pub fn as_inet(&self) -> Option<SocketAddr> {
        match self {
            Self::Inet(addr) => Some(*addr),
            Self::Unix(_) => None,
        }
    }

    /// Returns the socket path, if this is a named unix endpoint.
    #[must_use]
    pub fn as_unix_path(&self) -> Option<&Path> {
        match self {
            Self::Unix(Some(path)) => Some(path.as_path()),
            _ => None,
        }
    }

    /// Canonical string form used to key datagram peers.
    #[must_use]
    pub fn peer_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet(addr) => write!(f, "{addr}"),
            Self::Unix(Some(path)) => write!(f, "{}", path.display()),
            Self::Unix(None) => Ok(()),
        }
    }
}

impl From<SocketAddr> for NetAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::Inet(addr)
    }
}

#[cfg(unix)]
impl From<tokio::net::unix::SocketAddr> for NetAddr {
    fn from(addr: tokio::net::unix::SocketAddr) -> Self {
        Self::Unix(addr.as_pathname().map(Path::to_path_buf))
    }
}

/// Check if a transport error is transient and the operation can be retried.
///
/// Anything else (including [`closed_error`]) is terminal for the loop that
/// observed it.
#[must_use]
pub fn is_transient(error: &io::Error) -> bool {
    use io::ErrorKind;

    matches!(
        error.kind(),
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
    )
}

/// The error returned by operations on a listener or socket after `close()`.
#[must_use]
pub fn closed_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        "use of closed network connection",
    )
}

/// Returns `true` if the error was produced by [`closed_error`] or an
/// equivalent shutdown condition.
#[must_use]
pub fn is_closed(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_inet_display_is_peer_key() {
        let addr = NetAddr::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5353));
        assert_eq!(addr.to_string(), "127.0.0.1:5353");
        assert_eq!(addr.peer_key(), "127.0.0.1:5353");
        assert!(addr.as_unix_path().is_none());
    }

    #[test]
    fn test_unix_display() {
        let named = NetAddr::Unix(Some(PathBuf::from("/tmp/relay.sock")));
        assert_eq!(named.to_string(), "/tmp/relay.sock");
        assert_eq!(named.as_unix_path(), Some(Path::new("/tmp/relay.sock")));
        assert!(named.as_inet().is_none());

        let unnamed = NetAddr::Unix(None);
        assert_eq!(unnamed.to_string(), "");
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(is_transient(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
        assert!(!is_transient(&closed_error()));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_closed(&closed_error()));
    }
}
