//! Endpoint address grammar: `tcp://<host>:<port>` or `unix://<path>`.

use crate::error::SocketError;

/// A parsed endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    /// Recognized by the grammar; constructing a socket from it fails with
    /// [`SocketError::Unsupported`].
    Unix { path: String },
}

impl Endpoint {
    /// Parse an address string.
    ///
    /// The port is split at the last colon so IPv6 literals work; brackets
    /// around the host are stripped. Port 0 is rejected.
    pub fn parse(addr: &str) -> Result<Endpoint, SocketError> {
        if let Some(rest) = addr.strip_prefix("tcp://") {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| SocketError::InvalidAddress(addr.to_owned()))?;
            let host = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            if host.is_empty() {
                return Err(SocketError::InvalidAddress(addr.to_owned()));
            }
            let port: u16 = port
                .parse()
                .map_err(|_| SocketError::InvalidAddress(addr.to_owned()))?;
            if port == 0 {
                return Err(SocketError::InvalidAddress(addr.to_owned()));
            }
            Ok(Endpoint::Tcp {
                host: host.to_owned(),
                port,
            })
        } else if let Some(path) = addr.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(SocketError::InvalidAddress(addr.to_owned()));
            }
            Ok(Endpoint::Unix {
                path: path.to_owned(),
            })
        } else {
            Err(SocketError::InvalidAddress(addr.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_host_and_port() {
        let ep = Endpoint::parse("tcp://127.0.0.1:7458").unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "127.0.0.1".to_owned(),
                port: 7458
            }
        );
    }

    #[test]
    fn parses_hostname() {
        let ep = Endpoint::parse("tcp://localhost:80").unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "localhost".to_owned(),
                port: 80
            }
        );
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let ep = Endpoint::parse("tcp://[::1]:7458").unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "::1".to_owned(),
                port: 7458
            }
        );
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(
            Endpoint::parse("http://x"),
            Err(SocketError::InvalidAddress(_))
        ));
    }

    #[test]
    fn rejects_port_zero() {
        assert!(matches!(
            Endpoint::parse("tcp://host:0"),
            Err(SocketError::InvalidAddress(_))
        ));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(matches!(
            Endpoint::parse("tcp://host"),
            Err(SocketError::InvalidAddress(_))
        ));
    }

    #[test]
    fn rejects_garbage_port() {
        assert!(matches!(
            Endpoint::parse("tcp://host:port"),
            Err(SocketError::InvalidAddress(_))
        ));
        assert!(matches!(
            Endpoint::parse("tcp://host:70000"),
            Err(SocketError::InvalidAddress(_))
        ));
    }

    #[test]
    fn rejects_empty_host() {
        assert!(matches!(
            Endpoint::parse("tcp://:7458"),
            Err(SocketError::InvalidAddress(_))
        ));
    }

    #[test]
    fn recognizes_unix_paths() {
        let ep = Endpoint::parse("unix:///tmp/fsock.sock").unwrap();
        assert_eq!(
            ep,
            Endpoint::Unix {
                path: "/tmp/fsock.sock".to_owned()
            }
        );
        assert!(matches!(
            Endpoint::parse("unix://"),
            Err(SocketError::InvalidAddress(_))
        ));
    }
}
