//! SOCKS5 dialing, optionally with Tor stream isolation.

use rand::RngCore;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use super::check_network;
use crate::error::TransportError;
use crate::p2p::hostport::parse_host_port;

/// A SOCKS5 proxy endpoint and the credentials to present to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksProxy {
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Present fresh random credentials on every connection so Tor builds a
    /// separate circuit for each stream. Overrides username/password.
    pub tor_isolation: bool,
}

fn random_credential() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

impl SocksProxy {
    fn credentials(&self) -> Option<(String, String)> {
        if self.tor_isolation {
            Some((random_credential(), random_credential()))
        } else if !self.username.is_empty() || !self.password.is_empty() {
            Some((self.username.clone(), self.password.clone()))
        } else {
            None
        }
    }

    /// Connect to `addr` through the proxy within `timeout`.
    ///
    /// `tcp4`/`tcp6` are enforced for literal IP targets. Host names are
    /// resolved by the proxy, so their family cannot be checked here.
    pub async fn dial(
        &self,
        network: &str,
        addr: &str,
        timeout: Duration,
    ) -> Result<TcpStream, TransportError> {
        let family = check_network(network)?;
        let (host, port) = parse_host_port(addr).map_err(|reason| TransportError::InvalidAddress {
            addr: addr.to_string(),
            reason,
        })?;
        if let Ok(ip) = host.parse::<IpAddr>() {
            if !family.matches_ip(&ip) {
                return Err(TransportError::InvalidAddress {
                    addr: addr.to_string(),
                    reason: format!("not a {} address", network),
                });
            }
        }

        let proxy = self.addr.as_str();
        let target = (host.as_str(), port);
        let connect = async {
            match self.credentials() {
                Some((user, pass)) => {
                    Socks5Stream::connect_with_password(proxy, target, &user, &pass).await
                }
                None => Socks5Stream::connect(proxy, target).await,
            }
        };

        let stream = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout {
                addr: addr.to_string(),
                timeout_ms: timeout.as_millis(),
            })?
            .map_err(|source| TransportError::Socks {
                proxy: self.addr.clone(),
                source,
            })?;

        Ok(stream.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn proxy(addr: &str, isolation: bool) -> SocksProxy {
        SocksProxy {
            addr: addr.to_string(),
            username: "alice".to_string(),
            password: "pw".to_string(),
            tor_isolation: isolation,
        }
    }

    #[test]
    fn test_isolation_overrides_credentials() {
        let plain = proxy("127.0.0.1:9050", false);
        assert_eq!(
            plain.credentials(),
            Some(("alice".to_string(), "pw".to_string()))
        );

        let isolated = proxy("127.0.0.1:9050", true);
        let (u1, p1) = isolated.credentials().unwrap();
        let (u2, _) = isolated.credentials().unwrap();
        assert_ne!(u1, "alice");
        assert_ne!(p1, "pw");
        assert_ne!(u1, u2);
        assert_eq!(u1.len(), 32);
    }

    #[test]
    fn test_no_credentials_when_unset() {
        let anon = SocksProxy {
            addr: "127.0.0.1:9050".to_string(),
            username: String::new(),
            password: String::new(),
            tor_isolation: false,
        };
        assert!(anon.credentials().is_none());
    }

    #[tokio::test]
    async fn test_rejects_bad_target() {
        let p = proxy("127.0.0.1:9", false);
        let err = p
            .dial("tcp", "no-port", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));

        let err = p
            .dial("udp", "host:1", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedNetwork(_)));
    }

    #[tokio::test]
    async fn test_family_enforced_for_literal_targets() {
        // Nothing listens on the proxy address; the check happens first.
        let p = proxy("127.0.0.1:9", false);
        let err = p
            .dial("tcp6", "127.0.0.1:8333", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));

        let err = p
            .dial("tcp4", "[2001:db8::1]:8333", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_empty_proxy_fails_at_dial_time() {
        let p = SocksProxy {
            addr: String::new(),
            username: String::new(),
            password: String::new(),
            tor_isolation: false,
        };
        let err = p
            .dial("tcp", "example.onion:80", Duration::from_secs(2))
            .await;
        assert!(err.is_err());
    }

    /// Minimal SOCKS5 server: no-auth greeting, CONNECT reply with success,
    /// then echo the requested domain back to the client.
    async fn serve_one(listener: TcpListener) {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut greet = [0u8; 2];
        sock.read_exact(&mut greet).await.unwrap();
        let mut methods = vec![0u8; greet[1] as usize];
        sock.read_exact(&mut methods).await.unwrap();
        sock.write_all(&[0x05, 0x00]).await.unwrap();

        let mut head = [0u8; 4];
        sock.read_exact(&mut head).await.unwrap();
        assert_eq!(head[1], 0x01);
        assert_eq!(head[3], 0x03);
        let mut len = [0u8; 1];
        sock.read_exact(&mut len).await.unwrap();
        let mut domain = vec![0u8; len[0] as usize];
        sock.read_exact(&mut domain).await.unwrap();
        let mut port = [0u8; 2];
        sock.read_exact(&mut port).await.unwrap();

        sock.write_all(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0, 80])
            .await
            .unwrap();
        sock.write_all(&domain).await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_through_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(serve_one(listener));

        let p = SocksProxy {
            addr,
            username: String::new(),
            password: String::new(),
            tor_isolation: false,
        };
        let mut stream = p
            .dial("tcp", "exampleonion.onion:8333", Duration::from_secs(5))
            .await
            .unwrap();

        let mut echoed = vec![0u8; "exampleonion.onion".len()];
        stream.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"exampleonion.onion");
        server.await.unwrap();
    }
}
