use crate::errors::ErrorKind;
use std::{fmt, net::SocketAddr, str::FromStr};

/// Address and port of one side of a connection.
///
/// Built from the `address:port` form the transport reports for a peer.
/// The address is kept verbatim, so an IPv6 peer keeps its brackets
/// (`[::1]:8080` gives address `[::1]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: String,
    port: u16,
}

impl Endpoint {
    /// Splits `ip_port` at its **last** colon.
    ///
    /// # Examples
    /// ```
    /// use handoff_web::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("fe80::1:443").unwrap();
    /// assert_eq!(endpoint.address(), "fe80::1");
    /// assert_eq!(endpoint.port(), 443);
    ///
    /// assert!(Endpoint::parse("localhost").is_err());
    /// ```
    pub fn parse(ip_port: &str) -> Result<Self, ErrorKind> {
        let malformed = || ErrorKind::MalformedEndpoint(ip_port.to_string());

        let colon = memchr::memrchr(b':', ip_port.as_bytes()).ok_or_else(malformed)?;
        let (address, port) = (&ip_port[..colon], &ip_port[colon + 1..]);

        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        Ok(Self {
            address: address.to_string(),
            port: port.parse().map_err(|_| malformed())?,
        })
    }

    #[inline]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[inline]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        let address = match addr {
            SocketAddr::V4(v4) => v4.ip().to_string(),
            SocketAddr::V6(v6) => format!("[{}]", v6.ip()),
        };

        Self {
            address,
            port: addr.port(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
