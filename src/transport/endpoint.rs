use std::fmt;

use crate::error::{Error, Result};

/// Broker address with the channel security decided at parse time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Endpoint {
    /// `http(s)://host:port` URI for the gRPC channel.
    pub fn grpc_uri(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        if self.host.contains(':') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a broker endpoint.
///
/// Supports formats:
/// - `host:port` (TLS according to `tls_override`)
/// - `[ipv6]:port`
/// - `http://`, `grpc://`, `mqtt://`, `tcp://` prefixes (plain unless overridden)
/// - `https://`, `grpcs://`, `mqtts://`, `ssl://` prefixes (always TLS)
pub fn parse_endpoint(addr: &str, tls_override: bool) -> Result<Endpoint> {
    let mut use_tls = tls_override;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme.to_lowercase().as_str() {
            "http" | "grpc" | "mqtt" | "tcp" => {}
            "https" | "grpcs" | "mqtts" | "ssl" => use_tls = true,
            other => {
                return Err(Error::Config(format!(
                    "unsupported endpoint scheme: {}",
                    other
                )))
            }
        }
        remainder = rest.trim_end_matches('/');
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(Error::Config(format!("missing host in endpoint {}", addr)));
    }
    Ok(Endpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    let invalid = |what: &str| Error::Config(format!("{} in endpoint {}", what, addr));

    // Handle IPv6 addresses in brackets: [::1]:8080
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 address"))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| invalid("missing port"))?;
        let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;
    Ok((host.to_string(), port))
}
