use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

/// Port assigned to DNS-over-QUIC by RFC 9250.
pub const DEFAULT_DOQ_PORT: u16 = 853;

/// Represents an upstream server address that may or may not be resolved to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamAddr {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl UpstreamAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamAddr::Resolved(addr) => Some(*addr),
            UpstreamAddr::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            UpstreamAddr::Resolved(addr) => addr.port(),
            UpstreamAddr::Unresolved { port, .. } => *port,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UpstreamAddr::Unresolved { .. })
    }

    /// Returns (hostname, port) if this address is unresolved.
    pub fn unresolved_parts(&self) -> Option<(&str, u16)> {
        match self {
            UpstreamAddr::Unresolved { hostname, port } => Some((hostname, *port)),
            UpstreamAddr::Resolved(_) => None,
        }
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamAddr::Resolved(addr) => write!(f, "{}", addr),
            UpstreamAddr::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

/// A DoQ upstream as written in configuration: `quic://host[:port]` or
/// `doq://host[:port]`.
///
/// `hostname` is the TLS server name. For literal IPs it defaults to the IP
/// text and can be replaced with [`DoqEndpoint::with_tls_hostname`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DoqEndpoint {
    pub addr: UpstreamAddr,
    pub hostname: Arc<str>,
}

impl DoqEndpoint {
    pub fn new(addr: UpstreamAddr, hostname: impl Into<Arc<str>>) -> Self {
        Self {
            addr,
            hostname: hostname.into(),
        }
    }

    pub fn with_tls_hostname(mut self, hostname: impl Into<Arc<str>>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Creates a copy pointing at a concrete socket address, keeping the TLS name.
    pub fn with_resolved_addr(&self, resolved: SocketAddr) -> Self {
        Self {
            addr: UpstreamAddr::Resolved(resolved),
            hostname: self.hostname.clone(),
        }
    }
}

fn parse_host_port(s: &str) -> Option<(&str, Option<u16>)> {
    if let Some(inner) = s.strip_prefix('[') {
        let end = inner.find(']')?;
        let host = &inner[..end];
        let rest = &inner[end + 1..];
        if rest.is_empty() {
            return Some((host, None));
        }
        let port = rest.strip_prefix(':')?.parse::<u16>().ok()?;
        return Some((host, Some(port)));
    }
    // A bare IPv6 literal has more than one colon and no port.
    if s.matches(':').count() > 1 {
        return Some((s, None));
    }
    match s.rsplit_once(':') {
        Some((host, port_str)) => Some((host, Some(port_str.parse::<u16>().ok()?))),
        None => Some((s, None)),
    }
}

impl FromStr for DoqEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("quic://")
            .or_else(|| s.strip_prefix("doq://"))
            .ok_or_else(|| {
                format!(
                    "Invalid DoQ upstream '{}'. Expected 'quic://HOST[:PORT]' or 'doq://HOST[:PORT]'",
                    s
                )
            })?;
        let rest = rest.trim_end_matches('/');

        let (host, port) = parse_host_port(rest)
            .ok_or_else(|| format!("Invalid host or port in DoQ upstream '{}'", s))?;
        if host.is_empty() {
            return Err(format!("Missing host in DoQ upstream '{}'", s));
        }
        let port = port.unwrap_or(DEFAULT_DOQ_PORT);

        let addr = match host.parse::<IpAddr>() {
            Ok(ip) => UpstreamAddr::Resolved(SocketAddr::new(ip, port)),
            Err(_) => UpstreamAddr::Unresolved {
                hostname: host.into(),
                port,
            },
        };

        Ok(DoqEndpoint::new(addr, host))
    }
}

impl fmt::Display for DoqEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hostname.contains(':') {
            write!(f, "quic://[{}]:{}", self.hostname, self.addr.port())
        } else {
            write!(f, "quic://{}:{}", self.hostname, self.addr.port())
        }
    }
}
