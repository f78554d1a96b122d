//! Target parsing.
//!
//! Splits `host:port` targets, applies the default port, and recognizes the
//! targets that need no query at all: IP literals and (optionally) `localhost`.

use super::addrlist::AddressList;
use crate::base::error::ResolveError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

/// Port used for a DNS server override given without one.
pub const DEFAULT_DNS_PORT: u16 = 53;

/// A parsed resolution target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    /// Parses `name`, falling back to `default_port` when it has no port.
    pub fn parse(name: &str, default_port: Option<&str>) -> Result<Self, ResolveError> {
        let (host, port) = split_host_port(name).ok_or_else(|| ResolveError::UnparseableTarget {
            target: name.to_string(),
        })?;
        let port = match port.or(default_port) {
            Some(port) => parse_port(port).ok_or_else(|| ResolveError::UnparseableTarget {
                target: name.to_string(),
            })?,
            None => {
                return Err(ResolveError::MissingPort {
                    target: name.to_string(),
                })
            }
        };
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the socket address if the host is an IPv4 or IPv6 literal.
    pub fn ip_literal(&self) -> Option<SocketAddr> {
        parse_ip_literal(&self.host, self.port)
    }

    /// Returns true if the host names the local machine.
    pub fn is_localhost(&self) -> bool {
        self.host.eq_ignore_ascii_case("localhost")
    }

    /// Name of the SRV record listing balancers for `service`.
    pub fn srv_name(&self, service: &str) -> String {
        format!("_{}._tcp.{}", service, self.host)
    }

    /// Name of the TXT record carrying the service config.
    pub fn txt_name(&self) -> String {
        format!("_grpc_config.{}", self.host)
    }
}

/// Splits `name` into host and optional port.
///
/// Bracketed hosts (`[::1]:80`) must contain a colon. A bare host with more
/// than one colon is taken as an IPv6 literal without port. Returns `None`
/// when no host can be extracted. An empty port counts as absent.
pub fn split_host_port(name: &str) -> Option<(&str, Option<&str>)> {
    let (host, port) = if let Some(rest) = name.strip_prefix('[') {
        let rbracket = rest.find(']')?;
        let host = &rest[..rbracket];
        let after = &rest[rbracket + 1..];
        let port = if after.is_empty() {
            None
        } else {
            Some(after.strip_prefix(':')?)
        };
        if !host.contains(':') {
            return None;
        }
        (host, port)
    } else {
        match name.find(':') {
            Some(colon) if name[colon + 1..].contains(':') => (name, None),
            Some(colon) => (&name[..colon], Some(&name[colon + 1..])),
            None => (name, None),
        }
    };
    if host.is_empty() {
        return None;
    }
    Some((host, port.filter(|p| !p.is_empty())))
}

fn parse_port(port: &str) -> Option<u16> {
    match port {
        "http" => Some(80),
        "https" => Some(443),
        _ => port.parse().ok(),
    }
}

/// Parses `host` as an IP literal, honoring an IPv6 zone given as an index
/// (`fe80::1%2`) or an interface name (`fe80::1%eth0`).
///
/// A zone naming no local interface makes `host` a non-literal.
pub fn parse_ip_literal(host: &str, port: u16) -> Option<SocketAddr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Some(SocketAddr::new(IpAddr::V4(addr), port));
    }
    let (addr, scope_id) = match host.split_once('%') {
        Some((addr, zone)) => (addr, zone_index(zone)?),
        None => (host, 0),
    };
    let addr = addr.parse::<Ipv6Addr>().ok()?;
    Some(SocketAddr::V6(SocketAddrV6::new(addr, port, 0, scope_id)))
}

fn zone_index(zone: &str) -> Option<u32> {
    if let Ok(index) = zone.parse::<u32>() {
        return Some(index);
    }
    let index = interface_index(zone);
    if index.is_none() {
        tracing::debug!(zone, "IPv6 zone names no local interface");
    }
    index
}

#[cfg(unix)]
fn interface_index(name: &str) -> Option<u32> {
    let name = std::ffi::CString::new(name).ok()?;
    // SAFETY: `name` is a valid NUL-terminated string for the whole call.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    (index != 0).then_some(index)
}

#[cfg(not(unix))]
fn interface_index(_name: &str) -> Option<u32> {
    None
}

/// Parses a DNS server override given as `ip[:port]` or `[ipv6][:port]`.
pub fn parse_server_addr(server: &str) -> Result<SocketAddr, ResolveError> {
    let invalid = || ResolveError::InvalidServer {
        addr: server.to_string(),
    };
    let (host, port) = split_host_port(server).ok_or_else(invalid)?;
    let port = match port {
        Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
        None => DEFAULT_DNS_PORT,
    };
    parse_ip_literal(host, port).ok_or_else(invalid)
}

/// Loopback addresses for a literal `localhost` target.
///
/// Used where the platform resolver cannot be trusted to answer `localhost`
/// itself. Yields IPv6 loopback first, then IPv4.
pub fn resolve_localhost_manually(target: &Target) -> Option<AddressList> {
    if !target.is_localhost() {
        return None;
    }
    let mut list = AddressList::new();
    list.push_address(SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), target.port()));
    list.push_address(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), target.port()));
    Some(list)
}
