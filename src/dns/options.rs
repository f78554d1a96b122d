//! Resolver configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-query timeout, in milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 120_000;

/// Default service name for balancer discovery.
pub const DEFAULT_BALANCER_SERVICE: &str = "grpclb";

/// Settings shared by every request of a [`DnsResolver`](super::DnsResolver).
///
/// Every field has a default, so partial JSON documents load fine:
///
/// ```rust,ignore
/// let options = ResolverOptions::from_json(r#"{"dns_server": "10.0.0.53"}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    pub query_timeout_ms: u64,
    /// `ip[:port]` of a server to use instead of the system ones.
    pub dns_server: Option<String>,
    /// Whether to issue AAAA queries. `None` probes IPv6 loopback once.
    pub query_ipv6: Option<bool>,
    /// Balancers are looked up at `_<service>._tcp.<host>`.
    pub balancer_service: String,
    /// Answer `localhost` with loopback addresses without querying.
    pub manual_localhost: bool,
    pub sort_addresses: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            dns_server: None,
            query_ipv6: None,
            balancer_service: DEFAULT_BALANCER_SERVICE.to_string(),
            manual_localhost: cfg!(windows),
            sort_addresses: true,
        }
    }
}

impl ResolverOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
