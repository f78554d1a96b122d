//! System DNS backend using getaddrinfo.
//!
//! Hostname lookups run the operating system's resolver via
//! `ToSocketAddrs`, executed in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. getaddrinfo has no SRV or TXT support and no
//! way to pick a server, so those queries answer `NotImplemented` and a
//! server override is refused at channel creation.

use super::channel::{
    AddressFamily, ChannelOptions, DnsBackend, DnsChannel, Lookup, SrvRecord, TxtSegment,
};
use super::resolve::Name;
use crate::base::error::{QueryStatus, ResolveError};
use std::{
    io,
    net::{IpAddr, ToSocketAddrs},
    sync::Arc,
};

/// Backend resolving through the system's getaddrinfo.
#[derive(Clone, Debug, Default)]
pub struct GaiBackend;

impl GaiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DnsBackend for GaiBackend {
    fn new_channel(&self, options: &ChannelOptions) -> Result<Arc<dyn DnsChannel>, ResolveError> {
        if let Some(server) = options.server {
            return Err(ResolveError::Session(format!(
                "getaddrinfo cannot query a specific server ({server})"
            )));
        }
        Ok(Arc::new(GaiChannel))
    }
}

struct GaiChannel;

fn io_status(e: &io::Error) -> QueryStatus {
    match e.kind() {
        io::ErrorKind::NotFound => QueryStatus::NotFound,
        io::ErrorKind::TimedOut => QueryStatus::Timeout,
        _ => QueryStatus::Other(e.to_string()),
    }
}

impl DnsChannel for GaiChannel {
    fn lookup_host(&self, host: Name, family: AddressFamily) -> Lookup<Vec<IpAddr>> {
        Box::pin(async move {
            let name = host.as_str().to_string();
            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %name, "resolving via getaddrinfo");
                (name.as_str(), 0u16)
                    .to_socket_addrs()
                    .map(|iter| iter.map(|addr| addr.ip()).collect::<Vec<_>>())
            })
            .await;

            let ips = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    QueryStatus::Other(e.to_string())
                })?
                .map_err(|e| {
                    tracing::debug!(host = %host, error = %e, "getaddrinfo failed");
                    io_status(&e)
                })?;

            let ips: Vec<IpAddr> = ips.into_iter().filter(|ip| family.matches(ip)).collect();
            if ips.is_empty() {
                return Err(QueryStatus::NoData);
            }
            Ok(ips)
        })
    }

    fn query_srv(&self, _name: Name) -> Lookup<Vec<SrvRecord>> {
        Box::pin(async { Err(QueryStatus::NotImplemented) })
    }

    fn query_txt(&self, _name: Name) -> Lookup<Vec<TxtSegment>> {
        Box::pin(async { Err(QueryStatus::NotImplemented) })
    }
}
