//! DNS backend using hickory-dns.
//!
//! Every channel is its own hickory resolver, configured either from the
//! system configuration read by [`library::init`] or from a single server
//! override contacted over UDP and TCP. Queries are fully async; no blocking
//! threads are involved.

use super::channel::{
    AddressFamily, ChannelOptions, DnsBackend, DnsChannel, Lookup, SrvRecord, TxtSegment,
};
use super::library;
use super::resolve::Name;
use crate::base::error::{QueryStatus, ResolveError};
use bytes::Bytes;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig},
    name_server::TokioConnectionProvider,
    proto::{op::ResponseCode, xfer::Protocol, ProtoErrorKind},
    Resolver, TokioResolver,
};
use std::net::IpAddr;
use std::sync::Arc;

/// Backend whose channels query DNS servers with hickory-dns.
///
/// Holds one library initialization for its whole life.
///
/// # Example
///
/// ```rust,ignore
/// use rpcresolv::dns::{DnsResolver, HickoryBackend};
///
/// let resolver = DnsResolver::builder().backend(HickoryBackend::new()?).build();
/// ```
#[derive(Debug)]
pub struct HickoryBackend {
    _private: (),
}

impl HickoryBackend {
    pub fn new() -> Result<Self, ResolveError> {
        library::init()?;
        Ok(Self { _private: () })
    }
}

impl Drop for HickoryBackend {
    fn drop(&mut self) {
        library::cleanup();
    }
}

impl DnsBackend for HickoryBackend {
    fn new_channel(&self, options: &ChannelOptions) -> Result<Arc<dyn DnsChannel>, ResolveError> {
        let (config, mut opts) = match options.server {
            Some(server) => {
                tracing::info!(%server, "using DNS server");
                let mut config = ResolverConfig::new();
                config.add_name_server(NameServerConfig::new(server, Protocol::Udp));
                config.add_name_server(NameServerConfig::new(server, Protocol::Tcp));
                (config, library::system_config().1)
            }
            None => library::system_config(),
        };
        opts.timeout = options.timeout;
        // No caching across requests.
        opts.cache_size = 0;

        let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();
        Ok(Arc::new(HickoryChannel { resolver }))
    }
}

struct HickoryChannel {
    resolver: TokioResolver,
}

/// Maps a hickory error onto the library status vocabulary.
///
/// Negative answers of every rcode arrive as `NoRecordsFound`; the rcode
/// tells an empty answer apart from a server that failed or refused.
fn query_status(e: &hickory_resolver::ResolveError) -> QueryStatus {
    let Some(proto) = e.proto() else {
        return QueryStatus::Other(e.to_string());
    };
    match proto.kind() {
        ProtoErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => QueryStatus::NotFound,
            ResponseCode::ServFail => QueryStatus::ServerFailure,
            ResponseCode::Refused => QueryStatus::Refused,
            ResponseCode::FormErr => QueryStatus::BadResponse,
            ResponseCode::NotImp => QueryStatus::NotImplemented,
            _ => QueryStatus::NoData,
        },
        ProtoErrorKind::RequestRefused => QueryStatus::Refused,
        ProtoErrorKind::FormError { .. } => QueryStatus::BadResponse,
        ProtoErrorKind::Timeout => QueryStatus::Timeout,
        _ => QueryStatus::Other(e.to_string()),
    }
}

impl DnsChannel for HickoryChannel {
    fn lookup_host(&self, host: Name, family: AddressFamily) -> Lookup<Vec<IpAddr>> {
        let resolver = self.resolver.clone();
        Box::pin(async move {
            let result = match family {
                AddressFamily::Ipv4 => resolver
                    .ipv4_lookup(host.as_str())
                    .await
                    .map(|lookup| lookup.iter().map(|a| IpAddr::V4(a.0)).collect()),
                AddressFamily::Ipv6 => resolver
                    .ipv6_lookup(host.as_str())
                    .await
                    .map(|lookup| lookup.iter().map(|aaaa| IpAddr::V6(aaaa.0)).collect()),
            };
            result.map_err(|e| {
                tracing::debug!(host = %host, ?family, error = %e, "hickory-dns lookup failed");
                query_status(&e)
            })
        })
    }

    fn query_srv(&self, name: Name) -> Lookup<Vec<SrvRecord>> {
        let resolver = self.resolver.clone();
        Box::pin(async move {
            let lookup = resolver
                .srv_lookup(name.as_str())
                .await
                .map_err(|e| query_status(&e))?;
            Ok(lookup
                .iter()
                .map(|srv| SrvRecord {
                    target: srv.target().to_utf8().trim_end_matches('.').to_string(),
                    port: srv.port(),
                    priority: srv.priority(),
                    weight: srv.weight(),
                })
                .collect())
        })
    }

    fn query_txt(&self, name: Name) -> Lookup<Vec<TxtSegment>> {
        let resolver = self.resolver.clone();
        Box::pin(async move {
            let lookup = resolver
                .txt_lookup(name.as_str())
                .await
                .map_err(|e| query_status(&e))?;
            let mut segments = Vec::new();
            for txt in lookup.iter() {
                for (i, data) in txt.txt_data().iter().enumerate() {
                    segments.push(TxtSegment::new(Bytes::copy_from_slice(data), i == 0));
                }
            }
            Ok(segments)
        })
    }
}
