//! DNS Resolution Module
//!
//! Resolves `host:port` targets into sorted address lists, optionally
//! discovering load-balancer addresses through SRV records and a service
//! config through a TXT record, all in one request.
//!
//! # Architecture
//!
//! A [`DnsResolver`] turns each request into a [`request`] state machine
//! owned by a [`SerialContext`]. The state machine fans out sub-queries over
//! a [`Session`] on a [`DnsBackend`] channel, counts them back in, and
//! finalizes exactly once with either a sorted [`AddressList`] or an
//! aggregated [`ResolveError`](crate::base::ResolveError).
//!
//! Backends are pluggable: [`HickoryBackend`] talks to DNS servers,
//! [`GaiBackend`] uses the system's getaddrinfo for plain addresses, and
//! tests script their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpcresolv::dns::{DnsResolver, Name, Resolve};
//!
//! let resolver = DnsResolver::builder().build()?;
//! // `DnsResolver::resolve` takes a `ResolveRequest`; address-only lookups
//! // go through the `Resolve` trait.
//! let addrs = Resolve::resolve(&resolver, Name::new("example.com:443")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr);
//! }
//! ```

pub mod addrlist;
pub mod channel;
mod dispatch;
mod gai;
mod hickory;
pub mod library;
pub mod options;
mod request;
mod resolve;
mod resolver;
pub mod serial;
pub mod service_config;
pub mod sorting;
pub mod target;

pub use addrlist::{AddressEntry, AddressList};
pub use channel::{
    AddressFamily, ChannelOptions, DnsBackend, DnsChannel, Lookup, Session, SrvRecord, TxtSegment,
};
pub use dispatch::{extract_service_config, SERVICE_CONFIG_PREFIX};
pub use gai::GaiBackend;
pub use hickory::HickoryBackend;
pub use options::ResolverOptions;
pub use resolve::{Addrs, Name, Resolution, Resolve, Resolving};
pub use resolver::{
    CancelHandle, DnsResolver, DnsResolverBuilder, PendingResolve, ResolveRequest,
};
pub use serial::SerialContext;
pub use sorting::{AddressSorter, RoutedSource, SourceAddrFactory, SynthesizedSource};
pub use target::Target;
