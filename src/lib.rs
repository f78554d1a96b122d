//! # rpcresolv
//!
//! Asynchronous DNS resolution for RPC clients.
//!
//! `rpcresolv` resolves a `host:port` target into a list of socket addresses
//! sorted by destination preference (RFC 6724), and can discover, in the same
//! request, the target's load balancers (SRV records) and its service config
//! (a TXT record).
//!
//! ## Features
//!
//! - **Concurrent sub-queries**: AAAA, A, SRV and TXT lookups in flight at once
//! - **Single completion**: every request completes exactly once, success,
//!   error or cancellation
//! - **Error aggregation**: failed sub-queries are chained into one error
//! - **Pluggable backends**: hickory-dns, system getaddrinfo, or your own
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rpcresolv::dns::{DnsResolver, ResolveRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = DnsResolver::builder().build().unwrap();
//!     let resolution = resolver
//!         .resolve(ResolveRequest::new("example.com:443").service_config(true))
//!         .await
//!         .unwrap();
//!     println!("{:?}", resolution.addresses.addresses());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error types and error context
//! - [`dns`] - Target parsing, query dispatch, request lifecycle and sorting

pub mod base;
pub mod dns;
