//! Core DNS resolution types and traits.
//!
//! This module defines the `Resolve` trait and the values a resolution
//! produces. Consumers hold a `Resolve` trait object instead of a concrete
//! resolver, so tests and embedders can inject their own implementation.

use super::addrlist::AddressList;
use super::service_config;
use crate::base::error::ResolveError;
use std::{fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc};

/// A domain name (or `host:port` target) to resolve.
///
/// This is a lightweight wrapper around a string that provides a type-safe
/// way to pass names between the resolver and its backends.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    /// View the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Successful outcome of a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Sorted addresses, balancers included.
    pub addresses: AddressList,
    /// Raw service config text from the TXT record, if one was requested
    /// and found.
    pub service_config: Option<String>,
}

impl Resolution {
    /// Picks the service config that applies to this client from the raw
    /// choice list. See [`service_config::choose`].
    pub fn choose_service_config(
        &self,
        client_hostname: &str,
        percentage_roll: u8,
    ) -> Result<Option<String>, ResolveError> {
        match &self.service_config {
            Some(raw) => service_config::choose(raw, client_hostname, percentage_roll),
            None => Ok(None),
        }
    }
}

/// Alias for an `Iterator` trait object over `SocketAddr`.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Alias for the `Future` type returned by [`Resolve::resolve`].
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, ResolveError>> + Send>>;

/// Address-only name resolution.
///
/// `name` is a `host[:port]` target; the returned addresses carry the
/// target's port, or 0 without one. No balancer or service-config lookups
/// are made.
/// Implementations must be thread-safe.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}
