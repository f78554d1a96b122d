//! Boundary with the resolver library.
//!
//! The resolution core never speaks DNS itself. It asks a [`DnsBackend`] for
//! a [`DnsChannel`], issues single-question queries on it, and receives
//! already-decoded answers. A [`Session`] wraps one channel for the lifetime
//! of one resolution request and owns its timeout and shutdown.

use super::resolve::Name;
use crate::base::error::{QueryKind, QueryStatus, ResolveError};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};

/// Alias for the `Future` returned by a single query.
pub type Lookup<T> = BoxFuture<'static, Result<T, QueryStatus>>;

/// Address family of a hostname query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn query_kind(self) -> QueryKind {
        match self {
            AddressFamily::Ipv4 => QueryKind::Ipv4,
            AddressFamily::Ipv6 => QueryKind::Ipv6,
        }
    }

    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::Ipv4 => ip.is_ipv4(),
            AddressFamily::Ipv6 => ip.is_ipv6(),
        }
    }
}

/// One decoded SRV answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

impl SrvRecord {
    pub fn new(target: impl Into<String>, port: u16) -> Self {
        Self {
            target: target.into(),
            port,
            priority: 0,
            weight: 0,
        }
    }
}

/// One character-string of a TXT answer.
///
/// A TXT record is a sequence of character-strings; the first string of
/// each record has `record_start` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtSegment {
    pub data: Bytes,
    pub record_start: bool,
}

impl TxtSegment {
    pub fn new(data: impl Into<Bytes>, record_start: bool) -> Self {
        Self {
            data: data.into(),
            record_start,
        }
    }
}

/// Settings for a new query channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Per-query timeout handed to the library.
    pub timeout: Duration,
    /// Non-default DNS server to query instead of the system ones.
    pub server: Option<SocketAddr>,
}

/// A query channel of the resolver library.
///
/// Implementations must be thread-safe; completions may arrive on any thread.
pub trait DnsChannel: Send + Sync {
    /// Looks up the A or AAAA records of `host`.
    fn lookup_host(&self, host: Name, family: AddressFamily) -> Lookup<Vec<IpAddr>>;

    /// Queries SRV records of `name`.
    fn query_srv(&self, name: Name) -> Lookup<Vec<SrvRecord>>;

    /// Queries TXT records of `name`, using the search list.
    fn query_txt(&self, name: Name) -> Lookup<Vec<TxtSegment>>;
}

/// Factory for query channels: the resolver library itself.
pub trait DnsBackend: Send + Sync {
    /// Creates a channel. Fails with `ResolveError::Session`.
    fn new_channel(&self, options: &ChannelOptions) -> Result<Arc<dyn DnsChannel>, ResolveError>;
}

/// Blanket implementation for Arc-wrapped backends.
impl<B: DnsBackend + ?Sized> DnsBackend for Arc<B> {
    fn new_channel(&self, options: &ChannelOptions) -> Result<Arc<dyn DnsChannel>, ResolveError> {
        (**self).new_channel(options)
    }
}

/// Query session for a single resolution request.
///
/// Every query issued through the session races against its shutdown
/// signal: once the session is shut down (explicitly or by its timeout),
/// outstanding and future queries complete with the shutdown status instead
/// of their answer. Shutdown never drops a completion.
pub struct Session {
    channel: Arc<dyn DnsChannel>,
    timeout: Duration,
    shutdown: Arc<watch::Sender<Option<QueryStatus>>>,
    timer: Option<JoinHandle<()>>,
}

impl Session {
    /// Creates a session on a fresh channel of `backend`.
    pub fn create(
        backend: &dyn DnsBackend,
        options: &ChannelOptions,
    ) -> Result<Self, ResolveError> {
        let channel = backend.new_channel(options).inspect_err(|e| {
            tracing::warn!(error = %e, "failed to create DNS query channel");
        })?;
        let (shutdown, _) = watch::channel(None);
        Ok(Self {
            channel,
            timeout: options.timeout,
            shutdown: Arc::new(shutdown),
            timer: None,
        })
    }

    /// The underlying channel.
    pub fn channel(&self) -> &Arc<dyn DnsChannel> {
        &self.channel
    }

    /// Arms the session timeout. Later calls are no-ops.
    pub fn start(&mut self) {
        if self.timer.is_some() || self.is_shut_down() {
            return;
        }
        let shutdown = Arc::clone(&self.shutdown);
        let timeout = self.timeout;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let fired = shutdown.send_if_modified(|state| {
                if state.is_none() {
                    *state = Some(QueryStatus::Timeout);
                    true
                } else {
                    false
                }
            });
            if fired {
                tracing::debug!(?timeout, "DNS query session timed out");
            }
        }));
    }

    /// Shuts the session down. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(QueryStatus::Cancelled);
                true
            } else {
                false
            }
        });
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.borrow().is_some()
    }

    pub fn lookup_host(&self, host: Name, family: AddressFamily) -> Lookup<Vec<IpAddr>> {
        self.guard(self.channel.lookup_host(host, family))
    }

    pub fn query_srv(&self, name: Name) -> Lookup<Vec<SrvRecord>> {
        self.guard(self.channel.query_srv(name))
    }

    pub fn query_txt(&self, name: Name) -> Lookup<Vec<TxtSegment>> {
        self.guard(self.channel.query_txt(name))
    }

    fn guard<T: Send + 'static>(&self, query: Lookup<T>) -> Lookup<T> {
        let mut rx = self.shutdown.subscribe();
        Box::pin(async move {
            let stopped = async move {
                rx.wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|state| (*state).clone())
                    .unwrap_or(QueryStatus::Cancelled)
            };
            tokio::select! {
                biased;
                status = stopped => Err(status),
                result = query => result,
            }
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("timeout", &self.timeout)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
