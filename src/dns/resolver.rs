//! Caller-facing resolver.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpcresolv::dns::{DnsResolver, ResolveRequest};
//!
//! let resolver = DnsResolver::builder().build()?;
//! let resolution = resolver
//!     .resolve(ResolveRequest::new("example.com").default_port("443").balancers(true))
//!     .await?;
//! for entry in &resolution.addresses {
//!     println!("{} balancer={}", entry.addr(), entry.is_balancer());
//! }
//! ```

use super::channel::{ChannelOptions, DnsBackend, Session};
use super::hickory::HickoryBackend;
use super::library;
use super::options::ResolverOptions;
use super::request::{QueryPlan, RequestState};
use super::resolve::{Addrs, Name, Resolution, Resolve, Resolving};
use super::serial::SerialContext;
use super::sorting::AddressSorter;
use super::target::{parse_server_addr, resolve_localhost_manually, Target};
use crate::base::error::ResolveError;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::oneshot;

/// Parameters of one resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    target: String,
    default_port: Option<String>,
    balancers: bool,
    service_config: bool,
    timeout: Option<Duration>,
    dns_server: Option<String>,
}

impl ResolveRequest {
    /// A request for the addresses of `target` (`host[:port]`).
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Port used when the target has none.
    pub fn default_port(mut self, port: impl Into<String>) -> Self {
        self.default_port = Some(port.into());
        self
    }

    /// Also look up balancers through SRV records.
    pub fn balancers(mut self, enabled: bool) -> Self {
        self.balancers = enabled;
        self
    }

    /// Also look up the service config TXT record.
    pub fn service_config(mut self, enabled: bool) -> Self {
        self.service_config = enabled;
        self
    }

    /// Overrides the resolver's query timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the resolver's DNS server.
    pub fn dns_server(mut self, server: impl Into<String>) -> Self {
        self.dns_server = Some(server.into());
        self
    }
}

/// Asynchronous DNS resolver with balancer and service-config discovery.
///
/// Use [`DnsResolver::builder()`] to configure and create one. Cloning is
/// cheap; clones share the backend. Resolutions must be started from within
/// a tokio runtime.
#[derive(Clone)]
pub struct DnsResolver {
    backend: Arc<dyn DnsBackend>,
    options: ResolverOptions,
    sorter: Arc<AddressSorter>,
}

impl fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DnsResolver {
    pub fn builder() -> DnsResolverBuilder {
        DnsResolverBuilder::default()
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Starts resolving `request`.
    ///
    /// Failures that need no query (bad target, bad server override, channel
    /// creation) are reported through the returned handle without
    /// dispatching anything. IP literals and, when enabled, `localhost` are
    /// answered the same way.
    pub fn resolve(&self, request: ResolveRequest) -> PendingResolve {
        let target = match Target::parse(&request.target, request.default_port.as_deref()) {
            Ok(target) => target,
            Err(e) => return PendingResolve::ready(Err(e)),
        };
        if let Some(resolution) = self.answer_locally(&request, &target) {
            return PendingResolve::ready(Ok(resolution));
        }
        match self.start(request, target) {
            Ok(pending) => pending,
            Err(e) => PendingResolve::ready(Err(e)),
        }
    }

    /// Resolves plain addresses: no balancer or service-config lookups.
    pub fn resolve_address(&self, name: &str, default_port: Option<&str>) -> PendingResolve {
        let mut request = ResolveRequest::new(name);
        request.default_port = default_port.map(str::to_string);
        self.resolve(request)
    }

    fn answer_locally(&self, request: &ResolveRequest, target: &Target) -> Option<Resolution> {
        if let Some(addr) = target.ip_literal() {
            tracing::debug!(name = %request.target, %addr, "target is an IP literal");
            return Some(Resolution {
                addresses: std::iter::once(addr).collect(),
                service_config: None,
            });
        }
        if !self.options.manual_localhost {
            return None;
        }
        let addresses = resolve_localhost_manually(target)?;
        tracing::debug!(name = %request.target, "resolved localhost manually");
        Some(Resolution {
            addresses,
            service_config: None,
        })
    }

    fn start(
        &self,
        request: ResolveRequest,
        target: Target,
    ) -> Result<PendingResolve, ResolveError> {
        let server = request
            .dns_server
            .as_deref()
            .or(self.options.dns_server.as_deref())
            .map(parse_server_addr)
            .transpose()?;
        let channel_options = ChannelOptions {
            timeout: request.timeout.unwrap_or_else(|| self.options.query_timeout()),
            server,
        };
        let session = Session::create(self.backend.as_ref(), &channel_options)?;

        let plan = QueryPlan {
            query_ipv6: self
                .options
                .query_ipv6
                .unwrap_or_else(library::ipv6_loopback_available),
            balancer_service: request
                .balancers
                .then(|| self.options.balancer_service.clone()),
            want_service_config: request.service_config,
        };
        tracing::debug!(
            host = %target.host(),
            port = target.port(),
            balancers = request.balancers,
            service_config = request.service_config,
            "starting DNS resolution"
        );

        let sorter = self.options.sort_addresses.then(|| Arc::clone(&self.sorter));
        let (tx, rx) = oneshot::channel();
        let ctx = SerialContext::spawn(RequestState::new(target, plan, session, sorter, tx));
        ctx.run(|state, ctx| state.start(ctx));
        Ok(PendingResolve {
            rx,
            cancel: CancelHandle { ctx: Some(ctx) },
        })
    }
}

/// Address-only resolution through the [`Resolve`] trait.
///
/// Names without a port resolve with port 0.
impl Resolve for DnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let pending = self.resolve_address(name.as_str(), Some("0"));
        Box::pin(async move {
            let resolution = pending.await?;
            Ok(Box::new(resolution.addresses.addresses().into_iter()) as Addrs)
        })
    }
}

/// Builder for creating a [`DnsResolver`].
#[derive(Default)]
pub struct DnsResolverBuilder {
    backend: Option<Arc<dyn DnsBackend>>,
    options: ResolverOptions,
    sorter: Option<AddressSorter>,
}

impl DnsResolverBuilder {
    /// Set the resolver library backend. Defaults to [`HickoryBackend`].
    pub fn backend(mut self, backend: impl DnsBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.options.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn dns_server(mut self, server: impl Into<String>) -> Self {
        self.options.dns_server = Some(server.into());
        self
    }

    pub fn query_ipv6(mut self, enabled: bool) -> Self {
        self.options.query_ipv6 = Some(enabled);
        self
    }

    pub fn balancer_service(mut self, service: impl Into<String>) -> Self {
        self.options.balancer_service = service.into();
        self
    }

    pub fn manual_localhost(mut self, enabled: bool) -> Self {
        self.options.manual_localhost = enabled;
        self
    }

    pub fn sort_addresses(mut self, enabled: bool) -> Self {
        self.options.sort_addresses = enabled;
        self
    }

    /// Set the address sorter. Defaults to [`AddressSorter::default`].
    pub fn sorter(mut self, sorter: AddressSorter) -> Self {
        self.sorter = Some(sorter);
        self
    }

    /// Build the resolver.
    pub fn build(self) -> Result<DnsResolver, ResolveError> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(HickoryBackend::new()?),
        };
        Ok(DnsResolver {
            backend,
            options: self.options,
            sorter: Arc::new(self.sorter.unwrap_or_default()),
        })
    }
}

/// Cancels an in-flight resolution from anywhere.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    ctx: Option<SerialContext<RequestState>>,
}

impl CancelHandle {
    /// Requests cancellation. The resolution then completes with
    /// [`ResolveError::Canceled`] unless it had already completed.
    pub fn cancel(&self) {
        if let Some(ctx) = &self.ctx {
            ctx.run(|state, _| state.cancel());
        }
    }
}

/// A resolution in progress.
///
/// Resolves to the outcome exactly once. Dropping it cancels the
/// resolution.
#[derive(Debug)]
pub struct PendingResolve {
    rx: oneshot::Receiver<Result<Resolution, ResolveError>>,
    cancel: CancelHandle,
}

impl PendingResolve {
    fn ready(result: Result<Resolution, ResolveError>) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is held right here.
        let _ = tx.send(result);
        Self {
            rx,
            cancel: CancelHandle { ctx: None },
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Future for PendingResolve {
    type Output = Result<Resolution, ResolveError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ResolveError::Canceled)))
    }
}

impl Drop for PendingResolve {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
