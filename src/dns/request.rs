//! Lifecycle of one resolution request.
//!
//! A request owns its session, its output slots and the count of in-flight
//! sub-queries. All of it lives inside a [`SerialContext`]; sub-query
//! completions are submitted to that context, so the state below is only
//! ever touched by one job at a time.
//!
//! `pending_queries` starts at one: the dispatch routine holds that unit
//! until every initial query has been issued, so completions that race
//! ahead cannot drive the count to zero early. The request finalizes
//! exactly once, when the count returns to zero.

use super::addrlist::AddressList;
use super::channel::Session;
use super::resolve::Resolution;
use super::serial::SerialContext;
use super::sorting::AddressSorter;
use super::target::Target;
use crate::base::error::{ErrorChain, QueryKind, QueryStatus, ResolveError};
use std::sync::Arc;
use tokio::sync::oneshot;

pub(crate) type Completion = oneshot::Sender<Result<Resolution, ResolveError>>;

/// Where a request is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Created,
    AwaitingQueries,
    Finalizing,
    Done,
}

/// What the caller asked for, beyond plain addresses.
#[derive(Debug, Clone)]
pub(crate) struct QueryPlan {
    pub query_ipv6: bool,
    /// Service name for balancer discovery (`_<service>._tcp.<host>`).
    pub balancer_service: Option<String>,
    pub want_service_config: bool,
}

pub(crate) struct RequestState {
    pub(crate) target: Target,
    pub(crate) plan: QueryPlan,
    pub(crate) session: Option<Session>,
    pub(crate) pending_queries: usize,
    pub(crate) success: bool,
    pub(crate) error: ErrorChain,
    pub(crate) addresses: AddressList,
    pub(crate) service_config: Option<String>,
    pub(crate) canceled: bool,
    phase: Phase,
    sorter: Option<Arc<AddressSorter>>,
    on_done: Option<Completion>,
}

impl RequestState {
    pub(crate) fn new(
        target: Target,
        plan: QueryPlan,
        session: Session,
        sorter: Option<Arc<AddressSorter>>,
        on_done: Completion,
    ) -> Self {
        Self {
            target,
            plan,
            session: Some(session),
            pending_queries: 0,
            success: false,
            error: ErrorChain::new(),
            addresses: AddressList::new(),
            service_config: None,
            canceled: false,
            phase: Phase::Created,
            sorter,
            on_done: Some(on_done),
        }
    }

    /// Issues every initial query, then drops the dispatch bias.
    pub(crate) fn start(&mut self, ctx: &SerialContext<Self>) {
        debug_assert_eq!(self.phase, Phase::Created);
        self.phase = Phase::AwaitingQueries;
        self.pending_queries = 1;
        if !self.canceled {
            let host = self.target.host().to_string();
            let port = self.target.port();
            self.dispatch_hostname(ctx, &host, port, false);
            if let Some(service) = self.plan.balancer_service.clone() {
                self.dispatch_srv(ctx, self.target.srv_name(&service));
            }
            if self.plan.want_service_config {
                self.dispatch_txt(ctx, self.target.txt_name());
            }
            if let Some(session) = self.session.as_mut() {
                session.start();
            }
        }
        self.unref_query(ctx);
    }

    pub(crate) fn ref_query(&mut self) {
        self.pending_queries += 1;
    }

    pub(crate) fn unref_query(&mut self, ctx: &SerialContext<Self>) {
        debug_assert!(self.pending_queries > 0, "query count underflow");
        match self.pending_queries.checked_sub(1) {
            Some(remaining) => self.pending_queries = remaining,
            None => {
                tracing::error!(host = %self.target.host(), "query count underflow");
                return;
            }
        }
        if self.pending_queries == 0 {
            self.finalize(ctx);
        }
    }

    /// Records a failed sub-query.
    ///
    /// Once any hostname query has succeeded, failures are no longer
    /// recorded unless `always` is set; recorded ones are still discarded at
    /// finalization when the request succeeded.
    pub(crate) fn record_failure(&mut self, error: ResolveError, always: bool) {
        if self.success && !always {
            return;
        }
        tracing::debug!(error = %error, "DNS query failed");
        self.error.add(error);
    }

    /// Stops further dispatch and shuts the session down. Idempotent.
    ///
    /// Queries already in flight still complete (with a cancelled status)
    /// and still count down; the caller then sees `ResolveError::Canceled`.
    pub(crate) fn cancel(&mut self) {
        if self.canceled || self.phase == Phase::Done {
            return;
        }
        tracing::debug!(host = %self.target.host(), "canceling DNS resolution");
        self.canceled = true;
        if let Some(session) = &self.session {
            session.shutdown();
        }
    }

    fn finalize(&mut self, ctx: &SerialContext<Self>) {
        if self.phase != Phase::AwaitingQueries {
            return;
        }
        self.phase = Phase::Finalizing;
        if let Some(session) = self.session.take() {
            session.shutdown();
        }

        let result = if self.canceled {
            Err(ResolveError::Canceled)
        } else if self.success {
            self.error.clear();
            let mut addresses = std::mem::take(&mut self.addresses);
            if let Some(sorter) = &self.sorter {
                sorter.sort(&mut addresses);
            }
            Ok(Resolution {
                addresses,
                service_config: self.service_config.take(),
            })
        } else {
            Err(self.error.take().unwrap_or_else(|| ResolveError::Query {
                kind: QueryKind::Ipv4,
                name: self.target.host().to_string(),
                status: QueryStatus::NoData,
            }))
        };

        match &result {
            Ok(resolution) => tracing::debug!(
                host = %self.target.host(),
                count = resolution.addresses.len(),
                "DNS resolution complete"
            ),
            Err(e) => {
                tracing::debug!(host = %self.target.host(), error = %e, "DNS resolution failed")
            }
        }

        self.phase = Phase::Done;
        ctx.finish();
        if let Some(on_done) = self.on_done.take() {
            // The caller may have dropped the pending handle.
            let _ = on_done.send(result);
        }
    }
}
