//! Sub-query dispatch and answer decoding.
//!
//! Each query takes a reference on its request when issued and releases it
//! when its completion has been applied, whatever the outcome. Completions
//! arrive on arbitrary tasks and are funneled back into the request's
//! [`SerialContext`] before they touch any state.

use super::addrlist::AddressEntry;
use super::channel::{AddressFamily, Lookup, SrvRecord, TxtSegment};
use super::request::RequestState;
use super::resolve::Name;
use super::serial::SerialContext;
use crate::base::context::QueryResultExt;
use crate::base::error::{QueryKind, QueryStatus};
use futures::FutureExt;
use std::net::{IpAddr, SocketAddr};
use std::panic::AssertUnwindSafe;

/// Marker that starts a service-config TXT record.
pub const SERVICE_CONFIG_PREFIX: &[u8] = b"grpc_config=";

/// One A or AAAA lookup.
#[derive(Debug, Clone)]
pub(crate) struct HostnameQuery {
    pub host: String,
    pub port: u16,
    pub is_balancer: bool,
    pub family: AddressFamily,
}

type Ctx = SerialContext<RequestState>;

impl RequestState {
    /// Issues the AAAA (if enabled) and A lookups for `host`.
    pub(crate) fn dispatch_hostname(
        &mut self,
        ctx: &Ctx,
        host: &str,
        port: u16,
        is_balancer: bool,
    ) {
        if self.plan.query_ipv6 {
            self.issue_hostname(ctx, host, port, is_balancer, AddressFamily::Ipv6);
        }
        self.issue_hostname(ctx, host, port, is_balancer, AddressFamily::Ipv4);
    }

    fn issue_hostname(
        &mut self,
        ctx: &Ctx,
        host: &str,
        port: u16,
        is_balancer: bool,
        family: AddressFamily,
    ) {
        let Some(session) = &self.session else {
            return;
        };
        let lookup = session.lookup_host(Name::new(host), family);
        let query = HostnameQuery {
            host: host.to_string(),
            port,
            is_balancer,
            family,
        };
        tracing::debug!(host, port, is_balancer, ?family, "dispatching hostname query");
        self.ref_query();
        complete_in(ctx, lookup, move |state, ctx, result| {
            state.on_hostname_done(ctx, query, result)
        });
    }

    pub(crate) fn dispatch_srv(&mut self, ctx: &Ctx, name: String) {
        let Some(session) = &self.session else {
            return;
        };
        let lookup = session.query_srv(Name::new(name.clone()));
        tracing::debug!(name = %name, "dispatching SRV query");
        self.ref_query();
        complete_in(ctx, lookup, move |state, ctx, result| {
            state.on_srv_done(ctx, &name, result)
        });
    }

    pub(crate) fn dispatch_txt(&mut self, ctx: &Ctx, name: String) {
        let Some(session) = &self.session else {
            return;
        };
        let lookup = session.query_txt(Name::new(name.clone()));
        tracing::debug!(name = %name, "dispatching TXT query");
        self.ref_query();
        complete_in(ctx, lookup, move |state, ctx, result| {
            state.on_txt_done(ctx, &name, result)
        });
    }

    fn on_hostname_done(
        &mut self,
        ctx: &Ctx,
        query: HostnameQuery,
        result: Result<Vec<IpAddr>, QueryStatus>,
    ) {
        let kind = query.family.query_kind();
        let result = result.and_then(|ips| {
            if ips.is_empty() {
                Err(QueryStatus::NoData)
            } else {
                Ok(ips)
            }
        });
        match result.query_context(kind, &query.host) {
            Ok(ips) => {
                self.error.clear();
                self.success = true;
                for ip in ips {
                    let addr = SocketAddr::new(ip, query.port);
                    tracing::debug!(
                        host = %query.host,
                        %addr,
                        is_balancer = query.is_balancer,
                        "DNS resolver got {} result",
                        kind
                    );
                    let entry = if query.is_balancer {
                        AddressEntry::balancer(addr, query.host.as_str())
                    } else {
                        AddressEntry::new(addr)
                    };
                    self.addresses.push(entry);
                }
            }
            Err(e) => self.record_failure(e, false),
        }
        self.unref_query(ctx);
    }

    fn on_srv_done(&mut self, ctx: &Ctx, name: &str, result: Result<Vec<SrvRecord>, QueryStatus>) {
        match result {
            // An empty answer just means no balancers.
            Err(QueryStatus::NoData) => tracing::debug!(name, "no SRV records"),
            result => match result.query_context(QueryKind::Srv, name) {
                Ok(records) => {
                    tracing::debug!(name, count = records.len(), "SRV query complete");
                    for record in records {
                        if self.canceled {
                            break;
                        }
                        self.dispatch_hostname(ctx, &record.target, record.port, true);
                    }
                }
                Err(e) => self.record_failure(e, false),
            },
        }
        self.unref_query(ctx);
    }

    fn on_txt_done(
        &mut self,
        ctx: &Ctx,
        name: &str,
        result: Result<Vec<TxtSegment>, QueryStatus>,
    ) {
        let result = result.and_then(|segments| extract_service_config(&segments));
        match result {
            Err(QueryStatus::NoData) => tracing::debug!(name, "no TXT records"),
            result => match result.query_context(QueryKind::Txt, name) {
                Ok(Some(config)) => {
                    tracing::info!(name, config = %config, "found service config");
                    self.service_config = Some(config);
                }
                Ok(None) => {}
                Err(e) => self.record_failure(e, true),
            },
        }
        self.unref_query(ctx);
    }
}

/// Awaits `lookup` on its own task and applies `on_done` inside the context.
///
/// A lookup that panics completes as a failed query, so the request still
/// counts down and finalizes.
fn complete_in<T, F>(ctx: &Ctx, lookup: Lookup<T>, on_done: F)
where
    T: Send + 'static,
    F: FnOnce(&mut RequestState, &Ctx, Result<T, QueryStatus>) + Send + 'static,
{
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let result = AssertUnwindSafe(lookup)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!("DNS lookup panicked");
                Err(QueryStatus::Other("DNS lookup panicked".to_string()))
            });
        ctx.run(move |state, ctx| on_done(state, ctx, result));
    });
}

/// Pulls the service config out of a TXT answer.
///
/// The config starts at the first record-starting segment carrying
/// [`SERVICE_CONFIG_PREFIX`] and continues through the segments that follow
/// it until the next record starts. Only the first segment loses the prefix.
/// A config that is not valid UTF-8 is a [`QueryStatus::BadResponse`].
pub fn extract_service_config(segments: &[TxtSegment]) -> Result<Option<String>, QueryStatus> {
    let Some(start) = segments
        .iter()
        .position(|seg| seg.record_start && seg.data.starts_with(SERVICE_CONFIG_PREFIX))
    else {
        return Ok(None);
    };
    let mut config = segments[start].data[SERVICE_CONFIG_PREFIX.len()..].to_vec();
    for seg in segments[start + 1..].iter().take_while(|seg| !seg.record_start) {
        config.extend_from_slice(&seg.data);
    }
    String::from_utf8(config)
        .map(Some)
        .map_err(|_| QueryStatus::BadResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_joins_continuation_segments() {
        let segments = vec![
            TxtSegment::new(&b"grpc_config=[{\"serviceConfig\":"[..], true),
            TxtSegment::new(&b"{\"loadBalancingPolicy\":"[..], false),
            TxtSegment::new(&b"\"round_robin\"}}]"[..], false),
        ];
        assert_eq!(
            extract_service_config(&segments).unwrap().as_deref(),
            Some("[{\"serviceConfig\":{\"loadBalancingPolicy\":\"round_robin\"}}]")
        );
    }

    #[test]
    fn test_extract_stops_at_next_record() {
        let segments = vec![
            TxtSegment::new(&b"v=spf1 -all"[..], true),
            TxtSegment::new(&b"grpc_config=abc"[..], true),
            TxtSegment::new(&b"def"[..], false),
            TxtSegment::new(&b"grpc_config=other"[..], true),
        ];
        assert_eq!(extract_service_config(&segments).unwrap().as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_extract_prefix_only_on_record_start() {
        // A continuation segment that happens to carry the prefix does not
        // start a config.
        let segments = vec![
            TxtSegment::new(&b"something"[..], true),
            TxtSegment::new(&b"grpc_config=nope"[..], false),
        ];
        assert_eq!(extract_service_config(&segments), Ok(None));
        assert_eq!(extract_service_config(&[]), Ok(None));
    }

    #[test]
    fn test_extract_keeps_prefix_text_in_later_segments() {
        let segments = vec![
            TxtSegment::new(&b"grpc_config="[..], true),
            TxtSegment::new(&b"grpc_config=x"[..], false),
        ];
        assert_eq!(
            extract_service_config(&segments).unwrap().as_deref(),
            Some("grpc_config=x")
        );
    }

    #[test]
    fn test_extract_rejects_invalid_utf8() {
        let segments = vec![
            TxtSegment::new(&b"grpc_config=[{\"a\":\""[..], true),
            TxtSegment::new(&b"\xff\xfe\"}]"[..], false),
        ];
        assert_eq!(extract_service_config(&segments), Err(QueryStatus::BadResponse));
    }
}
