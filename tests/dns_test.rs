//! DNS Module Tests
//!
//! Covers:
//! - `Name` struct
//! - `GaiBackend` (system resolver) behind `DnsResolver`
//! - `ResolverOptions` loaded from JSON

use rpcresolv::base::ResolveError;
use rpcresolv::dns::{DnsResolver, GaiBackend, Name, Resolve, ResolveRequest, ResolverOptions};

#[test]
fn test_name_api() {
    let name = Name::new("example.com");
    assert_eq!(name.as_str(), "example.com");
    assert_eq!(name.to_string(), "example.com");
}

fn gai_resolver() -> DnsResolver {
    DnsResolver::builder()
        .backend(GaiBackend::new())
        .query_ipv6(false)
        .manual_localhost(false)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_gai_localhost() {
    let resolver = gai_resolver();
    let addrs: Vec<_> = Resolve::resolve(&resolver, Name::new("localhost:8080"))
        .await
        .unwrap()
        .collect();

    assert!(!addrs.is_empty());
    assert!(addrs.iter().all(|a| a.port() == 8080 && a.ip().is_loopback()));
}

#[tokio::test]
async fn test_gai_without_srv_support_still_resolves() {
    // SRV and TXT answer NotImplemented; that is swallowed by the hostname
    // success.
    let resolution = gai_resolver()
        .resolve(
            ResolveRequest::new("localhost:443")
                .balancers(true)
                .service_config(true),
        )
        .await
        .unwrap();

    assert!(!resolution.addresses.is_empty());
    assert!(!resolution.addresses.has_balancers());
    assert_eq!(resolution.service_config, None);
}

#[tokio::test]
async fn test_gai_rejects_dns_server() {
    let err = gai_resolver()
        .resolve(ResolveRequest::new("localhost:443").dns_server("127.0.0.1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Session(_)));
}

#[tokio::test]
async fn test_options_from_json() {
    let options = ResolverOptions::from_json(
        r#"{"query_timeout_ms": 500, "manual_localhost": true, "sort_addresses": false}"#,
    )
    .unwrap();
    let resolver = DnsResolver::builder()
        .backend(GaiBackend::new())
        .options(options)
        .build()
        .unwrap();

    // Manual localhost answers without touching the backend.
    let resolution = resolver
        .resolve(ResolveRequest::new("localhost:9000"))
        .await
        .unwrap();
    assert_eq!(
        resolution.addresses.addresses(),
        vec!["[::1]:9000".parse().unwrap(), "127.0.0.1:9000".parse().unwrap()]
    );
}
