//! Resolves a target and prints what was found.
//!
//! ```text
//! RUST_LOG=rpcresolv=debug cargo run --example resolve -- example.com:443 [dns-server]
//! ```

use rpcresolv::dns::{DnsResolver, ResolveRequest};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| "localhost:443".to_string());

    let mut builder = DnsResolver::builder();
    if let Some(server) = args.next() {
        builder = builder.dns_server(server);
    }
    let resolver = match builder.build() {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("cannot create resolver: {e}");
            std::process::exit(1);
        }
    };

    let request = ResolveRequest::new(target.as_str())
        .default_port("443")
        .balancers(true)
        .service_config(true);
    match resolver.resolve(request).await {
        Ok(resolution) => {
            for entry in &resolution.addresses {
                match entry.balancer_name() {
                    Some(name) => println!("{} (balancer {})", entry.addr(), name),
                    None => println!("{}", entry.addr()),
                }
            }
            if let Some(config) = &resolution.service_config {
                println!("service config: {config}");
            }
        }
        Err(e) => {
            eprintln!("{target}: {e} (status {})", e.status_code());
            std::process::exit(1);
        }
    }
}
