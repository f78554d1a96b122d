//! Process-wide resolver library state.
//!
//! The system resolver configuration is read once, when the first user
//! initializes the library, and released when the last user cleans up.
//! Every backend that talks to DNS servers holds one initialization for as
//! long as it lives.

use crate::base::error::ResolveError;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use std::net::{Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{LazyLock, Mutex, PoisonError};

struct LibraryState {
    users: usize,
    system: Option<(ResolverConfig, ResolverOpts)>,
}

static LIBRARY: Mutex<LibraryState> = Mutex::new(LibraryState {
    users: 0,
    system: None,
});

/// Initializes the library, reading the system configuration on first use.
///
/// Calls nest; each must be paired with a [`cleanup`].
pub fn init() -> Result<(), ResolveError> {
    let mut state = LIBRARY.lock().unwrap_or_else(PoisonError::into_inner);
    if state.users == 0 {
        state.system = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => Some(conf),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to read system DNS configuration, using defaults"
                );
                None
            }
        };
        tracing::debug!("DNS resolver library initialized");
    }
    state.users += 1;
    Ok(())
}

/// Releases one initialization. The last one drops the cached configuration.
pub fn cleanup() {
    let mut state = LIBRARY.lock().unwrap_or_else(PoisonError::into_inner);
    match state.users {
        0 => tracing::warn!("DNS resolver library cleanup without init"),
        1 => {
            state.users = 0;
            state.system = None;
            tracing::debug!("DNS resolver library shut down");
        }
        _ => state.users -= 1,
    }
}

/// Number of outstanding initializations.
pub fn users() -> usize {
    LIBRARY.lock().unwrap_or_else(PoisonError::into_inner).users
}

/// The system configuration read at init, or defaults if it was unreadable.
pub(crate) fn system_config() -> (ResolverConfig, ResolverOpts) {
    let state = LIBRARY.lock().unwrap_or_else(PoisonError::into_inner);
    state
        .system
        .clone()
        .unwrap_or_else(|| (ResolverConfig::default(), ResolverOpts::default()))
}

/// Returns true if this host can use IPv6 loopback.
///
/// Probed once per process by binding a UDP socket to `[::1]`.
pub fn ipv6_loopback_available() -> bool {
    static AVAILABLE: LazyLock<bool> = LazyLock::new(|| {
        let available = UdpSocket::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, 0))).is_ok();
        tracing::debug!(available, "probed IPv6 loopback");
        available
    });
    *AVAILABLE
}
