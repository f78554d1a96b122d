//! Destination address ordering (RFC 6724, section 6).
//!
//! Every destination is paired with the source address the host would use
//! to reach it, then the list is sorted by the RFC's destination rules. IPv4
//! addresses are compared in their IPv4-mapped IPv6 form. Rules 3 and 4
//! (deprecated and home addresses) need interface state we do not have and
//! are skipped. Where every rule ties, addresses are ordered by value so the
//! result never depends on the order answers arrived in.

use super::addrlist::{AddressEntry, AddressList};
use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

const SORTING_TARGET: &str = "rpcresolv::sorting";

const SCOPE_LINK_LOCAL: u8 = 0x2;
const SCOPE_SITE_LOCAL: u8 = 0x5;
const SCOPE_GLOBAL: u8 = 0xe;

/// Picks the source address used to reach a destination.
pub trait SourceAddrFactory: Send + Sync {
    /// Returns `None` when `dest` is unreachable.
    fn source_addr(&self, dest: &SocketAddr) -> Option<IpAddr>;
}

/// Deterministic source selection that needs no network access.
///
/// Synthesizes a source of the destination's family and scope: loopback for
/// loopback, link-local for link-local, a documentation-range global
/// address otherwise. Unspecified and multicast destinations are unusable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesizedSource;

impl SourceAddrFactory for SynthesizedSource {
    fn source_addr(&self, dest: &SocketAddr) -> Option<IpAddr> {
        match dest.ip() {
            IpAddr::V4(v4) => synthesize_v4(v4).map(IpAddr::V4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => synthesize_v4(v4).map(|s| IpAddr::V6(s.to_ipv6_mapped())),
                None => synthesize_v6(v6).map(IpAddr::V6),
            },
        }
    }
}

fn synthesize_v4(dest: Ipv4Addr) -> Option<Ipv4Addr> {
    if dest.is_unspecified() || dest.is_multicast() || dest.is_broadcast() {
        None
    } else if dest.is_loopback() {
        Some(Ipv4Addr::LOCALHOST)
    } else if dest.is_link_local() {
        Some(Ipv4Addr::new(169, 254, 0, 1))
    } else {
        Some(Ipv4Addr::new(192, 0, 2, 1))
    }
}

fn synthesize_v6(dest: Ipv6Addr) -> Option<Ipv6Addr> {
    let seg = dest.segments();
    if dest.is_unspecified() || dest.is_multicast() {
        None
    } else if dest.is_loopback() {
        Some(Ipv6Addr::LOCALHOST)
    } else if seg[0] & 0xffc0 == 0xfe80 {
        Some(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))
    } else if seg[0] & 0xffc0 == 0xfec0 {
        Some(Ipv6Addr::new(0xfec0, 0, 0, 0, 0, 0, 0, 1))
    } else if seg[0] & 0xfe00 == 0xfc00 {
        Some(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))
    } else {
        Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))
    }
}

/// Source selection through the OS routing table.
///
/// Connects an unbound UDP socket to the destination (no packet is sent) and
/// reads back the local address the kernel chose.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutedSource;

impl SourceAddrFactory for RoutedSource {
    fn source_addr(&self, dest: &SocketAddr) -> Option<IpAddr> {
        let bind: SocketAddr = match dest {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let mut probe = *dest;
        if probe.port() == 0 {
            probe.set_port(1);
        }
        let socket = UdpSocket::bind(bind).ok()?;
        socket.connect(probe).ok()?;
        socket.local_addr().ok().map(|local| local.ip())
    }
}

/// Orders address lists by destination preference.
pub struct AddressSorter {
    source: Box<dyn SourceAddrFactory>,
}

impl Default for AddressSorter {
    fn default() -> Self {
        Self::new(SynthesizedSource)
    }
}

impl std::fmt::Debug for AddressSorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSorter").finish_non_exhaustive()
    }
}

struct Sortable {
    entry: AddressEntry,
    dest: Ipv6Addr,
    source: Option<Ipv6Addr>,
}

impl AddressSorter {
    pub fn new(source: impl SourceAddrFactory + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Sorts `list` in place, most preferred destination first.
    pub fn sort(&self, list: &mut AddressList) {
        if list.len() < 2 {
            return;
        }
        log_list(list, "input");
        let entries = std::mem::take(list.entries_mut());
        let mut sortables: Vec<Sortable> = entries
            .into_iter()
            .map(|entry| {
                let source = self.source.source_addr(&entry.addr()).map(to_v6);
                Sortable {
                    dest: to_v6(entry.addr().ip()),
                    source,
                    entry,
                }
            })
            .collect();
        sortables.sort_by(compare);
        list.entries_mut()
            .extend(sortables.into_iter().map(|sortable| sortable.entry));
        log_list(list, "output");
    }
}

fn log_list(list: &AddressList, stage: &str) {
    for (i, entry) in list.iter().enumerate() {
        tracing::trace!(
            target: SORTING_TARGET,
            stage,
            index = i,
            addr = %entry.addr(),
            "address sorting"
        );
    }
}

fn to_v6(ip: IpAddr) -> Ipv6Addr {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}

fn compare(a: &Sortable, b: &Sortable) -> Ordering {
    rule_usable(a, b)
        .then_with(|| rule_matching_scope(a, b))
        .then_with(|| rule_matching_label(a, b))
        .then_with(|| rule_precedence(a, b))
        .then_with(|| rule_native_transport(a, b))
        .then_with(|| rule_smaller_scope(a, b))
        .then_with(|| rule_longest_prefix(a, b))
        .then_with(|| a.dest.octets().cmp(&b.dest.octets()))
        .then_with(|| a.entry.addr().port().cmp(&b.entry.addr().port()))
}

/// Orders `true` before `false`.
fn prefer(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

// Rule 1: avoid unusable destinations.
fn rule_usable(a: &Sortable, b: &Sortable) -> Ordering {
    prefer(a.source.is_some(), b.source.is_some())
}

// Rule 2: prefer matching scope.
fn rule_matching_scope(a: &Sortable, b: &Sortable) -> Ordering {
    let matches = |s: &Sortable| s.source.is_some_and(|src| scope(&src) == scope(&s.dest));
    prefer(matches(a), matches(b))
}

// Rule 5: prefer matching label.
fn rule_matching_label(a: &Sortable, b: &Sortable) -> Ordering {
    let matches = |s: &Sortable| s.source.is_some_and(|src| policy(&src).1 == policy(&s.dest).1);
    prefer(matches(a), matches(b))
}

// Rule 6: prefer higher precedence.
fn rule_precedence(a: &Sortable, b: &Sortable) -> Ordering {
    policy(&b.dest).0.cmp(&policy(&a.dest).0)
}

// Rule 7: prefer native transport over 6to4 and Teredo.
fn rule_native_transport(a: &Sortable, b: &Sortable) -> Ordering {
    prefer(!is_tunneled(&a.dest), !is_tunneled(&b.dest))
}

// Rule 8: prefer smaller scope.
fn rule_smaller_scope(a: &Sortable, b: &Sortable) -> Ordering {
    scope(&a.dest).cmp(&scope(&b.dest))
}

// Rule 9: longest matching prefix, IPv6 destinations only.
fn rule_longest_prefix(a: &Sortable, b: &Sortable) -> Ordering {
    if a.dest.to_ipv4_mapped().is_some() || b.dest.to_ipv4_mapped().is_some() {
        return Ordering::Equal;
    }
    match (a.source, b.source) {
        (Some(sa), Some(sb)) => {
            common_prefix_len(&b.dest, &sb).cmp(&common_prefix_len(&a.dest, &sa))
        }
        _ => Ordering::Equal,
    }
}

fn is_tunneled(addr: &Ipv6Addr) -> bool {
    let seg = addr.segments();
    seg[0] == 0x2002 || (seg[0] == 0x2001 && seg[1] == 0)
}

/// (precedence, label) from the RFC 6724 default policy table.
fn policy(addr: &Ipv6Addr) -> (u8, u8) {
    let seg = addr.segments();
    if addr.is_loopback() {
        (50, 0)
    } else if addr.to_ipv4_mapped().is_some() {
        (35, 4)
    } else if seg[0] == 0x2002 {
        (30, 2)
    } else if seg[0] == 0x2001 && seg[1] == 0 {
        (5, 5)
    } else if seg[0] & 0xfe00 == 0xfc00 {
        (3, 13)
    } else if seg[..6] == [0; 6] {
        // IPv4-compatible, ::/96
        (1, 3)
    } else if seg[0] & 0xffc0 == 0xfec0 {
        (1, 11)
    } else if seg[0] == 0x3ffe {
        (1, 12)
    } else {
        (40, 1)
    }
}

fn scope(addr: &Ipv6Addr) -> u8 {
    if let Some(v4) = addr.to_ipv4_mapped() {
        return if v4.is_loopback() || v4.is_link_local() {
            SCOPE_LINK_LOCAL
        } else {
            SCOPE_GLOBAL
        };
    }
    let seg = addr.segments();
    if addr.is_multicast() {
        (seg[0] & 0x000f) as u8
    } else if addr.is_loopback() || seg[0] & 0xffc0 == 0xfe80 {
        SCOPE_LINK_LOCAL
    } else if seg[0] & 0xffc0 == 0xfec0 {
        SCOPE_SITE_LOCAL
    } else {
        SCOPE_GLOBAL
    }
}

fn common_prefix_len(a: &Ipv6Addr, b: &Ipv6Addr) -> u32 {
    let diff = u128::from_be_bytes(a.octets()) ^ u128::from_be_bytes(b.octets());
    // Only the first 64 bits count, per RFC 6724 section 2.2
    diff.leading_zeros().min(64)
}
