//! The resolved address list handed back to callers.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::ops::Index;
use std::sync::Arc;

/// One resolved address.
#[derive(Clone)]
pub struct AddressEntry {
    addr: SocketAddr,
    is_balancer: bool,
    balancer_name: Option<String>,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl AddressEntry {
    /// A plain backend address.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            is_balancer: false,
            balancer_name: None,
            user_data: None,
        }
    }

    /// A load-balancer address discovered through `name`.
    pub fn balancer(addr: SocketAddr, name: impl Into<String>) -> Self {
        Self {
            addr,
            is_balancer: true,
            balancer_name: Some(name.into()),
            user_data: None,
        }
    }

    /// Attaches caller-owned data to the entry.
    pub fn with_user_data(mut self, data: Arc<dyn Any + Send + Sync>) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_balancer(&self) -> bool {
        self.is_balancer
    }

    pub fn balancer_name(&self) -> Option<&str> {
        self.balancer_name.as_deref()
    }

    pub fn user_data(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.user_data.as_ref()
    }
}

impl PartialEq for AddressEntry {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
            && self.is_balancer == other.is_balancer
            && self.balancer_name == other.balancer_name
            && match (&self.user_data, &other.user_data) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

impl Eq for AddressEntry {}

impl fmt::Debug for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressEntry")
            .field("addr", &self.addr)
            .field("is_balancer", &self.is_balancer)
            .field("balancer_name", &self.balancer_name)
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// Ordered collection of resolved addresses.
///
/// Entries keep insertion order (query completion order) until the address
/// sorter reorders the list once at the end of resolution. Duplicates are
/// kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList {
    entries: Vec<AddressEntry>,
}

impl AddressList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: AddressEntry) {
        self.entries.push(entry);
    }

    pub fn push_address(&mut self, addr: SocketAddr) {
        self.push(AddressEntry::new(addr));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AddressEntry> {
        self.entries.iter()
    }

    /// Socket addresses in list order.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.entries.iter().map(AddressEntry::addr).collect()
    }

    /// Returns true if any entry is a balancer address.
    pub fn has_balancers(&self) -> bool {
        self.entries.iter().any(AddressEntry::is_balancer)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<AddressEntry> {
        &mut self.entries
    }

    pub fn into_entries(self) -> Vec<AddressEntry> {
        self.entries
    }
}

impl Index<usize> for AddressList {
    type Output = AddressEntry;

    fn index(&self, index: usize) -> &AddressEntry {
        &self.entries[index]
    }
}

impl IntoIterator for AddressList {
    type Item = AddressEntry;
    type IntoIter = std::vec::IntoIter<AddressEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a AddressEntry;
    type IntoIter = std::slice::Iter<'a, AddressEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<AddressEntry> for AddressList {
    fn from_iter<I: IntoIterator<Item = AddressEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<SocketAddr> for AddressList {
    fn from_iter<I: IntoIterator<Item = SocketAddr>>(iter: I) -> Self {
        iter.into_iter().map(AddressEntry::new).collect()
    }
}
