//! Property listener table keyed by device host.

use std::net::IpAddr;
use std::sync::Arc;

/// Listener invoked with `(property, value)` for each matching event.
pub type PropertyCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Handle returned by [`SubscriptionRegistry::on`](super::SubscriptionRegistry::on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    host: IpAddr,
    property: String,
    callback: PropertyCallback,
}

/// Listeners in registration order.
#[derive(Default)]
pub(crate) struct CallbackTable {
    next_id: u64,
    entries: Vec<Registration>,
}

impl CallbackTable {
    pub fn add(&mut self, host: IpAddr, property: &str, callback: PropertyCallback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Registration {
            id,
            host,
            property: property.to_string(),
            callback,
        });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|r| r.id != id);
        self.entries.len() != before
    }

    /// Drops every listener for `host` and returns how many there were.
    pub fn clear_host(&mut self, host: IpAddr) -> usize {
        let before = self.entries.len();
        self.entries.retain(|r| r.host != host);
        before - self.entries.len()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|r| r.id == id)
    }

    pub fn matching(&self, host: IpAddr, property: &str) -> Vec<(ListenerId, PropertyCallback)> {
        self.entries
            .iter()
            .filter(|r| r.host == host && r.property == property)
            .map(|r| (r.id, r.callback.clone()))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
