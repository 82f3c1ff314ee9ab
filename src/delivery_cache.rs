use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Remembers `X-GitHub-Delivery` ids so redeliveries are not answered twice.
#[derive(Clone)]
pub struct DeliveryCache {
    seen: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl DeliveryCache {
    pub fn new(ttl: Duration) -> Self {
        DeliveryCache {
            seen: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Records `delivery_id`. Returns false if it was already seen within the TTL.
    pub fn insert(&self, delivery_id: &str) -> bool {
        let now = Instant::now();
        let ttl = self.ttl;
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < ttl);

        match self.seen.entry(delivery_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.len()
    }
}
