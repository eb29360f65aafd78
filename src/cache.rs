//! In-memory tier of the component id store.
//!
//! Entries expire on their own once they haven't been accessed for a while or when capacity is
//! exceeded. Those evictions are silent: the database stays the source of truth and a cache
//! miss just falls through to it.

use crate::component_id::ComponentId;
use moka::sync::Cache;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct ComponentCache {
    inner: Cache<Uuid, ComponentId>,
}

impl ComponentCache {
    pub fn new(capacity: u64, access_ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(access_ttl)
                .build(),
        }
    }

    /// Counts as an access, pushing back the entry's expiry
    pub fn get(&self, token: Uuid) -> Option<ComponentId> {
        self.inner.get(&token)
    }

    pub fn insert(&self, token: Uuid, component_id: ComponentId) {
        self.inner.insert(token, component_id);
    }

    pub fn contains(&self, token: Uuid) -> bool {
        self.inner.contains_key(&token)
    }

    pub fn invalidate(&self, token: Uuid) {
        self.inner.invalidate(&token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_invalidate() {
        let cache = ComponentCache::new(10, Duration::from_secs(60));
        let token = Uuid::new_v4();
        let component_id = ComponentId::new("tag", vec!["foo".into()]);

        assert_eq!(cache.get(token), None);
        cache.insert(token, component_id.clone());
        assert!(cache.contains(token));
        assert_eq!(cache.get(token), Some(component_id));

        cache.invalidate(token);
        assert!(!cache.contains(token));
        assert_eq!(cache.get(token), None);
    }

    #[test]
    fn entries_expire_after_last_access() {
        let cache = ComponentCache::new(10, Duration::from_millis(50));
        let token = Uuid::new_v4();
        cache.insert(token, ComponentId::new("tag", Vec::new()));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get(token), None);
    }
}
