use crate::store::{DedupStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// In-process dedup set. Entries carry an optional expiry; expired
/// entries are replaced on insert and treated as absent on lookup.
pub struct InMemoryDedupStore {
    entries: Mutex<HashMap<String, Option<Instant>>>,
    ttl: Option<Duration>,
}

impl InMemoryDedupStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

fn is_live(expires_at: &Option<Instant>, now: Instant) -> bool {
    match expires_at {
        None => true,
        Some(expiry) => now < *expiry,
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn add(&self, id: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(expires_at) = entries.get(id) {
            if is_live(expires_at, now) {
                return Err(StoreError::AlreadyExists);
            }
        }

        entries.insert(id.to_string(), self.ttl.map(|ttl| now + ttl));
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(entries
            .get(id)
            .map(|expires_at| is_live(expires_at, now))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_rejects_duplicates() {
        let store = InMemoryDedupStore::new(None);
        store.add("c1").await.expect("first add");
        assert_eq!(store.add("c1").await, Err(StoreError::AlreadyExists));
        assert_eq!(store.exists("c1").await, Ok(true));
        assert_eq!(store.exists("c2").await, Ok(false));
    }

    #[tokio::test]
    async fn expired_entries_can_be_re_added() {
        let store = InMemoryDedupStore::new(Some(Duration::from_millis(30)));
        store.add("c1").await.expect("first add");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.exists("c1").await, Ok(false));
        assert!(store.add("c1").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_adds_admit_exactly_one() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryDedupStore::new(None));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.add("same-id").await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("join").is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
