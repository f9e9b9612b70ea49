//! In-memory vector store for tests and dry runs.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{Record, StoreKind, StoreStats, VectorStore};
use crate::error::Result;

/// In-process store backed by an ordered map, so `get_batch` pagination is
/// deterministic by record id.
///
/// Presents itself as the given store kind (qdrant by default) so mappings
/// and flattening behave as they would against a live store.
pub struct MemoryStore {
    url: String,
    kind: StoreKind,
    records: Mutex<BTreeMap<String, Record>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(name: &str) -> Self {
        Self::with_kind(name, StoreKind::Qdrant)
    }

    /// Create an empty store advertising a specific kind.
    pub fn with_kind(name: &str, kind: StoreKind) -> Self {
        Self {
            url: format!("memory://{}", name),
            kind,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Insert a single record directly (test seeding).
    pub fn insert(&self, record: Record) {
        self.lock().insert(record.id.clone(), record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fetch one record by id.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.lock().get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Record>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}

    async fn get_batch(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<Record>> {
        let records = self.lock();
        let range = match after_id {
            Some(after) => {
                records.range::<str, _>((Bound::Excluded(after), Bound::Unbounded))
            }
            None => records.range::<str, _>(..),
        };
        Ok(range.take(limit).map(|(_, r)| r.clone()).collect())
    }

    async fn upsert_batch(&self, records: &[Record]) -> Result<()> {
        let mut map = self.lock();
        for record in records {
            map.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        let mut map = self.lock();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn validate_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let records = self.lock();
        let dimensions = records
            .values()
            .next()
            .map(|r| r.vector.len())
            .unwrap_or(0);
        let memory_bytes: u64 = records
            .values()
            .map(|r| (r.vector.len() * std::mem::size_of::<f32>()) as u64)
            .sum();

        Ok(StoreStats {
            total_records: records.len() as i64,
            dimensions,
            index_kind: "memory".to_string(),
            memory_bytes,
        })
    }

    fn source_url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(count: usize) -> MemoryStore {
        let store = MemoryStore::new("test");
        for i in 0..count {
            store.insert(Record::new(format!("rec-{:03}", i), vec![i as f32]));
        }
        store
    }

    #[tokio::test]
    async fn test_get_batch_pagination() {
        let store = seeded(25);

        let first = store.get_batch(None, 10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].id, "rec-000");

        let second = store
            .get_batch(Some(&first.last().unwrap().id), 10)
            .await
            .unwrap();
        assert_eq!(second.len(), 10);
        assert_eq!(second[0].id, "rec-010");

        let third = store
            .get_batch(Some(&second.last().unwrap().id), 10)
            .await
            .unwrap();
        assert_eq!(third.len(), 5);

        let done = store
            .get_batch(Some(&third.last().unwrap().id), 10)
            .await
            .unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn test_get_batch_deterministic() {
        let store = seeded(10);
        let a = store.get_batch(Some("rec-003"), 4).await.unwrap();
        let b = store.get_batch(Some("rec-003"), 4).await.unwrap();
        let ids_a: Vec<&str> = a.iter().map(|r| r.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a, vec!["rec-004", "rec-005", "rec-006", "rec-007"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = seeded(3);
        store
            .upsert_batch(&[Record::new("rec-001", vec![9.0, 9.0])])
            .await
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("rec-001").unwrap().vector, vec![9.0, 9.0]);
    }

    #[tokio::test]
    async fn test_delete_batch() {
        let store = seeded(5);
        store
            .delete_batch(&["rec-001".to_string(), "rec-003".to_string()])
            .await
            .unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.get("rec-001").is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = seeded(4);
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.dimensions, 1);
        assert_eq!(stats.index_kind, "memory");
    }
}
