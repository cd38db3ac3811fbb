use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Collection names; each maps to `<name>.json` in the data directory.
pub mod names {
    pub const USERS: &str = "users";
    pub const SOS: &str = "sos";
    pub const TASKS: &str = "tasks";
    pub const CASES: &str = "cases";
    pub const PRESCRIPTIONS: &str = "prescriptions";
    pub const HOTSPOTS: &str = "hotspots";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const FEEDING: &str = "feeding";
    pub const ADOPTION_DOGS: &str = "adoption_dogs";
    pub const ADOPTION_APPLICATIONS: &str = "adoption_applications";
    pub const DONATIONS: &str = "donations";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const AUDIT: &str = "audit";
    pub const CONVERSATIONS: &str = "conversations";
    pub const MESSAGES: &str = "messages";
    pub const POSTS: &str = "posts";
    pub const BITE_ASSESSMENTS: &str = "bite_assessments";
    pub const CONTACTS: &str = "contacts";
    pub const BLOCKS: &str = "blocks";
    pub const VIDEOS: &str = "awareness_videos";
    pub const LEARNING: &str = "learning_progress";
}

const CACHE_DIR: &str = "offline_cache/cache";
const PENDING_FILE: &str = "offline_cache/pending_sync.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    ttl_seconds: i64,
    value: serde_json::Value,
}

/// An operation recorded while a remote service was unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOp {
    pub op: String,
    pub data: serde_json::Value,
    pub queued_at: DateTime<Utc>,
}

/// Typed JSON collections over a [`Storage`] backend.
///
/// Every read-modify-write goes through [`Collections::update`], which holds a
/// single store-wide lock from load to save. Closures are synchronous, so the
/// lock is never re-entered.
pub struct Collections<S: Storage> {
    storage: S,
    write_lock: Mutex<()>,
}

impl<S: Storage> Collections<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn path(name: &str) -> String {
        format!("{}.json", name)
    }

    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let Some(bytes) = self.storage.read_file(&Self::path(name)).await? else {
            return Ok(Vec::new());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| PlatformError::CorruptCollection {
            collection: name.to_string(),
            message: e.to_string(),
        })
    }

    async fn write<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let data = serde_json::to_vec_pretty(items)?;
        self.storage.write_file(&Self::path(name), &data).await?;
        tracing::trace!("saved {} records to {}", items.len(), name);
        Ok(())
    }

    pub async fn save<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(name, items).await
    }

    /// Loads `name`, applies `f`, and saves only when `f` succeeds.
    pub async fn update<T, R, F>(&self, name: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> Result<R>,
    {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.load(name).await?;
        let result = f(&mut items)?;
        self.write(name, &items).await?;
        Ok(result)
    }

    pub async fn append<T>(&self, name: &str, item: T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        self.update(name, |items: &mut Vec<T>| {
            items.push(item);
            Ok(())
        })
        .await
    }

    fn cache_path(key: &str) -> String {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}/{}.json", CACHE_DIR, safe)
    }

    pub async fn cache_put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let entry = CacheEntry {
            stored_at: Utc::now(),
            ttl_seconds: ttl.num_seconds(),
            value: serde_json::to_value(value)?,
        };
        let data = serde_json::to_vec(&entry)?;
        self.storage.write_file(&Self::cache_path(key), &data).await
    }

    /// Expired or unreadable entries count as misses.
    pub async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.storage.read_file(&Self::cache_path(key)).await? else {
            return Ok(None);
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e);
                return Ok(None);
            }
        };
        if Utc::now() - entry.stored_at > Duration::seconds(entry.ttl_seconds) {
            return Ok(None);
        }
        Ok(serde_json::from_value(entry.value).ok())
    }

    pub async fn queue_offline(&self, op: &str, data: serde_json::Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut pending = self.read_pending().await?;
        pending.push(PendingOp {
            op: op.to_string(),
            data,
            queued_at: Utc::now(),
        });
        let bytes = serde_json::to_vec_pretty(&pending)?;
        self.storage.write_file(PENDING_FILE, &bytes).await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.read_pending().await?.len())
    }

    /// Returns every queued operation and clears the queue.
    pub async fn drain_pending(&self) -> Result<Vec<PendingOp>> {
        let _guard = self.write_lock.lock().await;
        let pending = self.read_pending().await?;
        if !pending.is_empty() {
            self.storage.remove_file(PENDING_FILE).await?;
        }
        Ok(pending)
    }

    async fn read_pending(&self) -> Result<Vec<PendingOp>> {
        match self.storage.read_file(PENDING_FILE).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PlatformError::CorruptCollection {
                    collection: "pending_sync".to_string(),
                    message: e.to_string(),
                }
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = Collections::new(MemoryStorage::new());
        let items: Vec<Item> = store.load("sos").await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_collection_is_an_error() {
        let storage = MemoryStorage::new();
        storage.put_raw("cases.json", b"{not json").await;
        let store = Collections::new(storage);

        let err = store.load::<Item>("cases").await.unwrap_err();
        assert!(matches!(err, PlatformError::CorruptCollection { ref collection, .. } if collection == "cases"));
    }

    #[tokio::test]
    async fn test_update_saves_only_on_success() {
        let store = Collections::new(MemoryStorage::new());
        store.save("items", &[Item { id: 1 }]).await.unwrap();

        let failed: Result<()> = store
            .update("items", |items: &mut Vec<Item>| {
                items.clear();
                Err(PlatformError::validation("nope"))
            })
            .await;
        assert!(failed.is_err());
        assert_eq!(store.load::<Item>("items").await.unwrap().len(), 1);

        let count = store
            .update("items", |items: &mut Vec<Item>| {
                items.push(Item { id: 2 });
                Ok(items.len())
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(Collections::new(MemoryStorage::new()));
        let mut handles = Vec::new();
        for id in 0..25 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append("items", Item { id }).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.load::<Item>("items").await.unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_cache_respects_ttl() {
        let store = Collections::new(MemoryStorage::new());
        store
            .cache_put("geo:adyar", &json!({"lat": 13.0}), Duration::hours(1))
            .await
            .unwrap();
        store
            .cache_put("stale", &json!(1), Duration::seconds(-1))
            .await
            .unwrap();

        let hit: Option<serde_json::Value> = store.cache_get("geo:adyar").await.unwrap();
        assert_eq!(hit, Some(json!({"lat": 13.0})));
        assert!(store.cache_get::<i32>("stale").await.unwrap().is_none());
        assert!(store.cache_get::<i32>("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_keys_cannot_clobber_sync_queue() {
        let store = Arc::new(Collections::new(MemoryStorage::new()));
        store.queue_offline("alert_delivery", json!({"sos": "SOS-1"})).await.unwrap();
        store
            .cache_put("pending_sync", &json!(["not", "ops"]), Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.cache_put("places_adyar", &json!(i), Duration::hours(1)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let hit: Option<i32> = store.cache_get("places_adyar").await.unwrap();
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn test_pending_queue_drains_once() {
        let store = Collections::new(MemoryStorage::new());
        store.queue_offline("create_sos", json!({"place": "Adyar"})).await.unwrap();
        store.queue_offline("donate", json!({"amount": 500})).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 2);

        let drained = store.drain_pending().await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].op, "create_sos");
        assert!(store.drain_pending().await.unwrap().is_empty());
    }
}
