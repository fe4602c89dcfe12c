use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::{sync::RwLock, time::Instant};

use crate::api::{ApiError, JsonTransport};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Record type served from a REST collection such as `/children`.
pub trait Resource: Clone + Send + Sync + DeserializeOwned + 'static {
    /// Body accepted by create and update.
    type Draft: Serialize + Send + Sync;
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

struct CacheEntry<R> {
    items: Vec<R>,
    fetched_at: Instant,
}

/// Explicit, injectable cache over one collection.
///
/// Staleness rules:
/// - `list()` serves the cached listing until it is invalidated or, when a
///   max age is set, until it is older than that.
/// - Every successful create/update/delete invalidates and refetches.
/// - A failed mutation leaves the cache exactly as it was.
/// - A fetch that was already running when the cache got invalidated never
///   lands in it.
pub struct CachedRepository<R, T> {
    transport: Arc<T>,
    entry: RwLock<Option<CacheEntry<R>>>,
    /// Bumped under the entry write lock by every invalidation.
    generation: AtomicU64,
    max_age: Option<Duration>,
}

impl<R: Resource, T: JsonTransport> CachedRepository<R, T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            entry: RwLock::new(None),
            generation: AtomicU64::new(0),
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub async fn list(&self) -> Result<Vec<R>, ApiError> {
        {
            let guard = self.entry.read().await;
            if let Some(entry) = guard.as_ref() {
                if self.is_fresh(entry) {
                    return Ok(entry.items.clone());
                }
            }
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<Vec<R>, ApiError> {
        let generation = self.generation.load(Ordering::SeqCst);
        log_debug!("fetching /{}", R::COLLECTION);
        let items: Vec<R> = self.transport.get_json(R::COLLECTION).await?;

        let mut guard = self.entry.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            *guard = Some(CacheEntry {
                items: items.clone(),
                fetched_at: Instant::now(),
            });
        } else {
            log_debug!("dropping outdated /{} listing", R::COLLECTION);
        }
        Ok(items)
    }

    pub async fn get(&self, id: &str) -> Result<Option<R>, ApiError> {
        Ok(self.list().await?.into_iter().find(|item| item.id() == id))
    }

    /// Cached listing without touching the network.
    pub async fn cached(&self) -> Option<Vec<R>> {
        self.entry
            .read()
            .await
            .as_ref()
            .map(|entry| entry.items.clone())
    }

    pub async fn invalidate(&self) {
        let mut guard = self.entry.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *guard = None;
    }

    pub async fn create(&self, draft: &R::Draft) -> Result<(), ApiError> {
        self.transport.post_json(R::COLLECTION, draft).await?;
        self.after_mutation().await;
        Ok(())
    }

    pub async fn update(&self, id: &str, draft: &R::Draft) -> Result<(), ApiError> {
        self.transport
            .put_json(&item_path::<R>(id), draft)
            .await?;
        self.after_mutation().await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.transport.delete(&item_path::<R>(id)).await?;
        self.after_mutation().await;
        Ok(())
    }

    fn is_fresh(&self, entry: &CacheEntry<R>) -> bool {
        self.max_age
            .map_or(true, |max_age| entry.fetched_at.elapsed() < max_age)
    }

    /// The mutation already succeeded; a failed refetch only leaves the
    /// cache empty so the next `list()` tries again.
    async fn after_mutation(&self) {
        self.invalidate().await;
        if let Err(err) = self.refresh().await {
            log_warn!("refetch of /{} after mutation failed: {err}", R::COLLECTION);
        }
    }
}

fn item_path<R: Resource>(id: &str) -> String {
    format!("{}/{}", R::COLLECTION, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Stimulus, StimulusDraft};
    use serde_json::{json, Value};
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, AtomicU32, Ordering},
            Mutex,
        },
    };

    /// In-memory REST collection store.
    #[derive(Default)]
    struct MemoryTransport {
        collections: Mutex<HashMap<String, Vec<Value>>>,
        next_id: AtomicU32,
        gets: AtomicU32,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
        /// Latency applied to the next read only. The listing is captured
        /// before the wait.
        slow_next_read: Mutex<Option<Duration>>,
    }

    impl MemoryTransport {
        fn seeded(collection: &str, items: Vec<Value>) -> Self {
            let transport = Self::default();
            transport
                .collections
                .lock()
                .unwrap()
                .insert(collection.to_string(), items);
            transport.next_id.store(100, Ordering::SeqCst);
            transport
        }

        fn gets(&self) -> u32 {
            self.gets.load(Ordering::SeqCst)
        }

        fn write_guard(&self) -> Result<(), ApiError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(ApiError::Status {
                    status: 422,
                    body: "rejected".into(),
                })
            } else {
                Ok(())
            }
        }

        fn split(path: &str) -> (String, Option<String>) {
            match path.split_once('/') {
                Some((collection, id)) => (collection.to_string(), Some(id.to_string())),
                None => (path.to_string(), None),
            }
        }
    }

    impl JsonTransport for MemoryTransport {
        async fn get_json<T>(&self, path: &str) -> Result<T, ApiError>
        where
            T: DeserializeOwned + Send,
        {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".into()));
            }
            let items = self
                .collections
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_default();
            let delay = self.slow_next_read.lock().unwrap().take();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(serde_json::from_value(Value::Array(items))?)
        }

        async fn post_json<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
        where
            B: Serialize + Sync,
        {
            self.write_guard()?;
            let mut value = serde_json::to_value(body)?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            value["id"] = json!(id);
            self.collections
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .push(value);
            Ok(())
        }

        async fn put_json<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
        where
            B: Serialize + Sync,
        {
            self.write_guard()?;
            let (collection, id) = Self::split(path);
            let id = id.unwrap_or_default();
            let mut value = serde_json::to_value(body)?;
            value["id"] = json!(id);
            let mut collections = self.collections.lock().unwrap();
            let items = collections.entry(collection).or_default();
            for item in items.iter_mut() {
                if item["id"].to_string().trim_matches('"') == id {
                    *item = value.clone();
                }
            }
            Ok(())
        }

        async fn delete(&self, path: &str) -> Result<(), ApiError> {
            self.write_guard()?;
            let (collection, id) = Self::split(path);
            let id = id.unwrap_or_default();
            let mut collections = self.collections.lock().unwrap();
            if let Some(items) = collections.get_mut(&collection) {
                items.retain(|item| item["id"].to_string().trim_matches('"') != id);
            }
            Ok(())
        }
    }

    fn stimulus(id: u32, title: &str) -> Value {
        json!({"id": id, "title": title, "video_path": format!("videos/{id}.mp4")})
    }

    fn draft(title: &str) -> StimulusDraft {
        StimulusDraft {
            title: title.into(),
            description: None,
            video_path: "videos/new.mp4".into(),
            duration_secs: Some(30),
        }
    }

    fn repo(transport: &Arc<MemoryTransport>) -> CachedRepository<Stimulus, MemoryTransport> {
        CachedRepository::new(transport.clone())
    }

    #[tokio::test]
    async fn list_is_served_from_cache() {
        let transport = Arc::new(MemoryTransport::seeded(
            "stimuli",
            vec![stimulus(1, "Faces"), stimulus(2, "Toys")],
        ));
        let repo = repo(&transport);

        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert_eq!(transport.gets(), 1);

        let toys = repo.get("2").await.unwrap().unwrap();
        assert_eq!(toys.title, "Toys");
        assert!(repo.get("9").await.unwrap().is_none());
        assert_eq!(transport.gets(), 1);
    }

    #[tokio::test]
    async fn mutations_refetch() {
        let transport = Arc::new(MemoryTransport::seeded("stimuli", vec![stimulus(1, "Faces")]));
        let repo = repo(&transport);
        repo.list().await.unwrap();

        repo.create(&draft("Bubbles")).await.unwrap();
        assert_eq!(transport.gets(), 2);
        let titles: Vec<_> = repo
            .cached()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["Faces", "Bubbles"]);

        repo.update("1", &draft("Faces v2")).await.unwrap();
        assert_eq!(repo.get("1").await.unwrap().unwrap().title, "Faces v2");

        repo.delete("100").await.unwrap();
        assert_eq!(repo.cached().await.unwrap().len(), 1);
        assert_eq!(transport.gets(), 4);
    }

    #[tokio::test]
    async fn failed_mutation_keeps_cache() {
        let transport = Arc::new(MemoryTransport::seeded("stimuli", vec![stimulus(1, "Faces")]));
        let repo = repo(&transport);
        repo.list().await.unwrap();

        transport.fail_writes.store(true, Ordering::SeqCst);
        let err = repo.create(&draft("Bubbles")).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(repo.cached().await.unwrap().len(), 1);
        assert_eq!(transport.gets(), 1);
    }

    #[tokio::test]
    async fn failed_refetch_after_mutation_empties_cache() {
        let transport = Arc::new(MemoryTransport::seeded("stimuli", vec![stimulus(1, "Faces")]));
        let repo = repo(&transport);
        repo.list().await.unwrap();

        transport.fail_reads.store(true, Ordering::SeqCst);
        repo.delete("1").await.unwrap();
        assert!(repo.cached().await.is_none());

        transport.fail_reads.store(false, Ordering::SeqCst);
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn max_age_expires_entries() {
        let transport = Arc::new(MemoryTransport::seeded("stimuli", vec![stimulus(1, "Faces")]));
        let repo = repo(&transport).with_max_age(Duration::from_secs(60));

        repo.list().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        repo.list().await.unwrap();
        assert_eq!(transport.gets(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        repo.list().await.unwrap();
        assert_eq!(transport.gets(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_listing_does_not_overwrite_newer_refetch() {
        let transport = Arc::new(MemoryTransport::seeded("stimuli", vec![stimulus(1, "Faces")]));
        *transport.slow_next_read.lock().unwrap() = Some(Duration::from_secs(5));
        let repo = repo(&transport);

        let slow = repo.refresh();
        let mutate = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            repo.create(&draft("Bubbles")).await.unwrap();
        };
        let (slow, ()) = tokio::join!(slow, mutate);

        assert_eq!(slow.unwrap().len(), 1);
        assert_eq!(repo.cached().await.unwrap().len(), 2);
        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert_eq!(transport.gets(), 2);
    }
}
