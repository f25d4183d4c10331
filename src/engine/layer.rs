//! Cache layer over a fixed fetcher.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::engine::{ColdStorage, Converter, Delivery};
use crate::error::Result;

/// Produces the serialized value for a key on a cache miss.
///
/// Runs on a worker pool thread, so blocking I/O is fine here. `Ok(None)`
/// and `Err` both mean "no value"; neither is cached.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, key: &str) -> anyhow::Result<Option<String>>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
{
    fn fetch(&self, key: &str) -> anyhow::Result<Option<String>> {
        self(key)
    }
}

/// A [`ColdStorage`] handle bound to one [`Fetcher`], for services that
/// always populate the same way.
pub struct CacheLayer<F: Fetcher> {
    cache: ColdStorage,
    fetcher: Arc<F>,
}

impl<F: Fetcher> Clone for CacheLayer<F> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

impl<F: Fetcher> CacheLayer<F> {
    /// # Arguments
    /// * `cache` - Engine the layer reads from and populates
    /// * `fetcher` - Source consulted on a miss or stale entry
    pub fn new(cache: ColdStorage, fetcher: F) -> Self {
        Self {
            cache,
            fetcher: Arc::new(fetcher),
        }
    }

    /// The underlying engine handle.
    pub fn cache(&self) -> &ColdStorage {
        &self.cache
    }

    /// See [`ColdStorage::get`].
    pub fn get<CB>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        callback: CB,
    ) -> Result<JoinHandle<()>>
    where
        CB: FnOnce(Option<String>) + Send + 'static,
    {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.get(key, time_to_live, move |key| fetcher.fetch(key), callback)
    }

    /// See [`ColdStorage::get_converted`].
    pub fn get_converted<T, C, CB>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        converter: C,
        callback: CB,
    ) -> Result<JoinHandle<()>>
    where
        T: 'static,
        C: Converter<T> + 'static,
        CB: FnOnce(Option<T>) + Send + 'static,
    {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.get_converted(
            key,
            time_to_live,
            move |key| fetcher.fetch(key),
            converter,
            callback,
        )
    }

    /// See [`ColdStorage::fetch`].
    pub fn fetch(&self, key: impl Into<String>, time_to_live: Option<u64>) -> Delivery<String> {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.fetch(key, time_to_live, move |key| fetcher.fetch(key))
    }

    /// See [`ColdStorage::fetch_converted`].
    pub fn fetch_converted<T, C>(
        &self,
        key: impl Into<String>,
        time_to_live: Option<u64>,
        converter: C,
    ) -> Delivery<T>
    where
        T: Send + 'static,
        C: Converter<T> + 'static,
    {
        let fetcher = Arc::clone(&self.fetcher);
        self.cache
            .fetch_converted(key, time_to_live, move |key| fetcher.fetch(key), converter)
    }

    /// See [`ColdStorage::get_without_update`].
    pub fn get_without_update(&self, key: &str) -> Option<String> {
        self.cache.get_without_update(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::JsonConverter;
    use crate::persistence::MemoryBlobStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("[\"{key}\"]")))
        }
    }

    fn cache() -> ColdStorage {
        ColdStorage::initialize(Config::default(), Arc::new(MemoryBlobStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_layer_fetches_once_per_key() {
        let layer = CacheLayer::new(cache(), CountingFetcher::default());

        assert_eq!(layer.fetch("a", None).await.as_deref(), Some("[\"a\"]"));
        assert_eq!(layer.fetch("a", None).await.as_deref(), Some("[\"a\"]"));
        assert_eq!(layer.fetch("b", None).await.as_deref(), Some("[\"b\"]"));

        assert_eq!(layer.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(layer.get_without_update("b").as_deref(), Some("[\"b\"]"));
    }

    #[tokio::test]
    async fn test_layer_with_closure_fetcher_and_converter() {
        let layer = CacheLayer::new(cache(), |key: &str| -> anyhow::Result<Option<String>> {
            Ok(Some(format!("[\"{key}\", \"{key}\"]")))
        });

        let items = layer
            .fetch_converted("x", None, JsonConverter::<Vec<String>>::new())
            .await;
        assert_eq!(items, Some(vec!["x".to_string(), "x".to_string()]));
        assert!(layer.cache().contains_key("x"));
    }
}
