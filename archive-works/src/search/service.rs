//! External search-index seam and the optional result cache
//!
//! The index is an external service: this module only compiles queries into
//! requests and interprets ranked results plus facet counts. The cache is a
//! side-effect-free speed-up for the first few result pages; every path is
//! correct with the cache entirely absent.

use std::sync::Arc;
use std::time::Duration;

use archive_common::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::search::query::SearchQuery;

/// A single ranked result from the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkHit {
    pub work_id: Uuid,
    pub title: String,
    pub posted: bool,
}

/// Aggregated count breakdown by one dimension (fandom, rating, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub dimension: String,
    pub counts: Vec<(String, u64)>,
}

/// Ranked results plus facet counts, as returned by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<WorkHit>,
    pub total: u64,
    pub facets: Vec<Facet>,
}

/// The external search/index service
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Run a compiled query and return ranked results with facets
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults>;

    /// Queue works for reindexing
    async fn queue_reindex(&self, work_ids: &[Uuid]) -> Result<()>;
}

/// External key-value cache with TTL for computed result pages
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<SearchResults>;
    async fn put(&self, key: &str, results: &SearchResults, ttl: Duration);
}

/// HTTP client for a search-index service speaking JSON
pub struct HttpSearchIndex {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSearchIndex {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn classify(context: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(format!("{}: {}", context, err))
        } else {
            Error::Internal(format!("{}: {}", context, err))
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|e| Self::classify("search request failed", e))?;

        response
            .error_for_status()
            .map_err(|e| Error::Internal(format!("search index rejected query: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Internal(format!("search response malformed: {}", e)))
    }

    async fn queue_reindex(&self, work_ids: &[Uuid]) -> Result<()> {
        let url = format!("{}/reindex", self.base_url);
        self.client
            .post(&url)
            .json(&work_ids)
            .send()
            .await
            .map_err(|e| Self::classify("reindex request failed", e))?
            .error_for_status()
            .map_err(|e| Error::Internal(format!("reindex rejected: {}", e)))?;
        Ok(())
    }
}

/// In-memory `ResultCache` with per-entry expiry
///
/// Stands in for the deployment's external cache in development and tests.
pub struct MemoryCache {
    entries: tokio::sync::RwLock<std::collections::HashMap<String, (std::time::Instant, SearchResults)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<SearchResults> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((expires_at, results)) if *expires_at > std::time::Instant::now() => {
                Some(results.clone())
            }
            _ => None,
        }
    }

    async fn put(&self, key: &str, results: &SearchResults, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (std::time::Instant::now() + ttl, results.clone()));
    }
}

/// Search front-end combining the index with the optional read-through cache
pub struct SearchService {
    index: Arc<dyn SearchIndex>,
    cache: Option<Arc<dyn ResultCache>>,
    pages_to_cache: u32,
    cache_ttl: Duration,
}

impl SearchService {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        cache: Option<Arc<dyn ResultCache>>,
        pages_to_cache: u32,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            index,
            cache,
            pages_to_cache,
            cache_ttl,
        }
    }

    /// Run a query, consulting the cache only for the first few pages
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        let cacheable = query.page <= self.pages_to_cache;
        let key = cacheable.then(|| Self::cache_key(query)).flatten();

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key).await {
                tracing::debug!(page = query.page, "search cache hit");
                return Ok(hit);
            }
        }

        let results = self.index.search(query).await?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            cache.put(key, &results, self.cache_ttl).await;
        }

        Ok(results)
    }

    pub async fn queue_reindex(&self, work_ids: &[Uuid]) -> Result<()> {
        self.index.queue_reindex(work_ids).await
    }

    fn cache_key(query: &SearchQuery) -> Option<String> {
        serde_json::to_string(query)
            .ok()
            .map(|body| format!("works/search/{}", body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIndex {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchIndex for CountingIndex {
        async fn search(&self, _query: &SearchQuery) -> Result<SearchResults> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResults {
                items: vec![],
                total: 0,
                facets: vec![],
            })
        }

        async fn queue_reindex(&self, _work_ids: &[Uuid]) -> Result<()> {
            Ok(())
        }
    }

    fn empty_query(page: u32) -> SearchQuery {
        let (mut query, _) =
            crate::search::normalizer::normalize(None, &crate::search::query::SearchParams::default());
        query.page = page;
        query
    }

    #[tokio::test]
    async fn early_pages_are_served_from_cache_on_repeat() {
        let index = Arc::new(CountingIndex {
            calls: AtomicUsize::new(0),
        });
        let service = SearchService::new(
            index.clone(),
            Some(Arc::new(MemoryCache::new())),
            5,
            Duration::from_secs(60),
        );

        let query = empty_query(1);
        service.search(&query).await.unwrap();
        service.search(&query).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn late_pages_bypass_the_cache() {
        let index = Arc::new(CountingIndex {
            calls: AtomicUsize::new(0),
        });
        let service = SearchService::new(
            index.clone(),
            Some(Arc::new(MemoryCache::new())),
            5,
            Duration::from_secs(60),
        );

        let query = empty_query(6);
        service.search(&query).await.unwrap();
        service.search(&query).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn absent_cache_is_still_correct() {
        let index = Arc::new(CountingIndex {
            calls: AtomicUsize::new(0),
        });
        let service = SearchService::new(index.clone(), None, 5, Duration::from_secs(60));

        let query = empty_query(1);
        let results = service.search(&query).await.unwrap();
        assert_eq!(results.total, 0);
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }
}
