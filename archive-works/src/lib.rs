//! Works service library interface
//!
//! Exposes the query normalizer, the posting workflow engine and the HTTP
//! surface for integration testing.

pub mod api;
pub mod context;
pub mod db;
pub mod error;
pub mod import;
pub mod notify;
pub mod search;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Duration;

use archive_common::config::TomlConfig;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::WorkStore;
use crate::import::{HttpStoryFetcher, Importer, StoryFetcher};
use crate::notify::{InviteNotifier, LoggingNotifier};
use crate::search::service::{HttpSearchIndex, MemoryCache, ResultCache, SearchIndex};
use crate::search::SearchService;
use crate::workflow::WorkflowEngine;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkStore>,
    pub engine: Arc<WorkflowEngine>,
    pub search: Arc<SearchService>,
    pub importer: Arc<Importer>,
}

impl AppState {
    /// Wire the state from configuration with the default HTTP index,
    /// in-memory cache and logging notifier
    pub fn from_config(store: Arc<dyn WorkStore>, config: &TomlConfig) -> Self {
        let index: Arc<dyn SearchIndex> =
            Arc::new(HttpSearchIndex::new(config.search_index_url.clone()));
        let cache: Arc<dyn ResultCache> = Arc::new(MemoryCache::new());
        let fetcher: Arc<dyn StoryFetcher> = Arc::new(HttpStoryFetcher::new(
            Duration::from_secs(config.import_timeout_secs),
        ));
        let notifier: Arc<dyn InviteNotifier> = Arc::new(LoggingNotifier);
        Self::new(store, index, Some(cache), fetcher, notifier, config)
    }

    /// Wire the state from explicit collaborators; tests swap in stubs here
    pub fn new(
        store: Arc<dyn WorkStore>,
        index: Arc<dyn SearchIndex>,
        cache: Option<Arc<dyn ResultCache>>,
        fetcher: Arc<dyn StoryFetcher>,
        notifier: Arc<dyn InviteNotifier>,
        config: &TomlConfig,
    ) -> Self {
        let search = Arc::new(SearchService::new(
            index,
            cache,
            config.pages_to_cache,
            Duration::from_secs(config.cache_ttl_secs),
        ));
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            config.draft_expiry_days,
        ));
        let importer = Arc::new(Importer::new(store.clone(), fetcher, notifier, config));
        Self {
            store,
            engine,
            search,
            importer,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::search_routes())
        .merge(api::work_routes())
        .merge(api::import_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
