// ReadHub Core - Book catalog client data layer
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Catalog facade
//!
//! The operations a UI consumes: cached reads keyed per operation, the four
//! search modes, and mutations that keep the cache consistent.
//!
//! # Mutation effects
//! - create: invalidate lists and counts, seed detail and existence for the new id
//! - update: replace the detail entry, invalidate lists
//! - delete: remove detail and existence entries, invalidate lists and counts
//!
//! Every mutation outcome is published as a `CatalogEvent`.
//!
//! # Usage Example
//! ```no_run
//! use readhub_core::catalog::Catalog;
//! use readhub_core::config::ClientConfig;
//! use readhub_core::models::PaginationPatch;
//! use readhub_core::storage::Session;
//! use std::sync::Arc;
//!
//! # async fn example() -> readhub_core::error::Result<()> {
//! let catalog = Catalog::from_config(&ClientConfig::from_env()?, Arc::new(Session::anonymous()))?;
//! let page = catalog.list_books(PaginationPatch::default()).await;
//! if let Some(page) = page.data {
//!     println!("{} books", page.total_elements);
//! }
//! # Ok(())
//! # }
//! ```

use crate::api::{BookApi, HttpClient, HttpTransport, Normalized};
use crate::cache::{CacheEffect, CacheKey, CachedResult, QueryCache, QueryPolicy, Segment};
use crate::config::ClientConfig;
use crate::error::{CatalogError, Result};
use crate::events::{publish, CatalogEvent, MutationKind, EVENT_CHANNEL_CAPACITY};
use crate::models::{
    Book, BookCreate, BookUpdate, Filters, PaginatedResult, PaginationPatch, SearchRequest,
    SortDirection,
};
use crate::query::{generate_request_id, QueryBuilder};
use crate::search::{resolve, Resolution, SearchMode, SearchTarget, SearchTicket};
use crate::storage::Session;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Minimum average rating for the popular shelf
pub const POPULAR_MIN_RATING: f64 = 4.0;

/// Sort field for the popular shelf
pub const POPULAR_SORT_BY: &str = "downloadCount";

pub type BookPage = PaginatedResult<Book>;

#[derive(Debug, Clone)]
pub struct Catalog {
    api: BookApi,
    cache: QueryCache,
    queries: QueryBuilder,
    events: broadcast::Sender<CatalogEvent>,
}

impl Catalog {
    pub fn new(transport: Arc<dyn HttpTransport>, session: Arc<Session>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api: BookApi::new(transport),
            cache: QueryCache::new(),
            queries: QueryBuilder::new(session),
            events,
        }
    }

    /// Catalog over the reqwest-backed client
    pub fn from_config(config: &ClientConfig, session: Arc<Session>) -> Result<Self> {
        let client = HttpClient::with_config(config, session.clone())?;
        Ok(Self::new(Arc::new(client), session))
    }

    pub fn api(&self) -> &BookApi {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.queries
    }

    /// Mutation notifications and integrity warnings
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn list_books(&self, pagination: PaginationPatch) -> CachedResult<BookPage> {
        let pagination = pagination.resolve();
        let key = CacheKey::list(&pagination);
        self.cached_page(key, QueryPolicy::LIST, "list", move |api| {
            let pagination = pagination.clone();
            async move { api.list_books(&pagination).await }
        })
        .await
    }

    /// Newest books first
    pub async fn recent_books(&self, limit: u32) -> CachedResult<BookPage> {
        self.list_books(PaginationPatch::page(0, limit).sorted_by("createdAt", SortDirection::Desc))
            .await
    }

    /// Detail by id; an empty id is idle
    pub async fn book(&self, id: &str) -> CachedResult<Book> {
        if id.is_empty() {
            return CachedResult::idle();
        }
        let api = self.api.clone();
        let id = id.to_string();
        self.cache
            .query(CacheKey::detail(&id), QueryPolicy::DETAIL, move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.get_book(&id).await }
            })
            .await
    }

    /// Free-text search with a prebuilt request
    ///
    /// Each network attempt gets a fresh request id.
    pub async fn search(&self, request: &SearchRequest) -> CachedResult<BookPage> {
        let key = CacheKey::search(request);
        let request = request.clone();
        self.cached_page(key, QueryPolicy::SEARCH, "search", move |api| {
            let mut request = request.clone();
            request.request_id = generate_request_id();
            async move { api.search(&request).await }
        })
        .await
    }

    pub async fn search_text(&self, query: &str, pagination: PaginationPatch) -> CachedResult<BookPage> {
        let request = self.queries.build(Filters::query(query), pagination);
        self.search(&request).await
    }

    pub async fn books_by_category(
        &self,
        categories: &[String],
        pagination: PaginationPatch,
    ) -> CachedResult<BookPage> {
        let pagination = pagination.resolve();
        let key = CacheKey::by_category(categories, &pagination);
        let categories = categories.to_vec();
        self.cached_page(key, QueryPolicy::SEARCH, "by-category", move |api| {
            let categories = categories.clone();
            let pagination = pagination.clone();
            async move { api.search_by_category(&categories, &pagination).await }
        })
        .await
    }

    pub async fn books_by_language(&self, language: &str, pagination: PaginationPatch) -> CachedResult<BookPage> {
        let pagination = pagination.resolve();
        let key = CacheKey::by_language(language, &pagination);
        let language = language.to_string();
        self.cached_page(key, QueryPolicy::SEARCH, "by-language", move |api| {
            let language = language.clone();
            let pagination = pagination.clone();
            async move { api.search_by_language(&language, &pagination).await }
        })
        .await
    }

    pub async fn books_by_uploader(&self, uploader: &str, pagination: PaginationPatch) -> CachedResult<BookPage> {
        if uploader.is_empty() {
            return CachedResult::idle();
        }
        let pagination = pagination.resolve();
        let key = CacheKey::by_uploader(uploader, &pagination);
        let uploader = uploader.to_string();
        self.cached_page(key, QueryPolicy::SEARCH, "by-uploader", move |api| {
            let uploader = uploader.clone();
            let pagination = pagination.clone();
            async move { api.search_by_uploader(&uploader, &pagination).await }
        })
        .await
    }

    /// Highly rated books, most downloaded first
    pub async fn popular_books(&self, limit: u32) -> CachedResult<BookPage> {
        let filters = Filters {
            min_rating: Some(POPULAR_MIN_RATING),
            ..Filters::default()
        };
        let pagination = PaginationPatch::page(0, limit).sorted_by(POPULAR_SORT_BY, SortDirection::Desc);
        let queries = self.queries.clone();
        self.cached_page(CacheKey::popular(limit), QueryPolicy::POPULAR, "popular", move |api| {
            let request = queries.build(filters.clone(), pagination.clone());
            async move { api.search(&request).await }
        })
        .await
    }

    pub async fn count(&self) -> CachedResult<u64> {
        let api = self.api.clone();
        self.cache
            .query(CacheKey::count(), QueryPolicy::COUNT, move || {
                let api = api.clone();
                async move { api.total_count().await }
            })
            .await
    }

    pub async fn exists(&self, id: &str) -> CachedResult<bool> {
        if id.is_empty() {
            return CachedResult::idle();
        }
        let api = self.api.clone();
        let id = id.to_string();
        self.cache
            .query(CacheKey::exists(&id), QueryPolicy::EXISTS, move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.book_exists(&id).await }
            })
            .await
    }

    // ========================================================================
    // Search modes
    // ========================================================================

    /// Resolve raw input in `mode` and run it; rejected input is idle
    pub async fn search_mode(&self, mode: SearchMode, raw: &str, pagination: PaginationPatch) -> CachedResult<BookPage> {
        match resolve(mode, raw) {
            Resolution::Idle => CachedResult::idle(),
            Resolution::Dispatch(target) => self.dispatch(&target, pagination).await,
        }
    }

    pub async fn run_search(&self, ticket: &SearchTicket) -> CachedResult<BookPage> {
        self.dispatch(&ticket.target, ticket.pagination.clone()).await
    }

    /// Route a validated target to its endpoint
    ///
    /// An id lookup is presented as a page holding that one book.
    pub async fn dispatch(&self, target: &SearchTarget, pagination: PaginationPatch) -> CachedResult<BookPage> {
        match target {
            SearchTarget::Text(query) => self.search_text(query, pagination).await,
            SearchTarget::Id(id) => {
                let size = pagination.resolve().size;
                self.book(id)
                    .await
                    .map(|book| PaginatedResult::from_parts(vec![book], 0, size, 1))
            }
            SearchTarget::Categories(categories) => self.books_by_category(categories, pagination).await,
            SearchTarget::Language(language) => self.books_by_language(language, pagination).await,
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a book and seed its detail entry from the response
    pub async fn create_book(&self, data: BookCreate) -> Result<Book> {
        data.validate()?;

        let api = self.api.clone();
        let result = self
            .cache
            .mutate(
                || {
                    let api = api.clone();
                    let data = data.clone();
                    async move { api.create_book(&data).await }
                },
                |book: &Book| {
                    vec![
                        CacheEffect::Invalidate(Segment::Lists),
                        CacheEffect::Invalidate(Segment::Counts),
                        CacheEffect::seed(CacheKey::detail(&book.id), book.clone(), QueryPolicy::DETAIL),
                        CacheEffect::seed(CacheKey::exists(&book.id), true, QueryPolicy::EXISTS),
                    ]
                },
            )
            .await;

        self.report(MutationKind::Create, &result);
        result
    }

    /// Apply a partial update and replace the cached detail in place
    pub async fn update_book(&self, id: &str, data: BookUpdate) -> Result<Book> {
        if data.is_empty() {
            return Err(CatalogError::validation("Nothing to update"));
        }

        let previous: Option<Book> = self.cache.get(&CacheKey::detail(id));
        let api = self.api.clone();
        let book_id = id.to_string();
        let result = self
            .cache
            .mutate(
                || {
                    let api = api.clone();
                    let id = book_id.clone();
                    let data = data.clone();
                    async move { api.update_book(&id, &data).await }
                },
                |book: &Book| {
                    vec![
                        CacheEffect::seed(CacheKey::detail(&book.id), book.clone(), QueryPolicy::DETAIL),
                        CacheEffect::Invalidate(Segment::Lists),
                    ]
                },
            )
            .await;

        if let (Ok(book), Some(previous)) = (&result, &previous) {
            if let Err(issue) = previous.check_successor(book) {
                warn!(id = %book.id, error = %issue, "Update response is not a valid successor");
                self.integrity_warning("update", &issue);
            }
        }

        self.report(MutationKind::Update, &result);
        result
    }

    /// Delete a book and drop every entry addressing it
    pub async fn delete_book(&self, id: &str) -> Result<()> {
        let api = self.api.clone();
        let book_id = id.to_string();
        let result = self
            .cache
            .mutate(
                || {
                    let api = api.clone();
                    let id = book_id.clone();
                    async move { api.delete_book(&id).await }
                },
                |_| {
                    vec![
                        CacheEffect::Remove(CacheKey::detail(id)),
                        CacheEffect::Remove(CacheKey::exists(id)),
                        CacheEffect::Invalidate(Segment::Lists),
                        CacheEffect::Invalidate(Segment::Counts),
                    ]
                },
            )
            .await;

        self.report(MutationKind::Delete, &result);
        result
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn cached_page<F, Fut>(
        &self,
        key: CacheKey,
        policy: QueryPolicy,
        operation: &'static str,
        fetch: F,
    ) -> CachedResult<BookPage>
    where
        F: Fn(BookApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Normalized<Book>>> + Send + 'static,
    {
        let api = self.api.clone();
        let events = self.events.clone();
        self.cache
            .query(key, policy, move || {
                let pending = fetch(api.clone());
                let events = events.clone();
                async move {
                    let normalized = pending.await?;
                    if let Some(issue) = &normalized.issue {
                        publish(
                            &events,
                            CatalogEvent::IntegrityWarning {
                                operation: operation.to_string(),
                                message: issue.to_string(),
                            },
                        );
                    }
                    Ok(normalized.page)
                }
            })
            .await
    }

    fn integrity_warning(&self, operation: &str, issue: &CatalogError) {
        publish(
            &self.events,
            CatalogEvent::IntegrityWarning {
                operation: operation.to_string(),
                message: issue.to_string(),
            },
        );
    }

    fn report<T>(&self, operation: MutationKind, result: &Result<T>) {
        match result {
            Ok(_) => {
                info!(operation = %operation, "Mutation succeeded");
                publish(&self.events, CatalogEvent::succeeded(operation));
            }
            Err(e) => {
                warn!(operation = %operation, error = %e, "Mutation failed");
                publish(&self.events, CatalogEvent::failed(operation, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiRequest;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Answers every request with the same value and records the paths
    struct FixedTransport {
        reply: Value,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value> {
            self.seen.lock().unwrap().push(request.path);
            Ok(self.reply.clone())
        }
    }

    fn catalog(reply: Value) -> (Catalog, Arc<FixedTransport>) {
        let transport = Arc::new(FixedTransport {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        (Catalog::new(transport.clone(), Arc::new(Session::anonymous())), transport)
    }

    #[tokio::test]
    async fn test_empty_id_is_idle() {
        let (catalog, transport) = catalog(json!({}));
        assert!(catalog.book("").await.is_idle());
        assert!(catalog.exists("").await.is_idle());
        assert!(catalog.books_by_uploader("", PaginationPatch::default()).await.is_idle());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_popular_books_query_shape() {
        let (catalog, transport) = catalog(json!([]));
        let result = catalog.popular_books(10).await;
        assert!(result.is_success());
        assert_eq!(*transport.seen.lock().unwrap(), vec!["/search".to_string()]);

        catalog.popular_books(10).await;
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_page_publishes_integrity_warning() {
        let (catalog, _) = catalog(json!({ "unexpected": true }));
        let mut events = catalog.subscribe();

        let result = catalog.list_books(PaginationPatch::default()).await;
        assert!(result.data.unwrap().empty);

        match events.try_recv() {
            Ok(CatalogEvent::IntegrityWarning { operation, .. }) => assert_eq!(operation, "list"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_create_is_rejected_before_dispatch() {
        let (catalog, transport) = catalog(json!({}));
        let err = catalog
            .create_book(BookCreate::new("", "en").with_author("Someone"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected() {
        let (catalog, transport) = catalog(json!({}));
        assert!(catalog.update_book("b1", BookUpdate::default()).await.is_err());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_id_target_wraps_single_book() {
        let id = "507f1f77bcf86cd799439011";
        let (catalog, _) = catalog(json!({ "id": id, "title": "Clean Code", "version": 1 }));

        let page = catalog
            .search_mode(SearchMode::Id, id, PaginationPatch::default())
            .await
            .data
            .unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total_elements, 1);
        assert!(page.first && page.last);
        assert!(page.check_invariants().is_ok());
    }
}
