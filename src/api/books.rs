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


//! Typed book service endpoints
//!
//! Thin wrappers over `HttpTransport` mapping each backend route to a typed
//! call. No caching and no retries happen here.
//!
//! # Endpoints
//! - `POST   /books`                 create
//! - `GET    /books`                 list (array or envelope, normalized)
//! - `GET    /books/{id}`            detail, 404 on missing
//! - `PUT    /books/{id}`            partial update
//! - `DELETE /books/{id}`            delete
//! - `GET    /books/count`           bare number
//! - `GET    /books/{id}/exists`     bare boolean
//! - `POST   /search`                free-text search
//! - `POST   /search/by-category`    categories query param
//! - `POST   /search/by-language`    language query param
//! - `POST   /search/by-uploader`    uploadedBy query param

use crate::api::client::{ApiRequest, HttpTransport};
use crate::api::normalize::{normalize_list, normalize_page, Normalized};
use crate::error::{CatalogError, Result};
use crate::models::{Book, BookCreate, BookUpdate, Pagination, SearchRequest};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Typed access to the book service
#[derive(Clone)]
pub struct BookApi {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for BookApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookApi").finish_non_exhaustive()
    }
}

impl BookApi {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Create a book; the response is the full server record
    pub async fn create_book(&self, data: &BookCreate) -> Result<Book> {
        let request = ApiRequest::post("/books").with_body(serde_json::to_value(data)?);
        let raw = self.transport.send(request).await?;
        decode(raw, "created book")
    }

    /// List books, normalizing whichever shape the backend returned
    pub async fn list_books(&self, pagination: &Pagination) -> Result<Normalized<Book>> {
        let request = ApiRequest::get("/books").with_query(pagination.query_pairs());
        let raw = self.transport.send(request).await?;
        Ok(normalize_list(raw, pagination))
    }

    /// Fetch one book; a 404 becomes `CatalogError::NotFound`
    pub async fn get_book(&self, id: &str) -> Result<Book> {
        let request = ApiRequest::get(book_path(id));
        let raw = self
            .transport
            .send(request)
            .await
            .map_err(|e| not_found_as(e, id))?;
        decode(raw, "book")
    }

    /// Apply a partial update; the response is the full server record
    pub async fn update_book(&self, id: &str, data: &BookUpdate) -> Result<Book> {
        let request = ApiRequest::put(book_path(id)).with_body(serde_json::to_value(data)?);
        let raw = self
            .transport
            .send(request)
            .await
            .map_err(|e| not_found_as(e, id))?;
        decode(raw, "updated book")
    }

    pub async fn delete_book(&self, id: &str) -> Result<()> {
        let request = ApiRequest::delete(book_path(id));
        self.transport
            .send(request)
            .await
            .map_err(|e| not_found_as(e, id))?;
        Ok(())
    }

    /// Total number of books
    ///
    /// When `/books/count` is unavailable the full list is fetched and
    /// counted instead. That fallback downloads the whole catalog.
    pub async fn total_count(&self) -> Result<u64> {
        match self.transport.send(ApiRequest::get("/books/count")).await {
            Ok(raw) => decode::<u64>(raw, "book count"),
            Err(e) => {
                warn!(error = %e, "Count endpoint unavailable, counting the full list instead");
                let raw = self.transport.send(ApiRequest::get("/books")).await?;
                Ok(count_collection(&raw))
            }
        }
    }

    pub async fn book_exists(&self, id: &str) -> Result<bool> {
        let request = ApiRequest::get(format!("{}/exists", book_path(id)));
        let raw = self.transport.send(request).await?;
        decode(raw, "existence flag")
    }

    /// Free-text search
    pub async fn search(&self, search: &SearchRequest) -> Result<Normalized<Book>> {
        debug!(request_id = %search.request_id, "Searching books");
        let request = ApiRequest::post("/search").with_body(search.to_search_body()?);
        let raw = self.transport.send(request).await?;
        Ok(normalize_page(raw, &search.pagination))
    }

    /// Books in any of the given categories
    pub async fn search_by_category(
        &self,
        categories: &[String],
        pagination: &Pagination,
    ) -> Result<Normalized<Book>> {
        self.search_by_param("/search/by-category", "categories", &categories.join(","), pagination)
            .await
    }

    pub async fn search_by_language(
        &self,
        language: &str,
        pagination: &Pagination,
    ) -> Result<Normalized<Book>> {
        self.search_by_param("/search/by-language", "language", language, pagination)
            .await
    }

    pub async fn search_by_uploader(
        &self,
        uploaded_by: &str,
        pagination: &Pagination,
    ) -> Result<Normalized<Book>> {
        self.search_by_param("/search/by-uploader", "uploadedBy", uploaded_by, pagination)
            .await
    }

    /// POST with filter + pagination as query params and an empty body
    async fn search_by_param(
        &self,
        path: &str,
        key: &str,
        value: &str,
        pagination: &Pagination,
    ) -> Result<Normalized<Book>> {
        let request = ApiRequest::post(path)
            .with_query([(key.to_string(), value.to_string())])
            .with_query(pagination.query_pairs())
            .with_body(json!({}));
        let raw = self.transport.send(request).await?;
        Ok(normalize_page(raw, pagination))
    }
}

fn book_path(id: &str) -> String {
    format!("/books/{}", urlencoding::encode(id))
}

fn decode<T: DeserializeOwned>(raw: Value, what: &str) -> Result<T> {
    serde_json::from_value(raw)
        .map_err(|e| CatalogError::integrity(format!("Unexpected {} payload: {}", what, e)))
}

fn not_found_as(err: CatalogError, id: &str) -> CatalogError {
    if err.is_not_found() {
        CatalogError::not_found(format!("book {}", id))
    } else {
        err
    }
}

/// Element count of a list response of either shape
fn count_collection(raw: &Value) -> u64 {
    match raw {
        Value::Array(items) => items.len() as u64,
        Value::Object(map) => map
            .get("totalElements")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        _ => 0,
    }
}
