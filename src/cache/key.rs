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


//! Canonical cache keys
//!
//! A key is the operation kind plus a deterministic serialization of the
//! parameters that change the response. Per-call metadata (request id, user
//! id) is left out, so identical queries share an entry.

use crate::models::{Pagination, SearchRequest};
use serde_json::json;
use std::fmt;

/// Operation kind, the first component of every key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    List,
    Detail,
    Search,
    ByCategory,
    ByLanguage,
    ByUploader,
    Popular,
    Count,
    Exists,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Detail => "detail",
            Self::Search => "search",
            Self::ByCategory => "by-category",
            Self::ByLanguage => "by-language",
            Self::ByUploader => "by-uploader",
            Self::Popular => "popular",
            Self::Count => "count",
            Self::Exists => "exists",
        }
    }

    pub fn segment(&self) -> Segment {
        match self {
            Self::List => Segment::Lists,
            Self::Detail => Segment::Details,
            Self::Search | Self::ByCategory | Self::ByLanguage | Self::ByUploader | Self::Popular => {
                Segment::Searches
            }
            Self::Count => Segment::Counts,
            Self::Exists => Segment::Existence,
        }
    }
}

/// Group of keys invalidated together by mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Lists,
    Details,
    Searches,
    Counts,
    Existence,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: QueryKind,
    params: String,
}

impl CacheKey {
    pub fn new<S: Into<String>>(kind: QueryKind, params: S) -> Self {
        Self {
            kind,
            params: params.into(),
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    pub fn segment(&self) -> Segment {
        self.kind.segment()
    }

    pub fn list(pagination: &Pagination) -> Self {
        Self::new(QueryKind::List, json!(pagination).to_string())
    }

    pub fn detail(id: &str) -> Self {
        Self::new(QueryKind::Detail, id)
    }

    /// Search key: pagination, filters and include flags only
    pub fn search(request: &SearchRequest) -> Self {
        Self::new(
            QueryKind::Search,
            json!({
                "pagination": request.pagination,
                "filters": request.filters,
                "includeDeleted": request.include_deleted,
                "includeAuthors": request.include_authors,
                "includeMetrics": request.include_metrics,
            })
            .to_string(),
        )
    }

    pub fn by_category(categories: &[String], pagination: &Pagination) -> Self {
        Self::new(
            QueryKind::ByCategory,
            json!({ "categories": categories, "pagination": pagination }).to_string(),
        )
    }

    pub fn by_language(language: &str, pagination: &Pagination) -> Self {
        Self::new(
            QueryKind::ByLanguage,
            json!({ "language": language, "pagination": pagination }).to_string(),
        )
    }

    pub fn by_uploader(uploaded_by: &str, pagination: &Pagination) -> Self {
        Self::new(
            QueryKind::ByUploader,
            json!({ "uploadedBy": uploaded_by, "pagination": pagination }).to_string(),
        )
    }

    pub fn popular(limit: u32) -> Self {
        Self::new(QueryKind::Popular, limit.to_string())
    }

    pub fn count() -> Self {
        Self::new(QueryKind::Count, "")
    }

    pub fn exists(id: &str) -> Self {
        Self::new(QueryKind::Exists, id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "books/{}", self.kind.as_str())
        } else {
            write!(f, "books/{}/{}", self.kind.as_str(), self.params)
        }
    }
}
