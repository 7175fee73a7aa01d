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


//! Query builder
//!
//! Turns partial UI input into a complete, immutable `SearchRequest`.
//! Filter values are not validated here; per-mode validation happens in
//! `search` before anything is built.

use crate::models::{Filters, PaginationPatch, SearchRequest};
use crate::storage::Session;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Length of the random request id suffix
const REQUEST_ID_SUFFIX_LEN: usize = 9;

/// Last timestamp handed out, so ids stay unique when the clock stalls
static LAST_REQUEST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Metadata flags attached to every search request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFlags {
    pub include_deleted: bool,
    pub include_authors: bool,
    pub include_metrics: bool,
}

impl Default for RequestFlags {
    fn default() -> Self {
        Self {
            include_deleted: false,
            include_authors: true,
            include_metrics: true,
        }
    }
}

/// Builds canonical search requests for the current session
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    session: Arc<Session>,
}

impl QueryBuilder {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Build a request with default metadata flags
    pub fn build(&self, filters: Filters, pagination: PaginationPatch) -> SearchRequest {
        self.build_with(filters, pagination, RequestFlags::default())
    }

    pub fn build_with(
        &self,
        filters: Filters,
        pagination: PaginationPatch,
        flags: RequestFlags,
    ) -> SearchRequest {
        SearchRequest {
            pagination: pagination.resolve(),
            filters,
            include_deleted: flags.include_deleted,
            include_authors: flags.include_authors,
            include_metrics: flags.include_metrics,
            user_id: self.session.user_id(),
            request_id: generate_request_id(),
        }
    }
}

/// `req-<millis>-<random suffix>`
///
/// The millisecond component is strictly increasing within the process, so
/// two ids never share it even if the clock reads the same value twice.
pub fn generate_request_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_REQUEST_MILLIS.load(Ordering::Relaxed);
    let millis = loop {
        let candidate = now.max(last + 1);
        match LAST_REQUEST_MILLIS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => last = actual,
        }
    };

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REQUEST_ID_SUFFIX_LEN)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();

    format!("req-{}-{}", millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortDirection;
    use regex::Regex;
    use std::collections::HashSet;

    fn builder() -> QueryBuilder {
        QueryBuilder::new(Arc::new(Session::anonymous()))
    }

    #[test]
    fn test_defaults_filled() {
        let request = builder().build(Filters::default(), PaginationPatch::default());

        assert_eq!(request.pagination.page, 0);
        assert_eq!(request.pagination.size, 20);
        assert_eq!(request.pagination.sort_by, "createdAt");
        assert_eq!(request.pagination.sort_direction, SortDirection::Desc);
        assert!(!request.include_deleted);
        assert!(request.include_authors);
        assert!(request.include_metrics);
        assert_eq!(request.user_id, "anonymous");
    }

    #[test]
    fn test_overrides_kept() {
        let request = builder().build(
            Filters::query("dune"),
            PaginationPatch::page(3, 8).sorted_by("title", SortDirection::Asc),
        );

        assert_eq!(request.pagination.page, 3);
        assert_eq!(request.pagination.size, 8);
        assert_eq!(request.pagination.sort_by, "title");
        assert_eq!(request.pagination.sort_direction, SortDirection::Asc);
        assert_eq!(request.filters.search_query.as_deref(), Some("dune"));
    }

    #[test]
    fn test_user_id_from_session() {
        let session = Arc::new(Session::new(None, Some("reader-9".to_string())));
        let request = QueryBuilder::new(session).build(Filters::default(), PaginationPatch::default());
        assert_eq!(request.user_id, "reader-9");
    }

    #[test]
    fn test_request_id_format() {
        let pattern = Regex::new(r"^req-\d+-[a-z0-9]{9}$").unwrap();
        let id = generate_request_id();
        assert!(pattern.is_match(&id), "unexpected request id {}", id);
    }

    #[test]
    fn test_request_ids_unique_in_tight_loop() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_request_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
