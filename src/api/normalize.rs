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


//! Response normalization for list-shaped endpoints
//!
//! The list endpoint has been seen returning either a bare array of books or a
//! paginated envelope. This is the one place that difference is absorbed:
//! callers always get a `PaginatedResult`.
//!
//! Detection is an explicit tagged-union decode: try the envelope first, fall
//! back to the array. A bare array is treated as the full unfiltered
//! collection and sliced client-side. An envelope is passed through after its
//! invariants are checked. Anything malformed degrades to an empty page and
//! the problem is reported alongside it rather than raised.

use crate::error::CatalogError;
use crate::models::{Book, PaginatedResult, Pagination};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// A normalized page plus any integrity problem found on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub page: PaginatedResult<T>,
    /// Set when the raw response was unusable and `page` is a degraded empty page
    pub issue: Option<CatalogError>,
}

impl<T> Normalized<T> {
    fn ok(page: PaginatedResult<T>) -> Self {
        Self { page, issue: None }
    }

    fn degraded(pagination: &Pagination, issue: CatalogError) -> Self {
        Self {
            page: PaginatedResult::empty_page(pagination.page, pagination.size),
            issue: Some(issue),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.issue.is_some()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Envelope(PaginatedResult<T>),
    Array(Vec<T>),
}

/// Normalize a raw list response of books
pub fn normalize_list(raw: Value, pagination: &Pagination) -> Normalized<Book> {
    normalize_page(raw, pagination)
}

/// Normalize any list-shaped response
pub fn normalize_page<T: DeserializeOwned>(raw: Value, pagination: &Pagination) -> Normalized<T> {
    // An empty body is an empty collection
    if raw.is_null() {
        return Normalized::ok(PaginatedResult::from_collection(
            Vec::new(),
            pagination.page,
            pagination.size,
        ));
    }

    let payload = match serde_json::from_value::<ListPayload<T>>(raw) {
        Ok(payload) => payload,
        Err(e) => {
            let issue = CatalogError::integrity(format!(
                "List response is neither a paginated envelope nor an array: {}",
                e
            ));
            warn!(error = %issue, "Degrading list response to an empty page");
            return Normalized::degraded(pagination, issue);
        }
    };

    match payload {
        ListPayload::Array(items) => Normalized::ok(PaginatedResult::from_collection(
            items,
            pagination.page,
            pagination.size,
        )),
        ListPayload::Envelope(page) => match page.check_invariants() {
            Ok(()) => Normalized::ok(page),
            Err(issue) => {
                warn!(error = %issue, "Paginated envelope failed invariant checks");
                Normalized::degraded(pagination, issue)
            }
        },
    }
}
