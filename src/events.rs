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


//! Change and notification events
//!
//! The cache publishes `CacheEvent`s for every entry change; the catalog
//! publishes `CatalogEvent`s for mutation outcomes so a presentation layer can
//! show success/failure notifications. Both travel over `tokio::sync::broadcast`.
//! Sending with no subscribers is not an error.

use crate::cache::CacheKey;
use crate::error::{ApiError, CatalogError};
use std::fmt;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// A value was fetched or seeded
    Updated(CacheKey),
    /// A fetch failed; any previous value is kept
    Failed { key: CacheKey, error: CatalogError },
    /// Dropped by a mutation
    Invalidated(CacheKey),
    /// Removed explicitly
    Removed(CacheKey),
    /// Dropped after the inactivity window
    Evicted(CacheKey),
}

impl CacheEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::Updated(key)
            | Self::Invalidated(key)
            | Self::Removed(key)
            | Self::Evicted(key) => key,
            Self::Failed { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Notification text for a successful mutation
    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Create => "Book created successfully!",
            Self::Update => "Book updated successfully!",
            Self::Delete => "Book deleted successfully!",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    MutationSucceeded {
        operation: MutationKind,
        message: String,
    },
    MutationFailed {
        operation: MutationKind,
        error: ApiError,
    },
    /// A response was unusable and was degraded instead of failing the call
    IntegrityWarning { operation: String, message: String },
}

impl CatalogEvent {
    pub fn succeeded(operation: MutationKind) -> Self {
        Self::MutationSucceeded {
            operation,
            message: operation.success_message().to_string(),
        }
    }

    pub fn failed(operation: MutationKind, error: &CatalogError) -> Self {
        Self::MutationFailed {
            operation,
            error: error.to_api_error(),
        }
    }
}

/// Publish without caring whether anyone listens
pub(crate) fn publish<E>(sender: &broadcast::Sender<E>, event: E) {
    let _ = sender.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_messages() {
        match CatalogEvent::succeeded(MutationKind::Create) {
            CatalogEvent::MutationSucceeded { message, .. } => {
                assert_eq!(message, "Book created successfully!")
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_failure_carries_api_error() {
        let event = CatalogEvent::failed(MutationKind::Delete, &CatalogError::http_status(500));
        match event {
            CatalogEvent::MutationFailed { operation, error } => {
                assert_eq!(operation, MutationKind::Delete);
                assert_eq!(error.status_code, 500);
                assert_eq!(error.description, "Please try again later");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let (tx, rx) = broadcast::channel::<CacheEvent>(EVENT_CHANNEL_CAPACITY);
        drop(rx);
        publish(&tx, CacheEvent::Removed(CacheKey::count()));
    }
}
