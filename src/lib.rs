//! ReadHub Core
//!
//! Client data-access and query layer for the ReadHub book catalog:
//! HTTP adapter, response normalization, search request building, search
//! mode resolution and a request-keyed cache with mutation-driven
//! invalidation.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod query;
pub mod search;
pub mod storage;

pub use catalog::Catalog;
pub use config::ClientConfig;
pub use error::{CatalogError, Result};
pub use storage::Session;
