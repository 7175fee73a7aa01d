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


//! Book service API access
//!
//! - `client` - HTTP Client Adapter (`HttpTransport`, reqwest-backed `HttpClient`)
//! - `books` - typed endpoints for every backend route
//! - `normalize` - list response normalization (array vs. paginated envelope)

pub mod books;
pub mod client;
pub mod normalize;

// Re-export commonly used types
pub use books::BookApi;
pub use client::{ApiRequest, HttpClient, HttpTransport, UnauthorizedHandler};
pub use normalize::{normalize_list, Normalized};
