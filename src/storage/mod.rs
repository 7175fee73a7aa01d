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


//! Persistent local storage
//!
//! A tiny SQLite key/value store holding the client state that must survive
//! restarts (auth token, local user id), plus the `Session` identity context
//! built on top of it.
//!
//! # Usage Example
//! ```no_run
//! use readhub_core::storage::{Database, Session};
//!
//! # async fn example() -> readhub_core::error::Result<()> {
//! let db = Database::new(Database::get_default_path()).await?;
//! let session = Session::load(db).await?;
//! println!("browsing as {}", session.user_id());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod local_storage;
pub mod migrations;
pub mod session;

// Re-export commonly used types
pub use database::Database;
pub use session::{Session, ANONYMOUS_USER, AUTH_TOKEN_KEY, USER_ID_KEY};
