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


//! Identity/session context
//!
//! The auth token and local user id are read once from persistent storage
//! and then handed explicitly to the HTTP adapter and the query builder.
//! Clearing the token (on a 401) updates memory and storage together.

use crate::error::Result;
use crate::storage::{local_storage, Database};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Storage key for the bearer token
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Storage key for the local user identifier
pub const USER_ID_KEY: &str = "userId";

/// User id reported when none is stored
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Default, Clone)]
struct SessionState {
    token: Option<String>,
    user_id: Option<String>,
}

/// Explicit identity context shared by the adapter and the query builder
#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<SessionState>,
    /// Backing store; `None` keeps the session in memory only
    store: Option<Database>,
}

impl Session {
    /// Session with no token and the anonymous user
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// In-memory session with the given identity
    pub fn new(token: Option<String>, user_id: Option<String>) -> Self {
        Self {
            state: RwLock::new(SessionState { token, user_id }),
            store: None,
        }
    }

    /// Load the persisted token and user id
    pub async fn load(db: Database) -> Result<Self> {
        let token = local_storage::get_item(db.pool(), AUTH_TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty());
        let user_id = local_storage::get_item(db.pool(), USER_ID_KEY)
            .await?
            .filter(|u| !u.is_empty());

        debug!(has_token = token.is_some(), has_user = user_id.is_some(), "Session loaded");

        Ok(Self {
            state: RwLock::new(SessionState { token, user_id }),
            store: Some(db),
        })
    }

    /// Current bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.read().token
    }

    pub fn has_token(&self) -> bool {
        self.read().token.is_some()
    }

    /// Local user id, falling back to `"anonymous"`
    pub fn user_id(&self) -> String {
        self.read()
            .user_id
            .unwrap_or_else(|| ANONYMOUS_USER.to_string())
    }

    /// Store a new token (login happens outside this layer)
    pub async fn set_token<S: Into<String>>(&self, token: S) -> Result<()> {
        let token = token.into();
        if let Some(db) = &self.store {
            local_storage::set_item(db.pool(), AUTH_TOKEN_KEY, &token).await?;
        }
        self.write(|state| state.token = Some(token));
        Ok(())
    }

    pub async fn set_user_id<S: Into<String>>(&self, user_id: S) -> Result<()> {
        let user_id = user_id.into();
        if let Some(db) = &self.store {
            local_storage::set_item(db.pool(), USER_ID_KEY, &user_id).await?;
        }
        self.write(|state| state.user_id = Some(user_id));
        Ok(())
    }

    /// Forget the token in memory and in storage
    pub async fn clear_token(&self) -> Result<()> {
        self.write(|state| state.token = None);
        if let Some(db) = &self.store {
            local_storage::remove_item(db.pool(), AUTH_TOKEN_KEY).await?;
        }
        Ok(())
    }

    fn read(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write<F: FnOnce(&mut SessionState)>(&self, f: F) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session() {
        let session = Session::anonymous();
        assert_eq!(session.token(), None);
        assert_eq!(session.user_id(), "anonymous");
    }

    #[tokio::test]
    async fn test_in_memory_clear_token() {
        let session = Session::new(Some("abc".to_string()), Some("u-1".to_string()));
        assert!(session.has_token());
        session.clear_token().await.unwrap();
        assert!(!session.has_token());
        assert_eq!(session.user_id(), "u-1");
    }

    #[tokio::test]
    async fn test_load_and_clear_persisted_token() {
        let db = Database::new_in_memory().await.unwrap();
        local_storage::set_item(db.pool(), AUTH_TOKEN_KEY, "secret").await.unwrap();
        local_storage::set_item(db.pool(), USER_ID_KEY, "reader-7").await.unwrap();

        let session = Session::load(db.clone()).await.unwrap();
        assert_eq!(session.token().as_deref(), Some("secret"));
        assert_eq!(session.user_id(), "reader-7");

        session.clear_token().await.unwrap();
        assert_eq!(local_storage::get_item(db.pool(), AUTH_TOKEN_KEY).await.unwrap(), None);
        // user id is untouched by a 401
        assert_eq!(
            local_storage::get_item(db.pool(), USER_ID_KEY).await.unwrap().as_deref(),
            Some("reader-7")
        );
    }
}
