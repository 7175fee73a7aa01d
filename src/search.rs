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


//! Search mode resolution, debouncing and search state
//!
//! The caller picks one of four modes explicitly. Each mode validates its raw
//! input before anything is dispatched; rejected input resolves to `Idle`
//! rather than an error.
//!
//! | Mode       | Dispatches when                          | Endpoint              |
//! |------------|------------------------------------------|-----------------------|
//! | `text`     | trimmed length ≥ 2                       | `POST /search`        |
//! | `id`       | exactly 24 hex characters                | `GET /books/{id}`     |
//! | `category` | at least one non-empty comma token       | `POST /search/by-category` |
//! | `language` | trimmed length ≥ 2                       | `POST /search/by-language` |
//!
//! `SearchController` tracks which query is active. Every mode switch, clear
//! or new submission bumps a generation counter; results carrying an older
//! generation are discarded on arrival.

use crate::error::{CatalogError, Result};
use crate::models::{Book, PaginatedResult, PaginationPatch};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Inactivity required before typed input becomes the active query
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

/// Shortest free-text or language query that is dispatched
pub const MIN_QUERY_LEN: usize = 2;

fn object_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("static pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchMode {
    #[default]
    Text,
    Id,
    Category,
    Language,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Id => "id",
            Self::Category => "category",
            Self::Language => "language",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "id" => Ok(Self::Id),
            "category" => Ok(Self::Category),
            "language" => Ok(Self::Language),
            other => Err(CatalogError::validation(format!("Unknown search mode: {}", other))),
        }
    }
}

/// Validated, shaped input for one mode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchTarget {
    Text(String),
    Id(String),
    Categories(Vec<String>),
    Language(String),
}

impl SearchTarget {
    pub fn mode(&self) -> SearchMode {
        match self {
            Self::Text(_) => SearchMode::Text,
            Self::Id(_) => SearchMode::Id,
            Self::Categories(_) => SearchMode::Category,
            Self::Language(_) => SearchMode::Language,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Input not ready for a search; show nothing, call nothing
    Idle,
    Dispatch(SearchTarget),
}

/// Validate `raw` for `mode` and shape it for its endpoint
pub fn resolve(mode: SearchMode, raw: &str) -> Resolution {
    let trimmed = raw.trim();
    let target = match mode {
        SearchMode::Text if trimmed.chars().count() >= MIN_QUERY_LEN => {
            SearchTarget::Text(trimmed.to_string())
        }
        SearchMode::Id if object_id_pattern().is_match(trimmed) => {
            SearchTarget::Id(trimmed.to_string())
        }
        SearchMode::Category => {
            let categories = split_categories(trimmed);
            if categories.is_empty() {
                return Resolution::Idle;
            }
            SearchTarget::Categories(categories)
        }
        SearchMode::Language if trimmed.chars().count() >= MIN_QUERY_LEN => {
            SearchTarget::Language(trimmed.to_string())
        }
        _ => return Resolution::Idle,
    };
    Resolution::Dispatch(target)
}

/// Comma-separated tokens, trimmed, empties dropped
pub fn split_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trailing-edge debounce for typed input
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    /// Record a keystroke; restarts the timer
    pub fn push<S: Into<String>>(&mut self, value: S) {
        self.push_at(value, Instant::now());
    }

    pub fn push_at<S: Into<String>>(&mut self, value: S, now: Instant) {
        self.pending = Some((value.into(), now + self.delay));
    }

    /// Promote the pending value if the timer has elapsed
    pub fn poll_at(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => {
                self.pending.take().map(|(value, _)| value.trim().to_string())
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for the pending value to settle; `None` when nothing is pending
    pub async fn settled(&mut self) -> Option<String> {
        loop {
            let deadline = self.deadline()?;
            sleep_until(deadline).await;
            if let Some(value) = self.poll_at(Instant::now()) {
                return Some(value);
            }
        }
    }
}

/// A dispatched search, stamped with the generation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    pub target: SearchTarget,
    pub pagination: PaginationPatch,
}

impl SearchTicket {
    pub fn mode(&self) -> SearchMode {
        self.target.mode()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Loading,
    Ready(PaginatedResult<Book>),
    Failed(CatalogError),
}

/// Active search context for one search box
#[derive(Debug, Default)]
pub struct SearchController {
    mode: SearchMode,
    pagination: PaginationPatch,
    debouncer: Debouncer,
    generation: u64,
    state: SearchState,
}

impl SearchController {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Switch modes; anything pending or in flight is abandoned
    pub fn set_mode(&mut self, mode: SearchMode) {
        debug!(from = %self.mode, to = %mode, "Search mode switched");
        self.mode = mode;
        self.reset();
    }

    /// Clear the search box
    pub fn clear(&mut self) {
        self.reset();
    }

    pub fn set_pagination(&mut self, pagination: PaginationPatch) {
        self.pagination = pagination;
    }

    /// Record typed input
    pub fn input<S: Into<String>>(&mut self, raw: S) {
        self.debouncer.push(raw);
    }

    pub fn input_at<S: Into<String>>(&mut self, raw: S, now: Instant) {
        self.debouncer.push_at(raw, now);
    }

    /// Submit the debounced value once it has settled
    pub fn poll_at(&mut self, now: Instant) -> Option<SearchTicket> {
        let value = self.debouncer.poll_at(now)?;
        self.submit(&value)
    }

    /// Wait for typed input to settle and submit it
    pub async fn next_ticket(&mut self) -> Option<SearchTicket> {
        let value = self.debouncer.settled().await?;
        self.submit(&value)
    }

    /// Resolve `raw` in the current mode and make it the active query
    ///
    /// Rejected input leaves the controller idle and returns `None`.
    pub fn submit(&mut self, raw: &str) -> Option<SearchTicket> {
        self.generation += 1;
        match resolve(self.mode, raw) {
            Resolution::Idle => {
                self.state = SearchState::Idle;
                None
            }
            Resolution::Dispatch(target) => {
                self.state = SearchState::Loading;
                Some(SearchTicket {
                    generation: self.generation,
                    target,
                    pagination: self.pagination.clone(),
                })
            }
        }
    }

    /// Deliver a result; returns `false` if the ticket is no longer active
    pub fn complete(&mut self, ticket: &SearchTicket, result: Result<PaginatedResult<Book>>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                active = self.generation,
                "Discarding result of superseded search"
            );
            return false;
        }
        self.state = match result {
            Ok(page) => SearchState::Ready(page),
            Err(e) => SearchState::Failed(e),
        };
        true
    }

    fn reset(&mut self) {
        self.debouncer.cancel();
        self.generation += 1;
        self.state = SearchState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(target: SearchTarget) -> Resolution {
        Resolution::Dispatch(target)
    }

    #[test]
    fn test_text_needs_two_characters() {
        assert_eq!(resolve(SearchMode::Text, ""), Resolution::Idle);
        assert_eq!(resolve(SearchMode::Text, " a "), Resolution::Idle);
        assert_eq!(
            resolve(SearchMode::Text, "  ab "),
            dispatch(SearchTarget::Text("ab".to_string()))
        );
    }

    #[test]
    fn test_id_must_be_24_hex() {
        assert_eq!(resolve(SearchMode::Id, "not-valid"), Resolution::Idle);
        assert_eq!(resolve(SearchMode::Id, "507f1f77bcf86cd79943901"), Resolution::Idle);
        assert_eq!(resolve(SearchMode::Id, "507f1f77bcf86cd7994390111"), Resolution::Idle);
        assert_eq!(resolve(SearchMode::Id, "507f1f77bcf86cd79943901g"), Resolution::Idle);
        assert_eq!(
            resolve(SearchMode::Id, "507F1F77BCF86CD799439011"),
            dispatch(SearchTarget::Id("507F1F77BCF86CD799439011".to_string()))
        );
    }

    #[test]
    fn test_categories_split_and_trimmed() {
        assert_eq!(
            resolve(SearchMode::Category, "Fiction, Drama"),
            dispatch(SearchTarget::Categories(vec!["Fiction".to_string(), "Drama".to_string()]))
        );
        assert_eq!(
            resolve(SearchMode::Category, " ,Poetry,, "),
            dispatch(SearchTarget::Categories(vec!["Poetry".to_string()]))
        );
        assert_eq!(resolve(SearchMode::Category, " , ,"), Resolution::Idle);
    }

    #[test]
    fn test_language_needs_two_characters() {
        assert_eq!(resolve(SearchMode::Language, "e"), Resolution::Idle);
        assert_eq!(
            resolve(SearchMode::Language, " en "),
            dispatch(SearchTarget::Language("en".to_string()))
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Category".parse::<SearchMode>().unwrap(), SearchMode::Category);
        assert!("isbn".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::Language.to_string(), "language");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_promotes_last_keystroke_once() {
        let start = Instant::now();
        let mut debouncer = Debouncer::default();
        let mut promoted = Vec::new();

        for (i, value) in ["a", "ab", "abc"].iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            debouncer.push_at(*value, at);
            promoted.extend(debouncer.poll_at(at));
        }
        promoted.extend(debouncer.poll_at(start + Duration::from_millis(499)));
        promoted.extend(debouncer.poll_at(start + Duration::from_millis(500)));
        promoted.extend(debouncer.poll_at(start + Duration::from_millis(900)));

        assert_eq!(promoted, vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_waits_for_inactivity() {
        let start = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.push("  dune ");

        assert_eq!(debouncer.settled().await, Some("dune".to_string()));
        assert_eq!(start.elapsed(), DEBOUNCE_DELAY);
        assert_eq!(debouncer.settled().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_cancels_pending_input() {
        let now = Instant::now();
        let mut controller = SearchController::new(SearchMode::Text);
        controller.input_at("dune", now);
        controller.set_mode(SearchMode::Language);

        assert!(!controller.debouncer().is_pending());
        assert_eq!(controller.poll_at(now + Duration::from_secs(1)), None);
        assert_eq!(controller.state(), &SearchState::Idle);
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let mut controller = SearchController::new(SearchMode::Text);
        let first = controller.submit("dune").unwrap();
        let second = controller.submit("emma").unwrap();

        assert!(!controller.complete(&first, Ok(PaginatedResult::empty_page(0, 20))));
        assert_eq!(controller.state(), &SearchState::Loading);

        assert!(controller.complete(&second, Ok(PaginatedResult::empty_page(0, 20))));
        assert!(matches!(controller.state(), SearchState::Ready(_)));
    }

    #[test]
    fn test_result_after_mode_switch_is_discarded() {
        let mut controller = SearchController::new(SearchMode::Category);
        let ticket = controller.submit("Fiction").unwrap();
        controller.set_mode(SearchMode::Text);

        assert!(!controller.complete(&ticket, Err(CatalogError::http_status(500))));
        assert_eq!(controller.state(), &SearchState::Idle);
    }

    #[test]
    fn test_rejected_input_goes_idle() {
        let mut controller = SearchController::new(SearchMode::Id);
        assert!(controller.submit("not-valid").is_none());
        assert_eq!(controller.state(), &SearchState::Idle);
    }
}
