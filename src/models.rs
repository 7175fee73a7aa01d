//! Catalog data models
//!
//! Wire types shared by the HTTP adapter, the cache and the search layer.
//! Field names follow the backend's camelCase JSON.

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Default page index
pub const DEFAULT_PAGE: u32 = 0;

/// Default page size
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default sort field
pub const DEFAULT_SORT_BY: &str = "createdAt";

// ============================================================================
// BOOK
// ============================================================================

/// Book lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    Draft,
    #[default]
    Active,
    Inactive,
    Archived,
    PendingApproval,
    Deleted,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Archived => "ARCHIVED",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Deleted => "DELETED",
        }
    }

    /// DELETED is terminal: reachable from anywhere, never left again.
    pub fn can_transition_to(&self, next: BookStatus) -> bool {
        match self {
            Self::Deleted => next == Self::Deleted,
            _ => true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Deleted
    }
}

impl std::str::FromStr for BookStatus {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "ARCHIVED" => Ok(Self::Archived),
            "PENDING_APPROVAL" => Ok(Self::PendingApproval),
            "DELETED" => Ok(Self::Deleted),
            other => Err(CatalogError::validation(format!("Unknown book status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
}

impl Author {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Canonical server-side book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<Author>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub average_rating: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub review_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: BookStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: u64,
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Book {
    /// Comma-joined author names for display
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check that `next` is a legal successor of this record.
    ///
    /// The id never changes, the version strictly increases and a deleted
    /// record stays deleted.
    pub fn check_successor(&self, next: &Book) -> Result<()> {
        if next.id != self.id {
            return Err(CatalogError::integrity(format!(
                "Book id changed from {} to {}",
                self.id, next.id
            )));
        }
        if next.version <= self.version {
            return Err(CatalogError::integrity(format!(
                "Book {} version did not advance ({} -> {})",
                self.id, self.version, next.version
            )));
        }
        if !self.status.can_transition_to(next.status) {
            return Err(CatalogError::integrity(format!(
                "Book {} cannot leave status {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

/// Body of `POST /books`: book fields minus server-assigned ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookCreate {
    pub title: String,
    pub description: String,
    pub authors: Vec<Author>,
    pub categories: Vec<String>,
    pub language: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl BookCreate {
    pub fn new<T: Into<String>, L: Into<String>>(title: T, language: L) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn with_author<S: Into<String>>(mut self, name: S) -> Self {
        self.authors.push(Author::named(name));
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.categories.push(category.into());
        self
    }

    /// A title and a named first author are required
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CatalogError::validation("Title is required"));
        }
        match self.authors.first() {
            Some(author) if !author.name.trim().is_empty() => {}
            _ => return Err(CatalogError::validation("At least one author name is required")),
        }
        if self.language.trim().is_empty() {
            return Err(CatalogError::validation("Language is required"));
        }
        Ok(())
    }
}

/// Body of `PUT /books/{id}`: partial update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// PAGINATION & FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub sort_by: String,
    pub sort_direction: SortDirection,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_direction: SortDirection::Desc,
        }
    }
}

impl Pagination {
    /// Query parameters in backend order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("size".to_string(), self.size.to_string()),
            ("sortBy".to_string(), self.sort_by.clone()),
            ("sortDirection".to_string(), self.sort_direction.as_str().to_string()),
        ]
    }
}

/// Partial pagination input; unset fields take the defaults
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaginationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
}

impl PaginationPatch {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn sorted_by<S: Into<String>>(mut self, field: S, direction: SortDirection) -> Self {
        self.sort_by = Some(field.into());
        self.sort_direction = Some(direction);
        self
    }

    /// Fill unset fields from the defaults. A zero page size is treated as unset.
    pub fn resolve(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            size: self.size.filter(|s| *s > 0).unwrap_or(defaults.size),
            sort_by: self
                .sort_by
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.sort_by),
            sort_direction: self.sort_direction.unwrap_or(defaults.sort_direction),
        }
    }
}

/// Search filter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
}

impl Filters {
    pub fn query<S: Into<String>>(query: S) -> Self {
        Self {
            search_query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Immutable search request built fresh for every query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub pagination: Pagination,
    pub filters: Filters,
    pub include_deleted: bool,
    pub include_authors: bool,
    pub include_metrics: bool,
    pub user_id: String,
    pub request_id: String,
}

impl SearchRequest {
    /// Body of `POST /search`
    ///
    /// The free-text query travels as `filters.query`. A plain text search
    /// sends nothing else; any other filter that is set rides along next to
    /// it (popular books rely on `minRating`).
    pub fn to_search_body(&self) -> Result<serde_json::Value> {
        let mut filters = match serde_json::to_value(&self.filters)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let query = filters
            .remove("searchQuery")
            .unwrap_or_else(|| serde_json::Value::String(String::new()));
        filters.insert("query".to_string(), query);

        Ok(serde_json::json!({
            "pagination": self.pagination,
            "filters": filters,
            "includeDeleted": self.include_deleted,
            "includeAuthors": self.include_authors,
            "includeMetrics": self.include_metrics,
        }))
    }
}

// ============================================================================
// PAGINATED RESULT
// ============================================================================

/// Normalized page of results handed to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub content: Vec<T>,
    pub total_pages: u64,
    pub total_elements: u64,
    pub size: u32,
    pub number: u32,
    pub first: bool,
    pub last: bool,
    pub number_of_elements: u64,
    pub empty: bool,
}

impl<T> PaginatedResult<T> {
    /// Zero-result page for the given position
    pub fn empty_page(page: u32, size: u32) -> Self {
        Self::from_parts(Vec::new(), page, size, 0)
    }

    /// Slice one page out of the full collection
    pub fn from_collection(all: Vec<T>, page: u32, size: u32) -> Self {
        let total = all.len() as u64;
        let size = size.max(1);
        let start = (page as u64).saturating_mul(size as u64);
        let content: Vec<T> = all
            .into_iter()
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(size as usize)
            .collect();
        Self::from_parts(content, page, size, total)
    }

    /// Assemble a page and derive every computed flag from the totals
    pub fn from_parts(content: Vec<T>, page: u32, size: u32, total_elements: u64) -> Self {
        let size = size.max(1);
        let total_pages = total_elements.div_ceil(size as u64);
        let number_of_elements = content.len() as u64;
        Self {
            content,
            total_pages,
            total_elements,
            size,
            number: page,
            first: page == 0,
            last: (page as i64) >= (total_pages as i64) - 1,
            number_of_elements,
            empty: total_elements == 0,
        }
    }

    /// Verify the derived flags agree with the counts
    pub fn check_invariants(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.number_of_elements != self.content.len() as u64 {
            problems.push(format!(
                "numberOfElements {} != content length {}",
                self.number_of_elements,
                self.content.len()
            ));
        }
        if self.empty != (self.total_elements == 0) {
            problems.push(format!(
                "empty={} with totalElements={}",
                self.empty, self.total_elements
            ));
        }
        if self.first != (self.number == 0) {
            problems.push(format!("first={} on page {}", self.first, self.number));
        }
        if self.last != ((self.number as i64) >= (self.total_pages as i64) - 1) {
            problems.push(format!(
                "last={} on page {} of {}",
                self.last, self.number, self.total_pages
            ));
        }
        if self.content.len() as u64 > self.total_elements {
            problems.push(format!(
                "page holds {} items but totalElements is {}",
                self.content.len(),
                self.total_elements
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::integrity(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, version: u64, status: BookStatus) -> Book {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": "Clean Code",
            "status": status,
            "version": version,
        }))
        .unwrap()
    }

    #[test]
    fn test_book_deserializes_with_sparse_fields() {
        let b = book("64b7f0c2a1b2c3d4e5f60718", 1, BookStatus::Active);
        assert_eq!(b.title, "Clean Code");
        assert!(b.authors.is_empty());
        assert_eq!(b.review_count, 0);
    }

    #[test]
    fn test_book_tolerates_null_metrics() {
        let b: Book = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "title": "Dune",
            "description": null,
            "averageRating": null,
            "reviewCount": null,
            "downloadCount": null,
            "status": null,
            "version": null,
        }))
        .unwrap();

        assert_eq!(b.average_rating, 0.0);
        assert_eq!(b.review_count, 0);
        assert_eq!(b.download_count, 0);
        assert_eq!(b.status, BookStatus::Active);
        assert_eq!(b.version, 0);
        assert!(b.description.is_empty());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&BookStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"PENDING_APPROVAL\"");
        assert_eq!("archived".parse::<BookStatus>().unwrap(), BookStatus::Archived);
        assert!("LOST".parse::<BookStatus>().is_err());
    }

    #[test]
    fn test_deleted_is_terminal() {
        assert!(BookStatus::Draft.can_transition_to(BookStatus::Deleted));
        assert!(BookStatus::Archived.can_transition_to(BookStatus::Deleted));
        assert!(!BookStatus::Deleted.can_transition_to(BookStatus::Active));
        assert!(BookStatus::Deleted.is_terminal());
    }

    #[test]
    fn test_check_successor() {
        let current = book("a", 3, BookStatus::Active);
        assert!(current.check_successor(&book("a", 4, BookStatus::Archived)).is_ok());
        assert!(current.check_successor(&book("b", 4, BookStatus::Active)).is_err());
        assert!(current.check_successor(&book("a", 3, BookStatus::Active)).is_err());

        let deleted = book("a", 5, BookStatus::Deleted);
        assert!(deleted.check_successor(&book("a", 6, BookStatus::Active)).is_err());
    }

    #[test]
    fn test_book_create_validation() {
        let valid = BookCreate::new("Clean Code", "en").with_author("Robert C. Martin");
        assert!(valid.validate().is_ok());
        assert!(BookCreate::new("Clean Code", "en").validate().is_err());
        assert!(BookCreate::new("  ", "en").with_author("R").validate().is_err());
        assert!(BookCreate::new("Clean Code", "").with_author("R").validate().is_err());
    }

    #[test]
    fn test_pagination_patch_fills_defaults() {
        let p = PaginationPatch {
            size: Some(8),
            ..Default::default()
        }
        .resolve();
        assert_eq!(p.page, 0);
        assert_eq!(p.size, 8);
        assert_eq!(p.sort_by, "createdAt");
        assert_eq!(p.sort_direction, SortDirection::Desc);

        let zero = PaginationPatch::page(2, 0).resolve();
        assert_eq!(zero.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_search_body_moves_query() {
        let request = SearchRequest {
            pagination: Pagination::default(),
            filters: Filters {
                search_query: Some("rust".to_string()),
                min_rating: Some(4.0),
                ..Default::default()
            },
            include_deleted: false,
            include_authors: true,
            include_metrics: true,
            user_id: "anonymous".to_string(),
            request_id: "req-1-abc".to_string(),
        };

        let body = request.to_search_body().unwrap();
        assert_eq!(body["filters"]["query"], "rust");
        assert_eq!(body["filters"]["minRating"], 4.0);
        assert!(body["filters"].get("searchQuery").is_none());
        assert_eq!(body["pagination"]["sortBy"], "createdAt");
        assert!(body.get("requestId").is_none());
    }

    #[test]
    fn test_text_search_body_carries_only_query() {
        let request = SearchRequest {
            pagination: Pagination::default(),
            filters: Filters::query("dune"),
            include_deleted: false,
            include_authors: true,
            include_metrics: true,
            user_id: "anonymous".to_string(),
            request_id: "req-1-abc".to_string(),
        };

        let body = request.to_search_body().unwrap();
        assert_eq!(body["filters"], serde_json::json!({ "query": "dune" }));
    }

    #[test]
    fn test_from_collection_slices_last_page() {
        let page = PaginatedResult::from_collection((0..45).collect::<Vec<_>>(), 2, 20);
        assert_eq!(page.content, (40..45).collect::<Vec<_>>());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_elements, 45);
        assert!(page.last);
        assert!(!page.first);
        assert!(page.check_invariants().is_ok());
    }

    #[test]
    fn test_from_collection_past_end() {
        let page = PaginatedResult::from_collection(vec![1, 2, 3], 5, 2);
        assert!(page.content.is_empty());
        assert_eq!(page.number_of_elements, 0);
        assert!(!page.empty);
        assert!(page.last);
    }

    #[test]
    fn test_empty_page_invariants() {
        let page: PaginatedResult<Book> = PaginatedResult::empty_page(0, 20);
        assert!(page.empty);
        assert!(page.first);
        assert!(page.last);
        assert_eq!(page.total_pages, 0);
        assert!(page.check_invariants().is_ok());
    }

    #[test]
    fn test_check_invariants_reports_mismatch() {
        let mut page = PaginatedResult::from_parts(vec![1, 2], 0, 2, 4);
        page.number_of_elements = 5;
        page.last = true;
        let err = page.check_invariants().unwrap_err();
        assert!(matches!(err, CatalogError::DataIntegrity(_)));
    }
}
