//! In-memory catalog snapshot and search.

use super::book::{Book, BookDto, BookView, Series, SeriesDto, SeriesView};
use crate::access::{SearchContext, check_access};
use crate::db::{Library, ReadProgress};
use crate::search::{Author, BookSearch, EvalContext, ReadStatus, SeriesSearch};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: usize = 500;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    /// Page index.
    #[serde(default)]
    pub page: usize,
    /// Page size.
    #[serde(default = "default_page_size")]
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Create a page request.
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Clamp the size into `1..=max_size`.
    pub fn clamped(self, max_size: usize) -> Self {
        Self {
            page: self.page,
            size: self.size.clamp(1, max_size.max(1)),
        }
    }
}

/// One page of results. Totals count only entities visible to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub content: Vec<T>,
    /// Number of matching items across all pages.
    pub total_elements: usize,
    /// Number of pages.
    pub total_pages: usize,
    /// Page index.
    pub number: usize,
    /// Page size.
    pub size: usize,
    /// Whether this is the last page.
    pub last: bool,
}

impl<T> Page<T> {
    /// Slice `items` according to `request`.
    pub fn of(items: Vec<T>, request: PageRequest) -> Self {
        let size = request.size.max(1);
        let total_elements = items.len();
        let total_pages = total_elements.div_ceil(size);
        let content: Vec<T> = items
            .into_iter()
            .skip(request.page.saturating_mul(size))
            .take(size)
            .collect();

        Self {
            content,
            total_elements,
            total_pages,
            number: request.page,
            size,
            last: request.page.saturating_add(1) >= total_pages,
        }
    }

    /// Convert the page items.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            number: self.number,
            size: self.size,
            last: self.last,
        }
    }
}

/// Per-user read state, keyed by book id.
#[derive(Debug, Clone, Default)]
pub struct ReadStates {
    completed: HashMap<String, bool>,
}

impl ReadStates {
    /// No progress at all: everything is unread.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from stored progress records.
    pub fn from_progress(progress: &[ReadProgress]) -> Self {
        Self {
            completed: progress
                .iter()
                .map(|p| (p.book_id.clone(), p.completed))
                .collect(),
        }
    }

    /// Status of a single book.
    pub fn book_status(&self, book_id: &str) -> ReadStatus {
        match self.completed.get(book_id) {
            None => ReadStatus::Unread,
            Some(true) => ReadStatus::Read,
            Some(false) => ReadStatus::InProgress,
        }
    }

    /// Aggregate status of a series: read when every book is read, unread
    /// when none has progress, in progress otherwise.
    pub fn series_status<'a, I>(&self, book_ids: I) -> ReadStatus
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut total = 0usize;
        let mut read = 0usize;
        let mut touched = 0usize;
        for id in book_ids {
            total += 1;
            match self.book_status(id) {
                ReadStatus::Read => {
                    read += 1;
                    touched += 1;
                }
                ReadStatus::InProgress => touched += 1,
                ReadStatus::Unread => {}
            }
        }

        if total > 0 && read == total {
            ReadStatus::Read
        } else if touched == 0 {
            ReadStatus::Unread
        } else {
            ReadStatus::InProgress
        }
    }
}

/// Catalog contents as imported from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogImport {
    /// Libraries to create when missing.
    pub libraries: Vec<Library>,
    /// Series to upsert.
    pub series: Vec<Series>,
    /// Books to upsert.
    pub books: Vec<Book>,
}

/// Counts written by a catalog import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Libraries created.
    pub libraries: usize,
    /// Series upserted.
    pub series: usize,
    /// Books upserted.
    pub books: usize,
}

/// Immutable snapshot of every series and book.
///
/// Series are kept sorted by title, books by series then number.
#[derive(Debug, Default)]
pub struct Catalog {
    series: Vec<Series>,
    books: Vec<Book>,
    series_index: HashMap<String, usize>,
    book_index: HashMap<String, usize>,
    // Per series (same order as `series`): indexes into `books`.
    series_books: Vec<Vec<usize>>,
    series_authors: Vec<Vec<Author>>,
}

impl Catalog {
    /// Build a snapshot. Books whose series is missing are dropped.
    pub fn new(mut series: Vec<Series>, books: Vec<Book>) -> Self {
        series.sort_by_cached_key(|s| (s.sort_key(), s.id.clone()));
        let series_index: HashMap<String, usize> = series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let mut books: Vec<Book> = books
            .into_iter()
            .filter(|b| {
                let known = series_index.contains_key(&b.series_id);
                if !known {
                    debug!(
                        book = %b.id,
                        series = %b.series_id,
                        "Dropping book with unknown series"
                    );
                }
                known
            })
            .collect();
        books.sort_by(|a, b| {
            series_index[&a.series_id]
                .cmp(&series_index[&b.series_id])
                .then(
                    a.number_sort
                        .partial_cmp(&b.number_sort)
                        .unwrap_or(Ordering::Equal),
                )
                .then_with(|| a.id.cmp(&b.id))
        });

        let book_index = books
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();

        let mut series_books = vec![Vec::new(); series.len()];
        let mut series_authors: Vec<Vec<Author>> = vec![Vec::new(); series.len()];
        for (i, book) in books.iter().enumerate() {
            let s = series_index[&book.series_id];
            series_books[s].push(i);
            for author in &book.authors {
                if !series_authors[s].contains(author) {
                    series_authors[s].push(author.clone());
                }
            }
        }

        Self {
            series,
            books,
            series_index,
            book_index,
            series_books,
            series_authors,
        }
    }

    /// Snapshot with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of series.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Number of books.
    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Look up a series by id.
    pub fn series(&self, id: &str) -> Option<&Series> {
        self.series_index.get(id).map(|&i| &self.series[i])
    }

    /// Look up a book by id.
    pub fn book(&self, id: &str) -> Option<&Book> {
        self.book_index.get(id).map(|&i| &self.books[i])
    }

    /// A book with its series and the caller's read status.
    pub fn book_view(&self, id: &str, reads: &ReadStates) -> Option<BookView<'_>> {
        self.book_index.get(id).map(|&i| self.book_view_at(i, reads))
    }

    /// A series with its aggregates for the caller.
    pub fn series_view(&self, id: &str, reads: &ReadStates) -> Option<SeriesView<'_>> {
        self.series_index
            .get(id)
            .map(|&i| self.series_view_at(i, reads))
    }

    fn book_view_at(&self, i: usize, reads: &ReadStates) -> BookView<'_> {
        let book = &self.books[i];
        BookView {
            book,
            series: &self.series[self.series_index[&book.series_id]],
            read_status: reads.book_status(&book.id),
        }
    }

    fn series_view_at(&self, i: usize, reads: &ReadStates) -> SeriesView<'_> {
        let books = &self.series_books[i];
        SeriesView {
            series: &self.series[i],
            authors: &self.series_authors[i],
            book_count: books.len(),
            read_status: reads.series_status(books.iter().map(|&b| self.books[b].id.as_str())),
        }
    }

    /// Books visible to `context` that match `request`.
    ///
    /// Access is checked before the condition, and totals count only
    /// visible matches.
    pub fn search_books(
        &self,
        context: &SearchContext,
        request: &BookSearch,
        reads: &ReadStates,
        eval: &EvalContext,
        page: PageRequest,
    ) -> Page<BookDto> {
        let terms = search_terms(request.text());
        let matches: Vec<BookView<'_>> = (0..self.books.len())
            .map(|i| self.book_view_at(i, reads))
            .filter(|v| check_access(context, v).is_allowed())
            .filter(|v| {
                request
                    .condition
                    .as_ref()
                    .is_none_or(|c| c.evaluate(v, eval))
            })
            .filter(|v| {
                matches_terms(
                    &terms,
                    [v.book.title.as_str(), v.series.title.as_str()]
                        .into_iter()
                        .chain(v.book.authors.iter().map(|a| a.name.as_str())),
                )
            })
            .collect();

        debug!(
            user = context.user_id().unwrap_or("-"),
            matches = matches.len(),
            "Book search"
        );
        Page::of(matches, page).map(BookDto::from)
    }

    /// Series visible to `context` that match `request`.
    pub fn search_series(
        &self,
        context: &SearchContext,
        request: &SeriesSearch,
        reads: &ReadStates,
        eval: &EvalContext,
        page: PageRequest,
    ) -> Page<SeriesDto> {
        let terms = search_terms(request.text());
        let matches: Vec<SeriesView<'_>> = (0..self.series.len())
            .map(|i| self.series_view_at(i, reads))
            .filter(|v| check_access(context, v).is_allowed())
            .filter(|v| {
                request
                    .condition
                    .as_ref()
                    .is_none_or(|c| c.evaluate(v, eval))
            })
            .filter(|v| {
                matches_terms(
                    &terms,
                    std::iter::once(v.series.title.as_str())
                        .chain(v.authors.iter().map(|a| a.name.as_str())),
                )
            })
            .collect();

        debug!(
            user = context.user_id().unwrap_or("-"),
            matches = matches.len(),
            "Series search"
        );
        Page::of(matches, page).map(SeriesDto::from)
    }
}

fn search_terms(text: Option<&str>) -> Vec<String> {
    text.map(|t| t.split_whitespace().map(str::to_lowercase).collect())
        .unwrap_or_default()
}

/// Every term must appear in at least one of `haystacks`.
fn matches_terms<'a>(terms: &[String], haystacks: impl Iterator<Item = &'a str>) -> bool {
    if terms.is_empty() {
        return true;
    }
    let haystacks: Vec<String> = haystacks.map(str::to_lowercase).collect();
    terms
        .iter()
        .all(|term| haystacks.iter().any(|h| h.contains(term.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AgeRestriction, ContentRestrictions, RestrictionSettings};
    use crate::search::{BookCondition, Equality, SearchRequest, SeriesCondition};
    use chrono::Utc;

    fn progress(book_id: &str, completed: bool) -> ReadProgress {
        ReadProgress {
            user_id: "u1".into(),
            book_id: book_id.into(),
            page: 1,
            completed,
            updated_at: 0,
        }
    }

    fn sample() -> Catalog {
        let mut kids = Series::new("s1", "L1", "Bunny Tales");
        kids.age_rating = Some(6);
        kids.total_book_count = Some(2);
        let mut adult = Series::new("s2", "L1", "After Dark");
        adult.age_rating = Some(18);
        let other = Series::new("s3", "L2", "Compendium");

        let mut books = Vec::new();
        let placements = [
            ("b1", &kids, 1.0),
            ("b2", &kids, 2.0),
            ("b3", &adult, 1.0),
            ("b4", &other, 1.0),
        ];
        for (id, series, n) in placements {
            let mut book = Book::new(id, series, format!("{} {n}", series.title));
            book.number_sort = n;
            books.push(book);
        }
        books[0].authors.push(Author {
            name: "Ada Writer".into(),
            role: "writer".into(),
        });
        Catalog::new(vec![kids, adult, other], books)
    }

    #[test]
    fn orders_series_by_title_and_books_by_number() {
        let catalog = sample();
        let page = catalog.search_series(
            &SearchContext::empty(),
            &SearchRequest::default(),
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::default(),
        );
        let titles: Vec<_> = page.content.iter().map(|s| s.series.title.as_str()).collect();
        assert_eq!(titles, ["After Dark", "Bunny Tales", "Compendium"]);

        let books = catalog.search_books(
            &SearchContext::empty(),
            &SearchRequest::default(),
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::default(),
        );
        let ids: Vec<_> = books.content.iter().map(|b| b.book.id.as_str()).collect();
        assert_eq!(ids, ["b3", "b1", "b2", "b4"]);
    }

    #[test]
    fn totals_exclude_restricted_content() {
        let catalog = sample();
        let ctx = SearchContext::new(
            "u1",
            ContentRestrictions::derive(&RestrictionSettings {
                age_restriction: Some(AgeRestriction::allow_only(12)),
                ..Default::default()
            }),
            None,
        );

        let page = catalog.search_books(
            &ctx,
            &SearchRequest::default(),
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::new(0, 2),
        );
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
        assert!(!page.last);
        assert!(page.content.iter().all(|b| b.book.series_id != "s2"));
    }

    #[test]
    fn condition_and_library_scope_combine() {
        let catalog = sample();
        let ctx = SearchContext::new(
            "u1",
            ContentRestrictions::none(),
            Some(["L1".to_string()].into_iter().collect()),
        );
        let request = SearchRequest::with_condition(BookCondition::LibraryId(Equality::Is {
            value: "L2".into(),
        }));

        let page = catalog.search_books(
            &ctx,
            &request,
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::default(),
        );
        assert_eq!(page.total_elements, 0);
        assert!(page.last);
    }

    #[test]
    fn full_text_matches_title_series_and_author() {
        let catalog = sample();
        let search = |text: &str| {
            let request = BookSearch {
                condition: None,
                full_text_search: Some(text.to_string()),
            };
            catalog
                .search_books(
                    &SearchContext::empty(),
                    &request,
                    &ReadStates::none(),
                    &EvalContext::at(Utc::now()),
                    PageRequest::default(),
                )
                .total_elements
        };

        assert_eq!(search("bunny"), 2);
        assert_eq!(search("ada bunny"), 1);
        assert_eq!(search("ada dark"), 0);
        assert_eq!(search("   "), 4);
    }

    #[test]
    fn read_status_is_per_user_and_aggregated() {
        let catalog = sample();
        let reads = ReadStates::from_progress(&[progress("b1", true), progress("b2", false)]);

        assert_eq!(reads.book_status("b1"), ReadStatus::Read);
        assert_eq!(reads.book_status("b2"), ReadStatus::InProgress);
        assert_eq!(reads.book_status("b3"), ReadStatus::Unread);

        let series = catalog.series_view("s1", &reads).map(|v| v.read_status);
        assert_eq!(series, Some(ReadStatus::InProgress));

        let all_read = ReadStates::from_progress(&[progress("b1", true), progress("b2", true)]);
        let series = catalog.series_view("s1", &all_read).map(|v| v.read_status);
        assert_eq!(series, Some(ReadStatus::Read));
        assert_eq!(
            catalog.series_view("s2", &all_read).map(|v| v.read_status),
            Some(ReadStatus::Unread)
        );
    }

    #[test]
    fn series_complete_and_authors() {
        let catalog = sample();
        let request = SearchRequest::with_condition(SeriesCondition::Complete(
            crate::search::BooleanOp::IsTrue,
        ));
        let page = catalog.search_series(
            &SearchContext::empty(),
            &request,
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::default(),
        );
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].series.id, "s1");
        assert_eq!(page.content[0].authors.len(), 1);
        assert!(page.content[0].complete);
    }

    #[test]
    fn drops_orphan_books() {
        let series = Series::new("s1", "L1", "Solo");
        let orphan = Book::new("b9", &Series::new("gone", "L1", "Gone"), "Lost");
        let catalog = Catalog::new(vec![series], vec![orphan]);
        assert_eq!(catalog.book_count(), 0);
        assert!(catalog.book("b9").is_none());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = Page::of(vec![1, 2, 3], PageRequest::new(5, 2));
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
        assert!(page.last);

        assert_eq!(PageRequest::new(0, 0).clamped(500).size, 1);
        assert_eq!(PageRequest::new(0, 9000).clamped(500).size, 500);
    }

    #[test]
    fn huge_page_index_is_last_and_empty() {
        let page = Page::of(vec![1, 2, 3], PageRequest::new(usize::MAX, 1));
        assert!(page.content.is_empty());
        assert_eq!(page.number, usize::MAX);
        assert!(page.last);
    }

    #[test]
    fn book_scope_follows_its_series() {
        let series = Series::new("s1", "L1", "Home");
        let mut stray = Book::new("b1", &series, "Stray");
        stray.library_id = "L2".into();
        let catalog = Catalog::new(vec![series], vec![stray]);
        let ctx = SearchContext::new(
            "u1",
            ContentRestrictions::none(),
            Some(["L2".to_string()].into_iter().collect()),
        );

        let book = catalog.book_view("b1", &ReadStates::none()).unwrap();
        let series = catalog.series_view("s1", &ReadStates::none()).unwrap();
        assert_eq!(check_access(&ctx, &book), check_access(&ctx, &series));
        assert!(!check_access(&ctx, &book).is_allowed());

        let page = catalog.search_books(
            &ctx,
            &SearchRequest::default(),
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::default(),
        );
        assert_eq!(page.total_elements, 0);
    }

    #[test]
    fn blank_title_sort_falls_back_to_title() {
        let mut series = Series::new("s1", "L1", "Zebra Days");
        series.title_sort = "  ".into();
        let catalog = Catalog::new(vec![series], Vec::new());
        let condition = SeriesCondition::TitleSort(crate::search::StringOp::BeginsWith {
            value: "zebra".into(),
        });

        let page = catalog.search_series(
            &SearchContext::empty(),
            &SearchRequest::with_condition(condition),
            &ReadStates::none(),
            &EvalContext::at(Utc::now()),
            PageRequest::default(),
        );
        assert_eq!(page.total_elements, 1);
    }
}
