//! Series and book models.

use crate::access::ContentAttributes;
use crate::search::{
    Author, BookFields, MediaStatus, ReadStatus, SeriesFields, SeriesStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A series of books. Age rating and sharing labels live here and apply to
/// every book of the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    /// Unique identifier.
    pub id: String,

    /// Owning library.
    pub library_id: String,

    /// Display title.
    pub title: String,

    /// Title used for sorting (defaults to the title).
    #[serde(default)]
    pub title_sort: String,

    /// Publication status.
    #[serde(default)]
    pub status: SeriesStatus,

    /// Publisher name.
    #[serde(default)]
    pub publisher: String,

    /// Language code (e.g., "en", "fr").
    #[serde(default)]
    pub language: String,

    /// Minimum reader age.
    #[serde(default)]
    pub age_rating: Option<i32>,

    /// First release date.
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,

    /// Genres.
    #[serde(default)]
    pub genres: Vec<String>,

    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Sharing labels used by label restrictions.
    #[serde(default)]
    pub sharing_labels: Vec<String>,

    /// Expected number of books, if known.
    #[serde(default)]
    pub total_book_count: Option<u32>,

    /// Standalone book shown as a series.
    #[serde(default)]
    pub one_shot: bool,

    /// Soft-deleted.
    #[serde(default)]
    pub deleted: bool,

    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl Series {
    /// Create a series with minimal information.
    pub fn new(
        id: impl Into<String>,
        library_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            library_id: library_id.into(),
            title_sort: title.clone(),
            title,
            status: SeriesStatus::default(),
            publisher: String::new(),
            language: String::new(),
            age_rating: None,
            release_date: None,
            genres: Vec::new(),
            tags: Vec::new(),
            sharing_labels: Vec::new(),
            total_book_count: None,
            one_shot: false,
            deleted: false,
            created: Utc::now(),
        }
    }

    /// Sort title; a blank `title_sort` means the title.
    pub fn effective_title_sort(&self) -> &str {
        if self.title_sort.trim().is_empty() {
            &self.title
        } else {
            &self.title_sort
        }
    }

    /// Sort key, falling back to the title.
    pub fn sort_key(&self) -> String {
        self.effective_title_sort().to_lowercase()
    }
}

/// A book or comic issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Unique identifier.
    pub id: String,

    /// Owning series.
    pub series_id: String,

    /// Owning library.
    pub library_id: String,

    /// Book title.
    pub title: String,

    /// Display number ("1", "1.5", "Annual").
    #[serde(default)]
    pub number: String,

    /// Numeric sort key.
    #[serde(default)]
    pub number_sort: f32,

    /// Release date.
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,

    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Credited authors.
    #[serde(default)]
    pub authors: Vec<Author>,

    /// Media analysis status.
    #[serde(default)]
    pub media_status: MediaStatus,

    /// Number of pages.
    #[serde(default)]
    pub page_count: u32,

    /// Standalone book.
    #[serde(default)]
    pub one_shot: bool,

    /// Soft-deleted.
    #[serde(default)]
    pub deleted: bool,

    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl Book {
    /// Create a book with minimal information.
    pub fn new(id: impl Into<String>, series: &Series, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            series_id: series.id.clone(),
            library_id: series.library_id.clone(),
            title: title.into(),
            number: String::new(),
            number_sort: 0.0,
            release_date: None,
            tags: Vec::new(),
            authors: Vec::new(),
            media_status: MediaStatus::default(),
            page_count: 0,
            one_shot: false,
            deleted: false,
            created: Utc::now(),
        }
    }

    /// Get display name for authors.
    pub fn authors_display(&self) -> String {
        if self.authors.is_empty() {
            "Unknown Author".to_string()
        } else {
            self.authors
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// A book as seen by one user: with its series ancestry and read status.
#[derive(Debug, Clone, Copy)]
pub struct BookView<'a> {
    /// The book.
    pub book: &'a Book,
    /// Its series.
    pub series: &'a Series,
    /// Read status for the requesting user.
    pub read_status: ReadStatus,
}

impl BookFields for BookView<'_> {
    fn library_id(&self) -> &str {
        &self.series.library_id
    }
    fn series_id(&self) -> &str {
        &self.book.series_id
    }
    fn deleted(&self) -> bool {
        self.book.deleted
    }
    fn one_shot(&self) -> bool {
        self.book.one_shot
    }
    fn title(&self) -> &str {
        &self.book.title
    }
    fn release_date(&self) -> Option<DateTime<Utc>> {
        self.book.release_date
    }
    fn number_sort(&self) -> f32 {
        self.book.number_sort
    }
    fn tags(&self) -> &[String] {
        &self.book.tags
    }
    fn read_status(&self) -> ReadStatus {
        self.read_status
    }
    fn media_status(&self) -> MediaStatus {
        self.book.media_status
    }
    fn authors(&self) -> &[Author] {
        &self.book.authors
    }
}

impl ContentAttributes for BookView<'_> {
    fn library_id(&self) -> &str {
        &self.series.library_id
    }
    fn age_rating(&self) -> Option<i32> {
        self.series.age_rating
    }
    fn sharing_labels(&self) -> &[String] {
        &self.series.sharing_labels
    }
}

/// A series as seen by one user.
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    /// The series.
    pub series: &'a Series,
    /// Authors of its books.
    pub authors: &'a [Author],
    /// Number of books present.
    pub book_count: usize,
    /// Aggregated read status for the requesting user.
    pub read_status: ReadStatus,
}

impl SeriesFields for SeriesView<'_> {
    fn library_id(&self) -> &str {
        &self.series.library_id
    }
    fn deleted(&self) -> bool {
        self.series.deleted
    }
    fn complete(&self) -> bool {
        self.series
            .total_book_count
            .is_some_and(|total| self.book_count >= total as usize)
    }
    fn one_shot(&self) -> bool {
        self.series.one_shot
    }
    fn title(&self) -> &str {
        &self.series.title
    }
    fn title_sort(&self) -> &str {
        self.series.effective_title_sort()
    }
    fn release_date(&self) -> Option<DateTime<Utc>> {
        self.series.release_date
    }
    fn tags(&self) -> &[String] {
        &self.series.tags
    }
    fn sharing_labels(&self) -> &[String] {
        &self.series.sharing_labels
    }
    fn publisher(&self) -> &str {
        &self.series.publisher
    }
    fn language(&self) -> &str {
        &self.series.language
    }
    fn genres(&self) -> &[String] {
        &self.series.genres
    }
    fn age_rating(&self) -> Option<i32> {
        self.series.age_rating
    }
    fn read_status(&self) -> ReadStatus {
        self.read_status
    }
    fn status(&self) -> SeriesStatus {
        self.series.status
    }
    fn authors(&self) -> &[Author] {
        self.authors
    }
}

impl ContentAttributes for SeriesView<'_> {
    fn library_id(&self) -> &str {
        &self.series.library_id
    }
    fn age_rating(&self) -> Option<i32> {
        self.series.age_rating
    }
    fn sharing_labels(&self) -> &[String] {
        &self.series.sharing_labels
    }
}

/// Book as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDto {
    /// Book fields.
    #[serde(flatten)]
    pub book: Book,
    /// Title of the owning series.
    pub series_title: String,
    /// Read status for the requesting user.
    pub read_status: ReadStatus,
}

impl From<BookView<'_>> for BookDto {
    fn from(view: BookView<'_>) -> Self {
        Self {
            book: view.book.clone(),
            series_title: view.series.title.clone(),
            read_status: view.read_status,
        }
    }
}

/// Series as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDto {
    /// Series fields.
    #[serde(flatten)]
    pub series: Series,
    /// Number of books present.
    pub books_count: usize,
    /// All expected books are present.
    pub complete: bool,
    /// Authors of the series' books.
    pub authors: Vec<Author>,
    /// Aggregated read status for the requesting user.
    pub read_status: ReadStatus,
}

impl From<SeriesView<'_>> for SeriesDto {
    fn from(view: SeriesView<'_>) -> Self {
        Self {
            complete: view.complete(),
            series: view.series.clone(),
            books_count: view.book_count,
            authors: view.authors.to_vec(),
            read_status: view.read_status,
        }
    }
}
