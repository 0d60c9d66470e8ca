//! Catalog entities and the in-memory catalog.

pub mod book;
pub mod catalog;

pub use book::{Book, BookDto, BookView, Series, SeriesDto, SeriesView};
pub use catalog::{
    Catalog, CatalogImport, DEFAULT_PAGE_SIZE, ImportSummary, MAX_PAGE_SIZE, Page, PageRequest,
    ReadStates,
};
