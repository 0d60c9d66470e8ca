//! OPDS feed generation.

use crate::library::{BookDto, Page, SeriesDto};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// Navigation feed MIME type.
pub const NAVIGATION_MIME: &str = "application/atom+xml;profile=opds-catalog;kind=navigation";

/// Acquisition feed MIME type.
pub const ACQUISITION_MIME: &str = "application/atom+xml;profile=opds-catalog;kind=acquisition";

/// OPDS feed link.
#[derive(Debug, Clone)]
pub struct Link {
    /// Link relation type (e.g., "self", "subsection", "next").
    pub rel: String,
    /// URL of the linked resource.
    pub href: String,
    /// MIME type of the linked resource.
    pub link_type: String,
    /// Optional title for the link.
    pub title: Option<String>,
}

/// OPDS feed entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Unique identifier for the entry.
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Authors list.
    pub authors: Vec<String>,
    /// Short summary text.
    pub summary: Option<String>,
    /// Links associated with this entry.
    pub links: Vec<Link>,
    /// Categories/tags.
    pub categories: Vec<String>,
}

/// OPDS feed builder.
pub struct FeedBuilder {
    id: String,
    title: String,
    updated: DateTime<Utc>,
    author_name: Option<String>,
    total_results: Option<usize>,
    links: Vec<Link>,
    entries: Vec<Entry>,
}

impl FeedBuilder {
    /// Create a new feed builder.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            updated: Utc::now(),
            author_name: None,
            total_results: None,
            links: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Set the feed author.
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Add a self link.
    pub fn self_link(mut self, href: impl Into<String>) -> Self {
        self.links.push(Link {
            rel: "self".to_string(),
            href: href.into(),
            link_type: ACQUISITION_MIME.to_string(),
            title: None,
        });
        self
    }

    /// Add a search link.
    pub fn search_link(mut self, href: impl Into<String>) -> Self {
        self.links.push(Link {
            rel: "search".to_string(),
            href: href.into(),
            link_type: "application/opensearchdescription+xml".to_string(),
            title: None,
        });
        self
    }

    /// Add `previous`/`next` links and the result count of `page`.
    ///
    /// `href` receives the target page index.
    pub fn pagination<T>(mut self, page: &Page<T>, href: impl Fn(usize) -> String) -> Self {
        self.total_results = Some(page.total_elements);
        if page.number > 0 {
            self.links.push(Link {
                rel: "previous".to_string(),
                href: href(page.number - 1),
                link_type: ACQUISITION_MIME.to_string(),
                title: None,
            });
        }
        if !page.last {
            self.links.push(Link {
                rel: "next".to_string(),
                href: href(page.number + 1),
                link_type: ACQUISITION_MIME.to_string(),
                title: None,
            });
        }
        self
    }

    /// Add a book entry.
    pub fn book_entry(mut self, book: &BookDto, base_url: &str) -> Self {
        let links = vec![
            Link {
                rel: "alternate".to_string(),
                href: format!("{}/api/v1/books/{}", base_url, book.book.id),
                link_type: "application/json".to_string(),
                title: Some("Details".to_string()),
            },
            Link {
                rel: "related".to_string(),
                href: format!("{}/api/v1/series/{}", base_url, book.book.series_id),
                link_type: "application/json".to_string(),
                title: Some(book.series_title.clone()),
            },
        ];

        let summary = if book.book.number.is_empty() {
            book.series_title.clone()
        } else {
            format!("{} #{}", book.series_title, book.book.number)
        };

        self.entries.push(Entry {
            id: format!("urn:uuid:{}", book.book.id),
            title: book.book.title.clone(),
            updated: book.book.release_date.unwrap_or(book.book.created),
            authors: book.book.authors.iter().map(|a| a.name.clone()).collect(),
            summary: Some(summary),
            links,
            categories: book.book.tags.clone(),
        });
        self
    }

    /// Add a series entry.
    pub fn series_entry(mut self, series: &SeriesDto, base_url: &str) -> Self {
        let id = &series.series.id;
        let condition =
            serde_json::json!({"seriesId": {"operator": "is", "value": id}}).to_string();

        self.entries.push(Entry {
            id: format!("urn:uuid:{}", id),
            title: series.series.title.clone(),
            updated: series.series.release_date.unwrap_or(series.series.created),
            authors: series.authors.iter().map(|a| a.name.clone()).collect(),
            summary: Some(format!("{} books", series.books_count)),
            links: vec![Link {
                rel: "subsection".to_string(),
                href: format!(
                    "{}/opds/v1.2/search?condition={}",
                    base_url,
                    urlencoding::encode(&condition)
                ),
                link_type: ACQUISITION_MIME.to_string(),
                title: Some(series.series.title.clone()),
            }],
            categories: series.series.genres.clone(),
        });
        self
    }

    /// Build the XML feed.
    pub fn build(self) -> String {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        // XML declaration - writing to Vec can't fail
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));

        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", "http://www.w3.org/2005/Atom"));
        feed.push_attribute(("xmlns:opds", "http://opds-spec.org/2010/catalog"));
        feed.push_attribute(("xmlns:opensearch", "http://a9.com/-/spec/opensearch/1.1/"));
        let _ = writer.write_event(Event::Start(feed));

        write_text_element(&mut writer, "id", &self.id);
        write_text_element(&mut writer, "title", &self.title);
        write_text_element(&mut writer, "updated", &self.updated.to_rfc3339());

        if let Some(name) = &self.author_name {
            let _ = writer.write_event(Event::Start(BytesStart::new("author")));
            write_text_element(&mut writer, "name", name);
            let _ = writer.write_event(Event::End(BytesEnd::new("author")));
        }

        if let Some(total) = self.total_results {
            write_text_element(&mut writer, "opensearch:totalResults", &total.to_string());
        }

        for link in &self.links {
            write_link(&mut writer, link);
        }

        for entry in &self.entries {
            write_entry(&mut writer, entry);
        }

        let _ = writer.write_event(Event::End(BytesEnd::new("feed")));

        String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
    }
}

/// Write a simple text element.
fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

/// Write a link element.
fn write_link<W: std::io::Write>(writer: &mut Writer<W>, link: &Link) {
    let mut elem = BytesStart::new("link");
    elem.push_attribute(("rel", link.rel.as_str()));
    elem.push_attribute(("href", link.href.as_str()));
    elem.push_attribute(("type", link.link_type.as_str()));
    if let Some(title) = &link.title {
        elem.push_attribute(("title", title.as_str()));
    }
    let _ = writer.write_event(Event::Empty(elem));
}

/// Write an entry element.
fn write_entry<W: std::io::Write>(writer: &mut Writer<W>, entry: &Entry) {
    let _ = writer.write_event(Event::Start(BytesStart::new("entry")));

    write_text_element(writer, "id", &entry.id);
    write_text_element(writer, "title", &entry.title);
    write_text_element(writer, "updated", &entry.updated.to_rfc3339());

    for author in &entry.authors {
        let _ = writer.write_event(Event::Start(BytesStart::new("author")));
        write_text_element(writer, "name", author);
        let _ = writer.write_event(Event::End(BytesEnd::new("author")));
    }

    if let Some(summary) = &entry.summary {
        let mut elem = BytesStart::new("summary");
        elem.push_attribute(("type", "text"));
        let _ = writer.write_event(Event::Start(elem));
        let _ = writer.write_event(Event::Text(BytesText::new(summary)));
        let _ = writer.write_event(Event::End(BytesEnd::new("summary")));
    }

    for link in &entry.links {
        write_link(writer, link);
    }

    for category in &entry.categories {
        let mut elem = BytesStart::new("category");
        elem.push_attribute(("term", category.as_str()));
        elem.push_attribute(("label", category.as_str()));
        let _ = writer.write_event(Event::Empty(elem));
    }

    let _ = writer.write_event(Event::End(BytesEnd::new("entry")));
}

/// Generate OpenSearch description XML.
pub fn generate_opensearch(title: &str, base_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OpenSearchDescription xmlns="http://a9.com/-/spec/opensearch/1.1/">
  <ShortName>{}</ShortName>
  <Description>Search the {} catalog</Description>
  <InputEncoding>UTF-8</InputEncoding>
  <OutputEncoding>UTF-8</OutputEncoding>
  <Url type="{}" template="{}/opds/v1.2/search?q={{searchTerms}}"/>
</OpenSearchDescription>"#,
        title, title, ACQUISITION_MIME, base_url
    )
}
