//! Record extraction from export documents
//!
//! A stateless grammar over one parsed document: the `.pun` container
//! element's id says which page kind this is, and one submodule per kind
//! turns the page into records. A record that fails to parse is reported
//! and skipped; its siblings still come through.

mod dates;
mod index;
pub mod text;
mod viewforum;
mod viewtopic;

pub use dates::{DateParser, DEFAULT_DATETIME_FORMAT};

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::model::Record;
use crate::util::query_id;

/// Per-record extraction failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A required part of the markup is absent
    #[error("couldn't get {field} of {record}")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    /// The markup is present but does not parse
    #[error("invalid {field} '{value}' of {record}")]
    InvalidField {
        record: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("unparseable date '{0}'")]
    BadDate(String),
}

/// Everything one document yielded: records in document order, plus one
/// error per record that could not be extracted.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub errors: Vec<ExtractError>,
}

/// Stateless document extractor, shared read-only across workers.
pub struct Extractor {
    pub(crate) dates: DateParser,
}

impl Extractor {
    pub fn new(dates: DateParser) -> Self {
        Self { dates }
    }

    /// Extract all records from one parsed document. Documents that are not
    /// recognizable export pages (profile pages, style sheets saved as
    /// .html, …) yield an empty extraction, not an error.
    pub fn extract(&self, document: &Html) -> Extraction {
        let pun = match Selector::parse(".pun")
            .ok()
            .and_then(|sel| document.select(&sel).next())
        {
            Some(element) => element,
            None => return Extraction::default(),
        };

        match pun.value().id() {
            Some("punindex") => index::extract(self, &pun),
            Some("punviewforum") => viewforum::extract(self, &pun),
            Some("punviewtopic") | Some("punviewpoll") => viewtopic::extract(self, &pun),
            // Profile pages carry nothing the schema wants
            _ => Extraction::default(),
        }
    }
}

/// First match for a CSS selector inside `scope`.
pub(crate) fn select_first<'a>(scope: &ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    scope.select(&sel).next()
}

/// All matches for a CSS selector inside `scope`, in document order.
pub(crate) fn select_all<'a>(scope: &ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => scope.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

/// Collapsed text content of an element, trimmed.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Id of the forum or topic a listing page belongs to, read from the `id`
/// query parameter of the first page link. Listing pages short enough to
/// have no page links carry no such id; those return `None`.
pub(crate) fn container_id(pun: &ElementRef<'_>) -> Option<u32> {
    let link = select_first(pun, ".pagelink a")?;
    query_id(link.value().attr("href")?, "id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_documents_extract_nothing() {
        let doc = Html::parse_document("<html><body><p>hello</p></body></html>");
        let extractor = Extractor::new(DateParser::default());
        let extraction = extractor.extract(&doc);
        assert!(extraction.records.is_empty());
        assert!(extraction.errors.is_empty());
    }

    #[test]
    fn profile_pages_extract_nothing() {
        let doc = Html::parse_document(r#"<div id="punprofile" class="pun"><dl></dl></div>"#);
        let extractor = Extractor::new(DateParser::default());
        let extraction = extractor.extract(&doc);
        assert!(extraction.records.is_empty());
        assert!(extraction.errors.is_empty());
    }

    #[test]
    fn container_id_comes_from_page_links() {
        let doc = Html::parse_document(
            r#"<div id="punviewtopic" class="pun">
               <p class="pagelink"><a href="viewtopic.php?id=37&p=2">2</a></p>
               </div>"#,
        );
        let sel = Selector::parse(".pun").unwrap();
        let pun = doc.select(&sel).next().unwrap();
        assert_eq!(container_id(&pun), Some(37));
    }
}
