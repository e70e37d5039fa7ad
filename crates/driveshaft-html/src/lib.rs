//! DriveShaft HTML
//!
//! HTML5 parsing (via html5ever) into the DriveShaft DOM, and
//! serialization back to markup.

mod parser;
mod serializer;

pub use parser::HtmlParser;
pub use serializer::{escape_attribute, escape_text, HtmlSerializer};

use driveshaft_dom::{Document, DomError};
use url::Url;

/// Parse a full HTML document fetched from `url`
pub fn parse_document(html: &str, url: &Url) -> Result<Document, ParseError> {
    HtmlParser::new().parse_with_url(html, url)
}

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read markup: {0}")]
    Io(#[from] std::io::Error),

    #[error("document has no <head>")]
    MissingHead,

    #[error("document has no <body>")]
    MissingBody,

    #[error("tree construction failed: {0}")]
    Dom(#[from] DomError),
}
