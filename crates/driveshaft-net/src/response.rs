//! Response model

use std::fmt;
use std::io::Read;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::NetError;

/// Response body, consumed at most once
pub enum ResponseBody {
    Bytes(Vec<u8>),
    /// Unread body; reading blocks, so it happens off the executor
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// HTTP Response
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    /// Final URL, after redirects
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<ResponseBody>,
}

impl Response {
    /// Build a fully buffered response
    pub fn new(status: u16, url: Url, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            url,
            headers: Vec::new(),
            body: Some(ResponseBody::Bytes(body.into())),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// First header value with the given name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if response is OK (2xx)
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the content type announces an HTML document
    pub fn is_html(&self) -> bool {
        self.content_type().is_some_and(is_html_content_type)
    }

    /// Whether the body has been consumed
    pub fn body_used(&self) -> bool {
        self.body.is_none()
    }

    /// Read the full body as text (lossy UTF-8)
    pub async fn text(&mut self) -> Result<String, NetError> {
        let bytes = match self.body.take().ok_or(NetError::BodyUsed)? {
            ResponseBody::Bytes(bytes) => bytes,
            ResponseBody::Stream(mut reader) => {
                smol::unblock(move || {
                    let mut buf = Vec::new();
                    reader.read_to_end(&mut buf).map(|_| buf)
                })
                .await?
            }
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

static HTML_CONTENT_TYPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:text/([^\s;,]+\b)?html|application/xhtml\+xml)\b").ok());

/// `text/html`, `text/<prefix>-html` style types and `application/xhtml+xml`.
///
/// A subtype matches when it is exactly `html` or ends in `html` after a
/// non-word character (`text/x-html`), followed by a parameter separator or
/// the end of the string. Matching is case-sensitive.
pub fn is_html_content_type(content_type: &str) -> bool {
    HTML_CONTENT_TYPE
        .as_ref()
        .is_some_and(|re| re.is_match(content_type))
}
