//! DriveShaft Networking
//!
//! Request/response model, the `HttpClient` seam with a reqwest-backed
//! implementation, and abort signals for cancelling in-flight requests.

mod abort;
mod client;
mod request;
mod response;

pub use abort::{AbortController, AbortSignal};
pub use client::{fetch, HttpClient, ReqwestClient};
pub use request::{Credentials, Method, Request, RequestBody};
pub use response::{is_html_content_type, Response, ResponseBody};
pub use url::Url;

/// Network error
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("request aborted")]
    Aborted,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("response body already consumed")]
    BodyUsed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
