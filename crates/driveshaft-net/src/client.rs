//! HTTP clients
//!
//! `HttpClient` is the seam between the navigation pipeline and the network.
//! `ReqwestClient` drives reqwest's blocking client on smol's blocking pool.

use std::future::Future;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{CONTENT_TYPE, REFERER};
use url::form_urlencoded;

use crate::{AbortSignal, NetError, Request, RequestBody, Response, ResponseBody};
use driveshaft_dom::{FormData, FormDataValue};

const USER_AGENT: &str = concat!("DriveShaft/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// Something that can perform an HTTP request
pub trait HttpClient {
    /// Send a request, following redirects. The returned response carries
    /// the final URL.
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, NetError>>;
}

/// Send `request` unless `signal` aborts first.
///
/// Abort wins ties: an already-aborted signal never starts the request.
pub async fn fetch<C: HttpClient>(
    client: &C,
    request: Request,
    signal: &AbortSignal,
) -> Result<Response, NetError> {
    if signal.is_aborted() {
        return Err(NetError::Aborted);
    }
    tracing::debug!(method = %request.method, url = %request.url, "fetch");
    smol::future::or(
        async {
            signal.aborted().await;
            Err(NetError::Aborted)
        },
        client.send(request),
    )
    .await
}

/// reqwest-backed client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    /// Shares a cookie jar across requests
    with_cookies: reqwest::blocking::Client,
    anonymous: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, NetError> {
        Self::with_timeout(None)
    }

    /// Client with an overall per-request timeout
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, NetError> {
        let build = |cookies: bool| {
            reqwest::blocking::Client::builder()
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
                .cookie_store(cookies)
                .timeout(timeout)
                .build()
                .map_err(transport)
        };
        Ok(Self {
            with_cookies: build(true)?,
            anonymous: build(false)?,
        })
    }
}

impl HttpClient for ReqwestClient {
    async fn send(&self, request: Request) -> Result<Response, NetError> {
        let client = if request.sends_cookies() {
            self.with_cookies.clone()
        } else {
            self.anonymous.clone()
        };
        smol::unblock(move || send_blocking(&client, request)).await
    }
}

fn transport(err: reqwest::Error) -> NetError {
    NetError::Transport(err.to_string())
}

fn send_blocking(client: &reqwest::blocking::Client, request: Request) -> Result<Response, NetError> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| NetError::Transport(e.to_string()))?;
    let mut builder = client.request(method, request.url.clone());

    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(referrer) = &request.referrer {
        builder = builder.header(REFERER, referrer.as_str());
    }

    if let Some(body) = request.body {
        if let Some(content_type) = body.content_type() {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder = match body {
            RequestBody::UrlEncoded(pairs) => builder.body(
                form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish(),
            ),
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Multipart(data) => builder.multipart(multipart_form(&data)?),
        };
    }

    let response = builder.send().map_err(transport)?;
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();

    Ok(Response {
        status: response.status().as_u16(),
        url: response.url().clone(),
        headers,
        body: Some(ResponseBody::Stream(Box::new(response))),
    })
}

fn multipart_form(data: &FormData) -> Result<Form, NetError> {
    let mut form = Form::new();
    for (name, value) in data.entries() {
        form = match value {
            FormDataValue::Text(text) => form.text(name.to_string(), text.clone()),
            FormDataValue::File {
                name: file_name,
                content,
                mime_type,
            } => {
                let part = Part::bytes(content.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime_type)
                    .map_err(transport)?;
                form.part(name.to_string(), part)
            }
        };
    }
    Ok(form)
}
