//! Shared fixtures: an in-memory HTTP client and a recording host

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use driveshaft::dom::NodeId;
use driveshaft::net::{HttpClient, NetError, Request, Response};
use driveshaft::html::parse_document;
use driveshaft::{BrowserHost, Config, DriveShaft, NavigateEvent, NavigationOutcome};
use smol::channel::Receiver;
use url::Url;

pub const ORIGIN: &str = "https://example.test";

pub const PAGE_1: &str = r#"<!DOCTYPE html>
<html><head><title>Page 1</title><meta charset="utf-8"></head>
<body><h1>Page 1</h1><a id="next" href="/page-2.html">Next</a><a id="third" href="page-3.html">Third</a></body></html>"#;

pub const PAGE_2: &str = r#"<!DOCTYPE html>
<html><head><title>Page 2</title><meta charset="utf-8"></head>
<body><h1>Page 2</h1><a id="back" href="/index.html">Back</a></body></html>"#;

pub const PAGE_3: &str = r#"<!DOCTYPE html>
<html><head><title>Page 3</title></head><body><h1>Page 3</h1></body></html>"#;

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

#[derive(Clone)]
enum Route {
    Page {
        status: u16,
        content_type: String,
        body: String,
        final_path: Option<String>,
        gate: Option<Receiver<()>>,
    },
    Fail,
}

/// Serves canned responses keyed by path and records every request
#[derive(Default)]
pub struct MockClient {
    routes: RefCell<HashMap<String, Route>>,
    requests: RefCell<Vec<Request>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn html(self, path: &str, body: &str) -> Self {
        self.respond(path, 200, "text/html; charset=utf-8", body)
    }

    pub fn respond(self, path: &str, status: u16, content_type: &str, body: &str) -> Self {
        self.routes.borrow_mut().insert(
            path.to_string(),
            Route::Page {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
                final_path: None,
                gate: None,
            },
        );
        self
    }

    /// Answer `path` as if redirected to `final_path`
    pub fn redirect(self, path: &str, final_path: &str, body: &str) -> Self {
        let this = self.html(path, body);
        if let Some(Route::Page { final_path: fp, .. }) = this.routes.borrow_mut().get_mut(path) {
            *fp = Some(final_path.to_string());
        }
        this
    }

    /// Hold the response for `path` until `gate` yields or closes
    pub fn gated(self, path: &str, body: &str, gate: Receiver<()>) -> Self {
        let this = self.html(path, body);
        if let Some(Route::Page { gate: g, .. }) = this.routes.borrow_mut().get_mut(path) {
            *g = Some(gate);
        }
        this
    }

    pub fn fail(self, path: &str) -> Self {
        self.routes.borrow_mut().insert(path.to_string(), Route::Fail);
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }
}

impl HttpClient for MockClient {
    async fn send(&self, request: Request) -> Result<Response, NetError> {
        self.requests.borrow_mut().push(request.clone());
        let route = self.routes.borrow().get(request.url.path()).cloned();
        match route {
            Some(Route::Page {
                status,
                content_type,
                body,
                final_path,
                gate,
            }) => {
                if let Some(gate) = gate {
                    let _ = gate.recv().await;
                }
                let final_url = match final_path {
                    Some(path) => request.url.join(&path).unwrap(),
                    None => request.url.clone(),
                };
                Ok(Response::new(status, final_url, body).with_header("Content-Type", &content_type))
            }
            Some(Route::Fail) => Err(NetError::Transport("connection refused".into())),
            None => Ok(Response::new(404, request.url.clone(), "not found").with_header("Content-Type", "text/plain")),
        }
    }
}

/// Records every call DriveShaft makes into the host
#[derive(Default)]
pub struct RecordingHost {
    pub history: RefCell<Vec<Url>>,
    pub clicks: RefCell<Vec<NodeId>>,
    pub submits: RefCell<Vec<(NodeId, Option<NodeId>)>>,
    pub renders: RefCell<usize>,
}

impl BrowserHost for RecordingHost {
    fn push_history(&self, url: &Url) {
        self.history.borrow_mut().push(url.clone());
    }

    fn click(&self, anchor: NodeId) {
        self.clicks.borrow_mut().push(anchor);
    }

    fn submit(&self, form: NodeId, submitter: Option<NodeId>) {
        self.submits.borrow_mut().push((form, submitter));
    }

    async fn before_render(&self) {
        *self.renders.borrow_mut() += 1;
    }
}

pub type TestShaft = DriveShaft<RecordingHost, MockClient>;

/// A started instance whose live document is `html` at `/index.html`
pub fn started(html: &str, client: MockClient) -> TestShaft {
    let document = parse_document(html, &url("/index.html")).unwrap();
    let shaft = DriveShaft::new(document, RecordingHost::default(), client, &Config::default()).unwrap();
    shaft.start();
    shaft
}

pub fn element(shaft: &TestShaft, id: &str) -> NodeId {
    let document = shaft.document();
    let found = document.borrow().get_element_by_id(id);
    found.unwrap()
}

pub fn title(shaft: &TestShaft) -> String {
    let document = shaft.document();
    let title = document.borrow().title();
    title
}

pub fn current_url(shaft: &TestShaft) -> Url {
    let document = shaft.document();
    let url = document.borrow().url().clone();
    url
}

/// User click on the anchor with id `anchor_id`
pub fn click_event(shaft: &TestShaft, anchor_id: &str) -> NavigateEvent {
    let anchor = element(shaft, anchor_id);
    let document = shaft.document();
    let doc = document.borrow();
    let href = doc
        .tree
        .get_attribute(anchor, "href")
        .and_then(|h| doc.resolve_url(h))
        .unwrap();
    NavigateEvent::click(href, anchor)
}

/// Click `anchor_id` and drive the navigation to completion
pub fn click(shaft: &TestShaft, anchor_id: &str) -> Option<NavigationOutcome> {
    let interception = shaft.handle_navigate(click_event(shaft, anchor_id))?;
    Some(smol::block_on(interception.handler))
}
