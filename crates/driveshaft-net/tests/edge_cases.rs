//! Edge case tests for driveshaft-net
//!
//! Request builders, response handling and abort races.

use std::cell::RefCell;

use driveshaft_dom::FormData;
use driveshaft_net::*;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

// ============================================================================
// REQUEST BUILDER TESTS
// ============================================================================

#[test]
fn test_request_get() {
    let req = Request::get(url("https://example.com"));
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.url.as_str(), "https://example.com/");
    assert!(req.headers.is_empty());
    assert!(req.body.is_none());
    assert_eq!(req.credentials, Credentials::SameOrigin);
}

#[test]
fn test_request_with_multipart_body() {
    let mut data = FormData::new();
    data.append("name", "value");
    let req = Request::post(url("https://example.com/upload"))
        .with_body(RequestBody::Multipart(data.clone()));
    assert_eq!(req.body, Some(RequestBody::Multipart(data)));
    assert_eq!(req.body.unwrap().content_type(), None);
}

#[test]
fn test_request_body_content_types() {
    assert_eq!(
        RequestBody::UrlEncoded(Vec::new()).content_type(),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(
        RequestBody::Text(String::new()).content_type(),
        Some("text/plain;charset=UTF-8")
    );
}

#[test]
fn test_all_methods_roundtrip_names() {
    for m in [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ] {
        assert_eq!(Method::parse(m.as_str()), Some(m));
        assert_eq!(Method::parse(&m.as_str().to_lowercase()), Some(m));
    }
}

// ============================================================================
// RESPONSE TESTS
// ============================================================================

#[test]
fn test_response_header_case() {
    let res = Response::new(200, url("https://a.test/"), "")
        .with_header("CONTENT-TYPE", "text/html; charset=utf-8");
    assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
    assert!(res.is_html());
    assert!(res.ok());
}

#[test]
fn test_response_without_content_type_is_not_html() {
    let res = Response::new(200, url("https://a.test/"), "<html></html>");
    assert!(!res.is_html());
}

#[test]
fn test_invalid_utf8_is_lossy() {
    let mut res = Response::new(200, url("https://a.test/"), vec![b'a', 0xff, b'b']);
    let text = smol::block_on(res.text()).unwrap();
    assert_eq!(text, "a\u{fffd}b");
}

// ============================================================================
// FETCH / ABORT TESTS
// ============================================================================

struct Recording {
    seen: RefCell<Vec<Request>>,
}

impl HttpClient for Recording {
    async fn send(&self, request: Request) -> Result<Response, NetError> {
        let url = request.url.clone();
        self.seen.borrow_mut().push(request);
        Ok(Response::new(200, url, "").with_header("Content-Type", "text/html"))
    }
}

#[test]
fn test_fetch_passes_request_through() {
    let client = Recording {
        seen: RefCell::new(Vec::new()),
    };
    let req = Request::get(url("https://a.test/x"))
        .with_referrer(url("https://a.test/"))
        .with_header("Accept", "text/html");
    let res = smol::block_on(fetch(&client, req.clone(), &AbortSignal::never())).unwrap();
    assert_eq!(res.url, req.url);
    assert_eq!(client.seen.borrow().as_slice(), &[req]);
}

#[test]
fn test_abort_after_completion_is_harmless() {
    let client = Recording {
        seen: RefCell::new(Vec::new()),
    };
    let controller = AbortController::new();
    let res = smol::block_on(fetch(&client, Request::get(url("https://a.test/")), &controller.signal()));
    controller.abort();
    assert!(res.is_ok());
    assert!(controller.is_aborted());
}

#[test]
fn test_any_signal_with_aborted_member() {
    let a = AbortController::new();
    a.abort();
    let merged = AbortSignal::any([&AbortSignal::never(), &a.signal()]);
    assert!(merged.is_aborted());
}
