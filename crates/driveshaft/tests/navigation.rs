//! Navigation tests for driveshaft
//!
//! Interception decisions, request dispatch, fallbacks, single-flight
//! cancellation and the history rule, against an in-memory client.

mod common;

use common::*;
use driveshaft::dom::FormData;
use driveshaft::net::{AbortController, AbortSignal, Credentials, Method, RequestBody};
use driveshaft::{NavigateEvent, NavigationOutcome, NavigationRequest, NavigationSource, NavigationState};
use smol::LocalExecutor;

const LINKS: &str = r#"<!DOCTYPE html>
<html><head><title>Links</title></head><body>
<a id="next" href="/page-2.html">Next</a>
<a id="frag" href="/page-2.html#details">Details</a>
<a id="old" href="/old.html">Moved</a>
<a id="data" href="/data.json">Data</a>
<a id="frames" href="/frames.html">Frames</a>
<a id="missing" href="/missing.html">Missing</a>
<a id="ext" href="https://other.test/page">Elsewhere</a>
<a id="self" href="/index.html">Reload</a>
</body></html>"#;

const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Edit</title></head><body>
<form id="edit" action="/things/1" method="post" enctype="multipart/form-data">
<input name="title" value="x"><button id="save">Save</button>
</form></body></html>"#;

// ============================================================================
// SUCCESSFUL NAVIGATION
// ============================================================================

#[test]
fn test_link_to_page_2() {
    let shaft = started(PAGE_1, MockClient::new().html("/page-2.html", PAGE_2));
    let outcome = click(&shaft, "next").unwrap();

    assert_eq!(
        outcome,
        NavigationOutcome::Committed {
            url: url("/page-2.html"),
            history_pushed: true
        }
    );
    assert_eq!(title(&shaft), "Page 2");
    assert_eq!(current_url(&shaft), url("/page-2.html"));
    assert_eq!(*shaft.host().history.borrow(), vec![url("/page-2.html")]);
    assert!(shaft.host().clicks.borrow().is_empty());
    assert_eq!(*shaft.host().renders.borrow(), 1);
    assert_eq!(shaft.state(), NavigationState::Committed);

    let requests = shaft.client().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].referrer, Some(url("/index.html")));
    assert_eq!(requests[0].credentials, Credentials::SameOrigin);
}

#[test]
fn test_relative_link_resolves_against_document() {
    let shaft = started(PAGE_1, MockClient::new().html("/page-3.html", PAGE_3));
    click(&shaft, "third").unwrap();
    assert_eq!(current_url(&shaft), url("/page-3.html"));
    assert_eq!(title(&shaft), "Page 3");
}

#[test]
fn test_multipart_post_with_method_override() {
    let shaft = started(FORM_PAGE, MockClient::new().html("/things/1", PAGE_2));
    let save = element(&shaft, "save");
    let mut data = FormData::new();
    data.append("_method", "patch");
    data.append("title", "x");

    let interception = shaft
        .handle_navigate(NavigateEvent::submit(url("/things/1"), save, data.clone()))
        .unwrap();
    let outcome = smol::block_on(interception.handler);
    assert!(outcome.is_committed());

    let requests = shaft.client().requests();
    assert_eq!(requests[0].method, Method::Patch);
    assert_eq!(requests[0].body, Some(RequestBody::Multipart(data)));
    assert_eq!(requests[0].url, url("/things/1"));
}

#[test]
fn test_html_error_page_still_renders() {
    let shaft = started(LINKS, MockClient::new().respond("/missing.html", 404, "text/html", PAGE_3));
    let outcome = click(&shaft, "missing").unwrap();
    assert!(outcome.is_committed());
    assert_eq!(title(&shaft), "Page 3");
}

// ============================================================================
// HISTORY RULE
// ============================================================================

#[test]
fn test_same_url_does_not_push_history() {
    let shaft = started(LINKS, MockClient::new().html("/index.html", PAGE_1));
    let outcome = click(&shaft, "self").unwrap();
    assert_eq!(
        outcome,
        NavigationOutcome::Committed {
            url: url("/index.html"),
            history_pushed: false
        }
    );
    assert!(shaft.host().history.borrow().is_empty());
    assert_eq!(title(&shaft), "Page 1");
}

#[test]
fn test_redirect_pushes_final_url() {
    let shaft = started(LINKS, MockClient::new().redirect("/old.html", "/page-2.html", PAGE_2));
    click(&shaft, "old").unwrap();
    assert_eq!(current_url(&shaft), url("/page-2.html"));
    assert_eq!(*shaft.host().history.borrow(), vec![url("/page-2.html")]);
}

#[test]
fn test_fragment_carried_to_final_url() {
    let shaft = started(LINKS, MockClient::new().html("/page-2.html", PAGE_2));
    click(&shaft, "frag").unwrap();
    assert_eq!(current_url(&shaft), url("/page-2.html#details"));
    assert_eq!(*shaft.host().history.borrow(), vec![url("/page-2.html#details")]);
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_network_error_clicks_once() {
    let shaft = started(PAGE_1, MockClient::new().fail("/page-2.html"));
    let next = element(&shaft, "next");

    assert_eq!(click(&shaft, "next"), Some(NavigationOutcome::FallbackTriggered));
    assert_eq!(*shaft.host().clicks.borrow(), vec![next]);
    assert!(shaft.host().history.borrow().is_empty());
    assert_eq!(title(&shaft), "Page 1");
    assert_eq!(shaft.state(), NavigationState::FallbackTriggered);

    // The native click that follows is not intercepted again
    assert_eq!(click(&shaft, "next"), None);
    assert_eq!(shaft.host().clicks.borrow().len(), 1);
    assert_eq!(shaft.client().requests().len(), 1);
    assert!(!shaft.will_intercept_link(next));
    assert!(shaft.will_intercept_link(element(&shaft, "third")));
}

#[test]
fn test_fallback_marks_dropped_once_element_is_replaced() {
    let client = MockClient::new().fail("/page-2.html").html("/page-3.html", PAGE_3);
    let shaft = started(PAGE_1, client);
    let next = element(&shaft, "next");

    assert_eq!(click(&shaft, "next"), Some(NavigationOutcome::FallbackTriggered));
    assert_eq!(shaft.fallback_count(), 1);

    assert!(click(&shaft, "third").unwrap().is_committed());
    assert_eq!(title(&shaft), "Page 3");
    assert!(shaft.document().borrow().tree.get(next).is_none());
    assert_eq!(shaft.fallback_count(), 0);
}

#[test]
fn test_dispatch_falls_back_on_transport_error() {
    let shaft = started(PAGE_1, MockClient::new().fail("/page-2.html"));
    let next = element(&shaft, "next");
    let navigation = {
        let document = shaft.document();
        let doc = document.borrow();
        let source = NavigationSource::from_element(&doc.tree, next).unwrap();
        NavigationRequest::new(&doc, source, url("/page-2.html"), None, AbortSignal::never())
    };

    assert!(smol::block_on(shaft.dispatch(&navigation)).is_none());
    assert_eq!(shaft.client().requests()[0], navigation.request);
    assert_eq!(*shaft.host().clicks.borrow(), vec![next]);
    assert_eq!(shaft.fallback_count(), 1);
    assert!(!shaft.will_intercept_link(next));
}

#[test]
fn test_network_error_on_submit_resubmits_form() {
    let shaft = started(FORM_PAGE, MockClient::new().fail("/things/1"));
    let (form, save) = (element(&shaft, "edit"), element(&shaft, "save"));
    let mut data = FormData::new();
    data.append("title", "x");

    let interception = shaft
        .handle_navigate(NavigateEvent::submit(url("/things/1"), save, data))
        .unwrap();
    assert_eq!(smol::block_on(interception.handler), NavigationOutcome::FallbackTriggered);
    assert_eq!(*shaft.host().submits.borrow(), vec![(form, Some(save))]);
    assert!(shaft.host().clicks.borrow().is_empty());
}

#[test]
fn test_non_html_response_is_not_rendered() {
    let shaft = started(LINKS, MockClient::new().respond("/data.json", 200, "application/json", "{}"));
    assert_eq!(click(&shaft, "data"), Some(NavigationOutcome::NotRendered { status: 200 }));
    assert_eq!(title(&shaft), "Links");
    assert_eq!(current_url(&shaft), url("/index.html"));
    assert!(shaft.host().history.borrow().is_empty());
    assert!(shaft.host().clicks.borrow().is_empty());
}

#[test]
fn test_unparseable_response_leaves_document_untouched() {
    let frames = "<html><head><title>Frames</title></head><frameset><frame src=a.html></frameset></html>";
    let shaft = started(LINKS, MockClient::new().html("/frames.html", frames));
    let before = {
        let document = shaft.document();
        let doc = document.borrow();
        doc.tree.len()
    };

    assert_eq!(click(&shaft, "frames"), Some(NavigationOutcome::RenderFailed));
    assert_eq!(title(&shaft), "Links");
    assert_eq!(current_url(&shaft), url("/index.html"));
    assert_eq!(shaft.document().borrow().tree.len(), before);
    assert!(shaft.host().history.borrow().is_empty());
    assert!(shaft.host().clicks.borrow().is_empty());
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_newer_navigation_cancels_pending_one() {
    let (release, gate) = smol::channel::bounded::<()>(1);
    let client = MockClient::new()
        .gated("/page-2.html", PAGE_2, gate)
        .html("/page-3.html", PAGE_3);
    let shaft = started(PAGE_1, client);
    let executor = LocalExecutor::new();

    let first = shaft.handle_navigate(click_event(&shaft, "next")).unwrap();
    let first = executor.spawn(first.handler);
    while executor.try_tick() {}
    assert_eq!(shaft.client().requests().len(), 1);

    let second = shaft.handle_navigate(click_event(&shaft, "third")).unwrap();
    let (first, second) = smol::block_on(executor.run(async {
        let second = second.handler.await;
        (first.await, second)
    }));

    assert_eq!(first, NavigationOutcome::Cancelled);
    assert!(second.is_committed());
    assert_eq!(title(&shaft), "Page 3");
    assert_eq!(*shaft.host().history.borrow(), vec![url("/page-3.html")]);
    assert!(shaft.host().clicks.borrow().is_empty());
    assert_eq!(shaft.state(), NavigationState::Committed);
    drop(release);
}

#[test]
fn test_host_abort_cancels_without_fallback() {
    let shaft = started(PAGE_1, MockClient::new().html("/page-2.html", PAGE_2));
    let controller = AbortController::new();
    let event = click_event(&shaft, "next").with_signal(controller.signal());

    let interception = shaft.handle_navigate(event).unwrap();
    controller.abort();
    assert_eq!(smol::block_on(interception.handler), NavigationOutcome::Cancelled);
    assert!(shaft.client().requests().is_empty());
    assert!(shaft.host().clicks.borrow().is_empty());
    assert_eq!(title(&shaft), "Page 1");
}

// ============================================================================
// INTERCEPTION DECISION
// ============================================================================

#[test]
fn test_declined_navigations() {
    let shaft = started(LINKS, MockClient::new().html("/page-2.html", PAGE_2));
    let event = click_event(&shaft, "next");

    assert!(shaft.handle_navigate(event.clone().with_user_initiated(false)).is_none());
    assert!(shaft.handle_navigate(event.clone().with_can_intercept(false)).is_none());
    assert!(shaft.handle_navigate(event.clone().with_hash_change(true)).is_none());
    assert!(shaft.handle_navigate(event.clone().with_download("page-2.html")).is_none());
    assert!(shaft.handle_navigate(NavigateEvent::new(url("/page-2.html")).with_user_initiated(true)).is_none());
    assert!(shaft.handle_navigate(click_event(&shaft, "ext")).is_none());
    assert!(!shaft.will_intercept_link(element(&shaft, "ext")));
    assert!(shaft.client().requests().is_empty());

    assert!(shaft.handle_navigate(event).is_some());
}

#[test]
fn test_start_stop_idempotent() {
    let shaft = started(PAGE_1, MockClient::new().html("/page-2.html", PAGE_2));
    shaft.start();
    assert!(shaft.is_started());

    shaft.stop();
    shaft.stop();
    assert!(!shaft.is_started());
    assert!(shaft.handle_navigate(click_event(&shaft, "next")).is_none());
    assert!(!shaft.will_intercept_link(element(&shaft, "next")));

    shaft.start();
    assert_eq!(click(&shaft, "next").map(|o| o.is_committed()), Some(true));
}
