//! Request construction for intercepted navigations

use driveshaft_dom::{Document, FormData, FormEnctype};
use driveshaft_net::{AbortSignal, Credentials, Method, Request, RequestBody};
use url::Url;

use crate::navigation::NavigationSource;

/// Accept header sent with every navigation request
pub const ACCEPT_HTML: &str = "text/html, application/xhtml+xml";

/// Form field that overrides the submission method
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// A request bound to the element that triggered it and to the signal that
/// cancels it
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    pub source: NavigationSource,
    pub request: Request,
    pub signal: AbortSignal,
}

impl NavigationRequest {
    pub fn new(
        doc: &Document,
        source: NavigationSource,
        target: Url,
        form_data: Option<&FormData>,
        signal: AbortSignal,
    ) -> Self {
        Self {
            request: build_request(doc, &source, target, form_data),
            source,
            signal,
        }
    }
}

/// Build the request for navigating from `source` to `target`.
///
/// With `form_data` the method is the submitter's `formmethod`, else the
/// `_method` field, else the form's `method`, else POST. Values that name
/// no method are skipped. The body is multipart when the resolved enctype
/// says so and url-encoded otherwise, file entries dropped. Without it, a form's own fields are collected and
/// GET submissions fold them into the query string.
pub fn build_request(
    doc: &Document,
    source: &NavigationSource,
    target: Url,
    form_data: Option<&FormData>,
) -> Request {
    let tree = &doc.tree;
    let submitter = source.submitter();
    let form = source.form();
    let attr = |element: Option<_>, name| {
        element
            .and_then(|e| tree.get_attribute(e, name))
            .map(str::trim)
            .filter(|v: &&str| !v.is_empty())
    };

    let collected;
    let (fields, default_method) = match (form_data, form) {
        (Some(data), _) => (Some(data), Method::Post),
        (None, Some(form)) => {
            collected = FormData::from_form(tree, form, submitter);
            (Some(&collected), Method::Get)
        }
        (None, None) => (None, Method::Get),
    };

    let method = attr(submitter, "formmethod")
        .and_then(Method::parse)
        .or_else(|| form_data.and_then(|d| d.get(METHOD_OVERRIDE_FIELD)).and_then(Method::parse))
        .or_else(|| attr(form, "method").and_then(Method::parse))
        .unwrap_or(default_method);
    let enctype = attr(submitter, "formenctype")
        .or_else(|| attr(form, "enctype"))
        .map(FormEnctype::parse)
        .unwrap_or_default();

    let mut request = Request::new(method, target)
        .with_header("Accept", ACCEPT_HTML)
        .with_credentials(Credentials::SameOrigin)
        .with_referrer(doc.url().clone());

    if let Some(fields) = fields {
        if method.allows_body() {
            request = request.with_body(match enctype {
                FormEnctype::Multipart => RequestBody::Multipart(fields.clone()),
                FormEnctype::TextPlain => RequestBody::Text(fields.to_text_plain()),
                FormEnctype::UrlEncoded => RequestBody::UrlEncoded(fields.url_encoded_pairs()),
            });
        } else {
            let query = fields.to_url_encoded();
            request.url.set_query((!query.is_empty()).then_some(query.as_str()));
        }
    }
    request
}
