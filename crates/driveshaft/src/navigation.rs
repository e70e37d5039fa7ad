//! Navigation interface
//!
//! Navigate events as delivered by the host, the interception decision and
//! the per-navigation state machine.

use std::fmt;

use driveshaft_dom::forms::form_owner;
use driveshaft_dom::{Document, DomTree, FormData, NodeId};
use driveshaft_net::AbortSignal;
use smol::future::BoxedLocal;
use url::Url;

/// Kind of history change a navigation performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationType {
    #[default]
    Push,
    Replace,
    Reload,
    Traverse,
}

/// A navigation about to happen, as reported by the host
#[derive(Debug, Clone)]
pub struct NavigateEvent {
    /// Where the host would navigate natively
    pub destination: Url,
    /// Caused by a user gesture
    pub user_initiated: bool,
    /// The host allows this navigation to be intercepted
    pub can_intercept: bool,
    /// Only the fragment changes
    pub hash_change: bool,
    /// Filename of a requested download (`<a download>`)
    pub download_request: Option<String>,
    /// Entries of a submitted form
    pub form_data: Option<FormData>,
    /// Activated anchor or submit button
    pub source_element: Option<NodeId>,
    /// Submitter of a form submission, when no source element is reported
    pub submitter: Option<NodeId>,
    /// Aborted when the host cancels the navigation
    pub signal: AbortSignal,
    pub navigation_type: NavigationType,
}

impl NavigateEvent {
    /// A navigation the host did not attribute to the user
    pub fn new(destination: Url) -> Self {
        Self {
            destination,
            user_initiated: false,
            can_intercept: true,
            hash_change: false,
            download_request: None,
            form_data: None,
            source_element: None,
            submitter: None,
            signal: AbortSignal::never(),
            navigation_type: NavigationType::Push,
        }
    }

    /// User activation of a link
    pub fn click(destination: Url, anchor: NodeId) -> Self {
        Self::new(destination).with_user_initiated(true).with_source(anchor)
    }

    /// User submission of a form through `submitter`
    pub fn submit(destination: Url, submitter: NodeId, form_data: FormData) -> Self {
        Self::new(destination)
            .with_user_initiated(true)
            .with_source(submitter)
            .with_form_data(form_data)
    }

    pub fn with_user_initiated(mut self, user_initiated: bool) -> Self {
        self.user_initiated = user_initiated;
        self
    }

    pub fn with_can_intercept(mut self, can_intercept: bool) -> Self {
        self.can_intercept = can_intercept;
        self
    }

    pub fn with_hash_change(mut self, hash_change: bool) -> Self {
        self.hash_change = hash_change;
        self
    }

    pub fn with_download(mut self, filename: impl Into<String>) -> Self {
        self.download_request = Some(filename.into());
        self
    }

    pub fn with_form_data(mut self, form_data: FormData) -> Self {
        self.form_data = Some(form_data);
        self
    }

    pub fn with_source(mut self, element: NodeId) -> Self {
        self.source_element = Some(element);
        self
    }

    pub fn with_submitter(mut self, submitter: NodeId) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_type(mut self, navigation_type: NavigationType) -> Self {
        self.navigation_type = navigation_type;
        self
    }

    /// The element that triggered the navigation
    pub fn trigger(&self) -> Option<NodeId> {
        self.source_element.or(self.submitter)
    }
}

/// Whether DriveShaft may take over `event`. Pure, evaluated before any
/// side effect.
pub fn should_intercept(event: &NavigateEvent) -> bool {
    event.user_initiated && event.can_intercept && !event.hash_change && event.download_request.is_none()
}

/// The element a navigation originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
    Anchor(NodeId),
    /// A submit button with its form owner
    Button { element: NodeId, form: Option<NodeId> },
    Form(NodeId),
}

impl NavigationSource {
    /// Classify `element`; `None` for elements that cannot navigate
    pub fn from_element(tree: &DomTree, element: NodeId) -> Option<Self> {
        match tree.tag_name(element)? {
            "a" | "area" => Some(Self::Anchor(element)),
            "button" => Some(Self::Button {
                element,
                form: form_owner(tree, element),
            }),
            "input"
                if tree
                    .get_attribute(element, "type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("submit") || t.eq_ignore_ascii_case("image")) =>
            {
                Some(Self::Button {
                    element,
                    form: form_owner(tree, element),
                })
            }
            "form" => Some(Self::Form(element)),
            _ => None,
        }
    }

    pub fn element(&self) -> NodeId {
        match *self {
            Self::Anchor(element) | Self::Button { element, .. } | Self::Form(element) => element,
        }
    }

    /// The form being submitted, if any
    pub fn form(&self) -> Option<NodeId> {
        match *self {
            Self::Anchor(_) => None,
            Self::Button { form, .. } => form,
            Self::Form(form) => Some(form),
        }
    }

    /// The element whose attributes override the form's (`formmethod`,
    /// `formenctype`)
    pub fn submitter(&self) -> Option<NodeId> {
        match *self {
            Self::Button { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Target URL: the anchor's href, else the button's `formaction`, else
    /// the owning form's action. `None` means the navigation is left alone.
    pub fn resolve_location(&self, doc: &Document) -> Option<Url> {
        let attr = |element, name| doc.tree.get_attribute(element, name).filter(|v| !v.trim().is_empty());
        match *self {
            Self::Anchor(a) => attr(a, "href").and_then(|href| doc.resolve_url(href)),
            Self::Button { element, form } => match attr(element, "formaction") {
                Some(action) => doc.resolve_url(action),
                None => form.and_then(|f| form_action(doc, f)),
            },
            Self::Form(form) => form_action(doc, form),
        }
    }
}

/// A form's action, defaulting to the document URL like browsers do
fn form_action(doc: &Document, form: NodeId) -> Option<Url> {
    match doc.tree.get_attribute(form, "action").map(str::trim) {
        Some(action) if !action.is_empty() => doc.resolve_url(action),
        _ => Some(doc.url().clone()),
    }
}

/// Where a navigation is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationState {
    #[default]
    Idle,
    InterceptDecision,
    Dispatching,
    Reconciling,
    Committed,
    Failed,
    FallbackTriggered,
    Cancelled,
}

/// How an intercepted navigation settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Reconciled. History was pushed iff the URL changed.
    Committed { url: Url, history_pushed: bool },
    /// The response was not HTML and was left unconsumed
    NotRendered { status: u16 },
    /// The markup could not be parsed; the document is untouched
    RenderFailed,
    /// Transport failure, the native action was re-invoked
    FallbackTriggered,
    /// Superseded or aborted before committing
    Cancelled,
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

impl fmt::Display for NavigationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed { url, history_pushed: true } => write!(f, "committed {url}"),
            Self::Committed { url, history_pushed: false } => write!(f, "committed {url} (no history entry)"),
            Self::NotRendered { status } => write!(f, "not rendered (status {status})"),
            Self::RenderFailed => f.write_str("render failed"),
            Self::FallbackTriggered => f.write_str("fell back to native navigation"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// When the host restores focus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusReset {
    #[default]
    AfterTransition,
    Manual,
}

/// When the host restores scroll position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollBehavior {
    #[default]
    AfterTransition,
    Manual,
}

/// Returned to the host for an intercepted navigation. The host drives
/// `handler` to completion.
pub struct Interception {
    pub handler: BoxedLocal<NavigationOutcome>,
    pub focus_reset: FocusReset,
    pub scroll: ScrollBehavior,
}

impl fmt::Debug for Interception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interception")
            .field("focus_reset", &self.focus_reset)
            .field("scroll", &self.scroll)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use driveshaft_html::parse_document;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn page(body: &str) -> Document {
        parse_document(&format!("<body>{body}</body>"), &url("https://example.test/dir/index.html")).unwrap()
    }

    #[test]
    fn test_should_intercept() {
        let dest = url("https://example.test/a");
        let base = NavigateEvent::click(dest.clone(), NodeId::ROOT);
        assert!(should_intercept(&base));
        assert!(!should_intercept(&NavigateEvent::new(dest.clone())));
        assert!(!should_intercept(&base.clone().with_can_intercept(false)));
        assert!(!should_intercept(&base.clone().with_hash_change(true)));
        assert!(!should_intercept(&base.with_download("a.pdf")));
    }

    #[test]
    fn test_classify_elements() {
        let doc = page(
            "<a href=/x>x</a><form id=f><button>go</button><input type=submit><input name=q></form><p>p</p>",
        );
        let body = doc.body().unwrap();
        let children = doc.tree.element_children(body);
        let (a, form, p) = (children[0], children[1], children[2]);
        let controls = doc.tree.element_children(form);

        assert_eq!(NavigationSource::from_element(&doc.tree, a), Some(NavigationSource::Anchor(a)));
        assert_eq!(
            NavigationSource::from_element(&doc.tree, controls[0]),
            Some(NavigationSource::Button { element: controls[0], form: Some(form) })
        );
        assert_eq!(
            NavigationSource::from_element(&doc.tree, controls[1]).and_then(|s| s.form()),
            Some(form)
        );
        assert_eq!(NavigationSource::from_element(&doc.tree, controls[2]), None);
        assert_eq!(NavigationSource::from_element(&doc.tree, form), Some(NavigationSource::Form(form)));
        assert_eq!(NavigationSource::from_element(&doc.tree, p), None);
    }

    #[test]
    fn test_resolve_location_precedence() {
        let doc = page(
            "<a href=page-2.html>2</a><a>none</a>\
             <form action=/submit><button formaction=/override>a</button><button>b</button></form>\
             <form><button>c</button></form>",
        );
        let body = doc.body().unwrap();
        let children = doc.tree.element_children(body);
        let source = |id| NavigationSource::from_element(&doc.tree, id).unwrap();

        assert_eq!(
            source(children[0]).resolve_location(&doc),
            Some(url("https://example.test/dir/page-2.html"))
        );
        assert_eq!(source(children[1]).resolve_location(&doc), None);

        let buttons = doc.tree.element_children(children[2]);
        assert_eq!(
            source(buttons[0]).resolve_location(&doc),
            Some(url("https://example.test/override"))
        );
        assert_eq!(source(buttons[1]).resolve_location(&doc), Some(url("https://example.test/submit")));

        let bare = doc.tree.element_children(children[3])[0];
        assert_eq!(source(bare).resolve_location(&doc), Some(doc.url().clone()));
    }

    #[test]
    fn test_outcome_display() {
        let outcome = NavigationOutcome::Committed {
            url: url("https://example.test/b"),
            history_pushed: true,
        };
        assert!(outcome.is_committed());
        assert_eq!(outcome.to_string(), "committed https://example.test/b");
        assert_eq!(NavigationOutcome::NotRendered { status: 204 }.to_string(), "not rendered (status 204)");
    }
}
