//! Navigation dispatcher
//!
//! Decides whether a navigation is taken over, performs the request,
//! hands HTML responses to the replacer and keeps history in step. Every
//! intercepted navigation settles as exactly one [`NavigationOutcome`].

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use driveshaft_dom::{Document, NodeId};
use driveshaft_html::parse_document;
use driveshaft_net::{fetch, AbortController, AbortSignal, HttpClient, NetError, Response};
use smol::future::FutureExt;
use url::Url;

use crate::config::{Config, ConfigError};
use crate::host::BrowserHost;
use crate::navigation::{
    should_intercept, FocusReset, Interception, NavigateEvent, NavigationOutcome, NavigationSource,
    NavigationState, ScrollBehavior,
};
use crate::replacer::{RenderReport, ReplaceError, ReplaceStrategy, Replacer};
use crate::request::NavigationRequest;

/// The single navigation allowed in flight
struct InFlightNavigation {
    id: u64,
    controller: AbortController,
}

struct Inner<H, C> {
    document: Rc<RefCell<Document>>,
    host: H,
    client: C,
    replacer: Replacer,
    strategy: RefCell<ReplaceStrategy>,
    started: Cell<bool>,
    in_flight: RefCell<Option<InFlightNavigation>>,
    next_id: Cell<u64>,
    /// Elements that already fell back to native navigation
    failed: RefCell<HashSet<NodeId>>,
    state: Cell<NavigationState>,
}

/// Intercepts navigations on one document. Cheap to clone; clones share
/// all state.
pub struct DriveShaft<H, C> {
    inner: Rc<Inner<H, C>>,
}

impl<H, C> Clone for DriveShaft<H, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H, C> DriveShaft<H, C>
where
    H: BrowserHost + 'static,
    C: HttpClient + 'static,
{
    pub fn new(document: Document, host: H, client: C, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Rc::new(Inner {
                document: Rc::new(RefCell::new(document)),
                host,
                client,
                replacer: Replacer::new(config)?,
                strategy: RefCell::new(ReplaceStrategy::Default),
                started: Cell::new(false),
                in_flight: RefCell::new(None),
                next_id: Cell::new(0),
                failed: RefCell::new(HashSet::new()),
                state: Cell::new(NavigationState::Idle),
            }),
        })
    }

    pub fn with_replace_strategy(self, strategy: ReplaceStrategy) -> Self {
        self.set_replace_strategy(strategy);
        self
    }

    pub fn set_replace_strategy(&self, strategy: ReplaceStrategy) {
        *self.inner.strategy.borrow_mut() = strategy;
    }

    /// Begin intercepting. Idempotent.
    pub fn start(&self) {
        if !self.inner.started.replace(true) {
            tracing::debug!("driveshaft started");
        }
    }

    /// Stop intercepting. Idempotent; an in-flight navigation is left to
    /// settle.
    pub fn stop(&self) {
        if self.inner.started.replace(false) {
            tracing::debug!("driveshaft stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    /// State of the most recent navigation
    pub fn state(&self) -> NavigationState {
        self.inner.state.get()
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn client(&self) -> &C {
        &self.inner.client
    }

    /// The live document. Never hold a borrow across an await.
    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.inner.document)
    }

    /// Navigate listener. Returns the interception when DriveShaft takes
    /// the navigation over, `None` to let the host proceed natively.
    pub fn handle_navigate(&self, event: NavigateEvent) -> Option<Interception> {
        if !self.is_started() || !should_intercept(&event) {
            return None;
        }
        let trigger = event.trigger()?;

        let controller = AbortController::new();
        let signal = AbortSignal::any([&event.signal, &controller.signal()]);
        let navigation = {
            let doc = self.inner.document.borrow();
            let source = NavigationSource::from_element(&doc.tree, trigger)?;
            if self.has_failed(&source) {
                tracing::debug!(element = ?trigger, "element already fell back, not intercepting");
                return None;
            }
            let target = source.resolve_location(&doc)?;
            if !same_host(&target, doc.url()) {
                return None;
            }
            NavigationRequest::new(&doc, source, target, event.form_data.as_ref(), signal)
        };

        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        let previous = self
            .inner
            .in_flight
            .borrow_mut()
            .replace(InFlightNavigation { id, controller });
        if let Some(previous) = previous {
            tracing::debug!(superseded = previous.id, by = id, "cancelling previous navigation");
            previous.controller.abort();
        }
        self.inner.state.set(NavigationState::InterceptDecision);

        let this = self.clone();
        let handler = async move { this.navigate(id, navigation).await }.boxed_local();
        Some(Interception {
            handler,
            focus_reset: FocusReset::AfterTransition,
            scroll: ScrollBehavior::AfterTransition,
        })
    }

    /// Whether clicks on `element` would be intercepted. Veto hook for link
    /// activation observers.
    pub fn will_intercept_link(&self, element: NodeId) -> bool {
        if !self.is_started() {
            return false;
        }
        let doc = self.inner.document.borrow();
        let Some(source @ NavigationSource::Anchor(_)) = NavigationSource::from_element(&doc.tree, element) else {
            return false;
        };
        !self.has_failed(&source)
            && source
                .resolve_location(&doc)
                .is_some_and(|target| same_host(&target, doc.url()))
    }

    /// Send the request for a navigation. Transport failures trigger the
    /// fallback and, like aborts, yield `None`.
    pub async fn dispatch(&self, navigation: &NavigationRequest) -> Option<Response> {
        let request = navigation.request.clone();
        let (method, url) = (request.method, request.url.clone());

        match fetch(&self.inner.client, request, &navigation.signal).await {
            Ok(response) => {
                tracing::debug!(%url, %method, status = response.status, "response received");
                Some(response)
            }
            Err(NetError::Aborted) => {
                tracing::debug!(%url, %method, "request aborted");
                None
            }
            Err(error) => {
                tracing::warn!(%url, %method, %error, "request failed, falling back to native navigation");
                self.fallback(&navigation.source);
                None
            }
        }
    }

    /// Mark `source` (and the form a button submits) as not to be
    /// intercepted again, then re-invoke the native action. Returns `false`
    /// if the element already fell back.
    pub fn fallback(&self, source: &NavigationSource) -> bool {
        {
            let mut failed = self.inner.failed.borrow_mut();
            if !failed.insert(source.element()) {
                return false;
            }
            if let Some(form) = source.form() {
                failed.insert(form);
            }
        }

        let host = &self.inner.host;
        match *source {
            NavigationSource::Anchor(anchor) => host.click(anchor),
            NavigationSource::Button { element, form: Some(form) } => host.submit(form, Some(element)),
            NavigationSource::Button { element, form: None } => host.click(element),
            NavigationSource::Form(form) => host.submit(form, None),
        }
        true
    }

    /// Parse `html` against the current URL and apply it with `strategy`,
    /// or the instance's strategy when `None`
    pub fn replace_with_new_html(
        &self,
        html: &str,
        strategy: Option<&ReplaceStrategy>,
    ) -> Result<Option<RenderReport>, ReplaceError> {
        let strategy = match strategy {
            Some(strategy) => strategy.clone(),
            None => self.inner.strategy.borrow().clone(),
        };
        let mut doc = self.inner.document.borrow_mut();
        let incoming = parse_document(html, doc.url())?;
        self.inner.replacer.apply(&strategy, &mut doc, incoming)
    }

    /// Number of elements currently barred from interception after a
    /// fallback
    pub fn fallback_count(&self) -> usize {
        self.inner.failed.borrow().len()
    }

    /// Forget fallback marks of elements no longer in the document
    fn prune_failed(&self) {
        let document = self.inner.document.borrow();
        self.inner
            .failed
            .borrow_mut()
            .retain(|&element| document.tree.get(element).is_some());
    }

    fn has_failed(&self, source: &NavigationSource) -> bool {
        let failed = self.inner.failed.borrow();
        failed.contains(&source.element()) || source.form().is_some_and(|f| failed.contains(&f))
    }

    fn is_current(&self, id: u64) -> bool {
        self.inner.in_flight.borrow().as_ref().is_some_and(|n| n.id == id)
    }

    fn set_state(&self, id: u64, state: NavigationState) {
        if self.is_current(id) {
            tracing::trace!(navigation = id, ?state, "navigation state");
            self.inner.state.set(state);
        }
    }

    fn settle(&self, id: u64, state: NavigationState, outcome: NavigationOutcome) -> NavigationOutcome {
        self.set_state(id, state);
        let mut in_flight = self.inner.in_flight.borrow_mut();
        if in_flight.as_ref().is_some_and(|n| n.id == id) {
            *in_flight = None;
        }
        outcome
    }

    async fn navigate(&self, id: u64, navigation: NavigationRequest) -> NavigationOutcome {
        let signal = &navigation.signal;
        let cancelled = || self.settle(id, NavigationState::Cancelled, NavigationOutcome::Cancelled);
        let before = self.inner.document.borrow().url().clone();
        self.set_state(id, NavigationState::Dispatching);

        let Some(mut response) = self.dispatch(&navigation).await else {
            if signal.is_aborted() {
                return cancelled();
            }
            self.set_state(id, NavigationState::Failed);
            return self.settle(id, NavigationState::FallbackTriggered, NavigationOutcome::FallbackTriggered);
        };
        if signal.is_aborted() {
            return cancelled();
        }
        if !response.is_html() {
            tracing::debug!(url = %response.url, status = response.status, "response is not html, skipping render");
            let status = response.status;
            return self.settle(id, NavigationState::Idle, NavigationOutcome::NotRendered { status });
        }

        let body = smol::future::or(
            async {
                signal.aborted().await;
                Err(NetError::Aborted)
            },
            response.text(),
        )
        .await;
        let html = match body {
            Ok(html) => html,
            Err(NetError::Aborted) => return cancelled(),
            Err(error) => {
                tracing::warn!(url = %response.url, %error, "failed to read response body, falling back");
                self.set_state(id, NavigationState::Failed);
                self.fallback(&navigation.source);
                return self.settle(id, NavigationState::FallbackTriggered, NavigationOutcome::FallbackTriggered);
            }
        };

        let mut url = response.url.clone();
        if url.fragment().is_none() {
            url.set_fragment(navigation.request.url.fragment());
        }
        let incoming = match parse_document(&html, &url) {
            Ok(doc) => doc,
            Err(error) => {
                tracing::error!(%url, %error, "failed to parse response, document left untouched");
                return self.settle(id, NavigationState::Failed, NavigationOutcome::RenderFailed);
            }
        };

        self.set_state(id, NavigationState::Reconciling);
        self.inner.host.before_render().await;
        if signal.is_aborted() {
            return cancelled();
        }

        let applied = {
            let mut doc = self.inner.document.borrow_mut();
            doc.set_url(url.clone());
            let strategy = self.inner.strategy.borrow().clone();
            let applied = self.inner.replacer.apply(&strategy, &mut doc, incoming);
            if applied.is_err() {
                doc.set_url(before.clone());
            }
            applied
        };
        if let Err(error) = applied {
            tracing::error!(%url, %error, "reconciliation failed");
            return self.settle(id, NavigationState::Failed, NavigationOutcome::RenderFailed);
        }

        self.prune_failed();

        let history_pushed = url != before;
        if history_pushed {
            self.inner.host.push_history(&url);
        }
        tracing::info!(%url, history_pushed, "navigation committed");
        let outcome = self.settle(
            id,
            NavigationState::Committed,
            NavigationOutcome::Committed { url, history_pushed },
        );

        self.inner.host.after_render().await;
        outcome
    }
}

/// Same host and port, the way `URL.host` compares
fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port() == b.port()
}
