//! Document - High-level document API

use std::fmt;

use smol::channel::{Receiver, Sender};
use url::Url;

use crate::{DomEvent, DomResult, DomTree, NodeId, ScriptExecutor, ScriptSource, Selector};

/// HTML Document
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
    /// Document URL
    url: Url,
    /// Cached reference to <html> element
    html_element: NodeId,
    /// Cached reference to <head> element
    head_element: NodeId,
    /// Cached reference to <body> element
    body_element: NodeId,
    listeners: Vec<Sender<DomEvent>>,
    script_executor: Option<Box<dyn ScriptExecutor>>,
}

impl Document {
    /// Create a document with an empty html/head/body skeleton
    pub fn new(url: Url) -> Self {
        let mut doc = Self::empty(url);
        let html = doc.tree.create_element("html");
        let head = doc.tree.create_element("head");
        let body = doc.tree.create_element("body");

        let linked = doc
            .tree
            .append_child(NodeId::ROOT, html)
            .and_then(|_| doc.tree.append_child(html, head))
            .and_then(|_| doc.tree.append_child(html, body));
        debug_assert!(linked.is_ok(), "fresh skeleton must link");

        doc.html_element = html;
        doc.head_element = head;
        doc.body_element = body;
        doc
    }

    /// Create an empty document (no structure)
    pub fn empty(url: Url) -> Self {
        Self {
            tree: DomTree::new(),
            url,
            html_element: NodeId::NONE,
            head_element: NodeId::NONE,
            body_element: NodeId::NONE,
            listeners: Vec::new(),
            script_executor: None,
        }
    }

    /// Locate the html, head and body elements after the tree was built
    /// externally (by a parser)
    pub fn finalize(&mut self) {
        let tree = &self.tree;
        let find = |parent: NodeId, tag: &str| {
            tree.element_children(parent)
                .into_iter()
                .find(|&c| tree.is_tag(c, tag))
                .unwrap_or(NodeId::NONE)
        };
        let html = find(NodeId::ROOT, "html");
        let head = if html.is_valid() { find(html, "head") } else { NodeId::NONE };
        let body = if html.is_valid() { find(html, "body") } else { NodeId::NONE };

        self.html_element = html;
        self.head_element = head;
        self.body_element = body;
    }

    // ========== URL ==========

    /// Get document URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Base URL for resolving relative references: the first `<base href>`
    /// resolved against the document URL
    pub fn base_url(&self) -> Url {
        let base = self.document_element().and_then(|root| {
            self.tree
                .descendants(root)
                .find(|&d| self.tree.is_tag(d, "base") && self.tree.has_attribute(d, "href"))
        });
        base.and_then(|b| self.tree.get_attribute(b, "href"))
            .and_then(|href| self.url.join(href.trim()).ok())
            .unwrap_or_else(|| self.url.clone())
    }

    /// Resolve a possibly relative reference against the base URL
    pub fn resolve_url(&self, href: &str) -> Option<Url> {
        self.base_url().join(href.trim()).ok()
    }

    // ========== Title ==========

    /// The first `<title>` element in the document
    pub fn title_element(&self) -> Option<NodeId> {
        let root = self.document_element()?;
        self.tree.descendants(root).find(|&d| self.tree.is_tag(d, "title"))
    }

    /// Get document title, with whitespace collapsed
    pub fn title(&self) -> String {
        self.title_element()
            .map(|t| {
                self.tree
                    .text_content(t)
                    .split_ascii_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Set the title, creating a `<title>` in the head when missing
    pub fn set_title(&mut self, title: &str) -> DomResult<()> {
        let element = match self.title_element() {
            Some(t) => t,
            None => {
                let Some(head) = self.head() else { return Ok(()) };
                let t = self.tree.create_element("title");
                self.tree.append_child(head, t)?
            }
        };
        self.tree.set_text_content(element, title)
    }

    // ========== Structure ==========

    fn live(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id).map(|_| id)
    }

    /// Get <html> element
    pub fn document_element(&self) -> Option<NodeId> {
        self.live(self.html_element)
    }

    /// Get <head> element
    pub fn head(&self) -> Option<NodeId> {
        self.live(self.head_element)
    }

    /// Get <body> element
    pub fn body(&self) -> Option<NodeId> {
        self.live(self.body_element)
    }

    /// Get element by ID
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree.find_element_by_id(NodeId::ROOT, id)
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.tree.query_selector(NodeId::ROOT, selector)
    }

    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.tree.query_selector_all(NodeId::ROOT, selector)
    }

    /// Nonce published by `<meta name="csp-nonce">`, if any
    pub fn csp_nonce(&self) -> Option<String> {
        let head = self.head()?;
        self.tree
            .descendants(head)
            .find(|&d| {
                self.tree.is_tag(d, "meta") && self.tree.get_attribute(d, "name") == Some("csp-nonce")
            })
            .and_then(|m| self.tree.get_attribute(m, "content"))
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    // ========== Events ==========

    /// Subscribe to events dispatched at this document
    pub fn subscribe(&mut self) -> Receiver<DomEvent> {
        let (tx, rx) = smol::channel::unbounded();
        self.listeners.push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, forgetting closed ones
    pub fn dispatch_event(&mut self, event: DomEvent) {
        tracing::trace!(event = %event.name, "dispatch");
        self.listeners.retain(|tx| tx.try_send(event.clone()).is_ok());
    }

    // ========== Scripts ==========

    pub fn set_script_executor(&mut self, executor: impl ScriptExecutor + 'static) {
        self.script_executor = Some(Box::new(executor));
    }

    /// Describe a script element for execution
    pub fn script_source(&self, element: NodeId) -> ScriptSource {
        let attr = |name| self.tree.get_attribute(element, name).map(str::to_string);
        ScriptSource {
            element,
            src: self
                .tree
                .get_attribute(element, "src")
                .and_then(|s| self.resolve_url(s)),
            text: self.tree.text_content(element),
            nonce: attr("nonce"),
            script_type: attr("type"),
        }
    }

    /// Execute every script that became ready since the last call.
    /// Returns the number of scripts handed to the executor.
    pub fn run_pending_scripts(&mut self) -> usize {
        let mut ran = 0;
        for element in self.tree.take_pending_scripts() {
            if !self.tree.is_connected(element) {
                continue;
            }
            let source = self.script_source(element);
            if source.is_data_block() {
                continue;
            }
            match self.script_executor.as_mut() {
                Some(executor) => {
                    executor.execute(&source);
                    ran += 1;
                }
                None => tracing::debug!(?element, "no script executor, skipping script"),
            }
        }
        ran
    }

    // ========== Tree access ==========

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Access the DOM tree mutably
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url.as_str())
            .field("nodes", &self.tree.len())
            .field("listeners", &self.listeners.len())
            .field("has_executor", &self.script_executor.is_some())
            .finish()
    }
}
