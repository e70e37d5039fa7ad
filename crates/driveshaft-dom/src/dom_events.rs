//! DOM Events
//!
//! Events fired at the document, delivered to subscribers over channels.

use std::borrow::Cow;

use crate::NodeId;

/// Name of the event fired once a document has been parsed
pub const DOM_CONTENT_LOADED: &str = "DOMContentLoaded";

/// A dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub name: Cow<'static, str>,
    pub target: NodeId,
    /// Payload of a custom event
    pub detail: Option<String>,
    pub bubbles: bool,
    pub cancelable: bool,
}

impl DomEvent {
    /// Create a custom event targeted at the document
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            target: NodeId::ROOT,
            detail: None,
            bubbles: true,
            cancelable: false,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = target;
        self
    }

    /// DOMContentLoaded
    pub fn content_loaded() -> Self {
        Self::custom(DOM_CONTENT_LOADED)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}
