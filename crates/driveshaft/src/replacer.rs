//! Reconciliation orchestrator
//!
//! Sequences one reconciliation pass: permanent elements are snapshotted,
//! the head is merged, then the body is replaced. Both mutations happen
//! synchronously so observers never see a half-updated document.

use std::fmt;
use std::rc::Rc;

use driveshaft_dom::{Document, DomError, DomEvent, Selector};
use driveshaft_html::ParseError;

use crate::body::{self, BodyReport};
use crate::config::{Config, ConfigError, RENDER_EVENT};
use crate::head::{self, HeadReport};

/// Reconciliation errors
#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    #[error("failed to parse fetched markup: {0}")]
    Parse(#[from] ParseError),

    #[error("dom error during reconciliation: {0}")]
    Dom(#[from] DomError),
}

/// How fetched documents are applied to the live one
#[derive(Clone, Default)]
pub enum ReplaceStrategy {
    /// Head merge plus body replacement
    #[default]
    Default,
    /// Caller-supplied function that bypasses the built-in logic
    Custom(Rc<dyn Fn(&mut Document, Document)>),
}

impl ReplaceStrategy {
    pub fn custom(f: impl Fn(&mut Document, Document) + 'static) -> Self {
        Self::Custom(Rc::new(f))
    }
}

impl fmt::Debug for ReplaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Summary of a default reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub head: HeadReport,
    pub body: BodyReport,
    /// Scripts handed to the document's executor
    pub scripts_executed: usize,
}

/// The built-in reconciliation
#[derive(Debug, Clone)]
pub struct Replacer {
    permanent_selector: Selector,
}

impl Replacer {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            permanent_selector: config.permanent_selector()?,
        })
    }

    pub fn permanent_selector(&self) -> &Selector {
        &self.permanent_selector
    }

    /// Reconcile `incoming` into `live`, then run fresh scripts and emit
    /// `driveshaft:render`.
    pub fn replace(&self, live: &mut Document, mut incoming: Document) -> Result<RenderReport, ReplaceError> {
        let selector = &self.permanent_selector;
        let registry = body::preserve_permanent_elements(live, selector)?;
        body::assign_permanent_ids(&mut incoming, selector)?;

        let mut head = head::merge_head(live, &incoming)?;
        let nonce = live.csp_nonce();
        for added in head.added.iter_mut() {
            if live.tree.is_tag(*added, "script") && !body::is_opted_out(&live.tree, *added) {
                *added = body::activate_script(&mut live.tree, *added, nonce.as_deref())?;
            }
        }

        let body = body::replace_body(live, &incoming, registry, selector)?;
        let scripts_executed = live.run_pending_scripts();

        let detail = live.url().to_string();
        live.dispatch_event(DomEvent::custom(RENDER_EVENT).with_detail(detail));
        tracing::debug!(url = %live.url(), scripts = scripts_executed, "reconciled document");
        Ok(RenderReport {
            head,
            body,
            scripts_executed,
        })
    }

    /// Apply `incoming` using `strategy`. A custom strategy gets no report.
    pub fn apply(
        &self,
        strategy: &ReplaceStrategy,
        live: &mut Document,
        incoming: Document,
    ) -> Result<Option<RenderReport>, ReplaceError> {
        match strategy {
            ReplaceStrategy::Default => self.replace(live, incoming).map(Some),
            ReplaceStrategy::Custom(f) => {
                f(live, incoming);
                Ok(None)
            }
        }
    }
}
