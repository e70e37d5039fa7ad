//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it to our DOM format.

use driveshaft_dom::{Document, DomTree, NodeId};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use url::Url;

use crate::ParseError;

/// HTML5 parser
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a complete HTML document
    ///
    /// Every parsed `<script>` is flagged as already started, so inserting
    /// parsed content into a live document never executes it by itself.
    /// Fails when tree construction yields no head or no body (a frameset
    /// document, for instance).
    pub fn parse_with_url(&self, html: &str, url: &Url) -> Result<Document, ParseError> {
        tracing::debug!(%url, bytes = html.len(), "parsing HTML document");

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        let mut document = Document::empty(url.clone());
        convert(&dom.document, document.tree_mut())?;
        document.finalize();

        if document.head().is_none() {
            return Err(ParseError::MissingHead);
        }
        if document.body().is_none() {
            return Err(ParseError::MissingBody);
        }

        tracing::trace!(nodes = document.tree().len(), "parsed");
        Ok(document)
    }
}

/// Convert an RcDom tree into `tree`, depth-first without recursion
fn convert(root: &Handle, tree: &mut DomTree) -> Result<(), ParseError> {
    let mut stack: Vec<(Handle, NodeId)> = root
        .children
        .borrow()
        .iter()
        .rev()
        .map(|c| (c.clone(), NodeId::ROOT))
        .collect();

    while let Some((handle, parent)) = stack.pop() {
        let id = match &handle.data {
            RcNodeData::Document | RcNodeData::ProcessingInstruction { .. } => continue,
            RcNodeData::Doctype {
                name,
                public_id,
                system_id,
            } => tree.create_doctype(name, public_id, system_id),
            RcNodeData::Text { contents } => tree.create_text(contents.borrow().to_string()),
            RcNodeData::Comment { contents } => tree.create_comment(contents.to_string()),
            RcNodeData::Element { name, attrs, .. } => {
                let id = tree.create_element(&name.local);
                for attr in attrs.borrow().iter() {
                    tree.set_attribute(id, &attr.name.local, attr.value.to_string())?;
                }
                if tree.is_tag(id, "script") {
                    tree.mark_script_started(id);
                }
                id
            }
        };
        tree.append_child(parent, id)?;

        stack.extend(
            handle
                .children
                .borrow()
                .iter()
                .rev()
                .map(|c| (c.clone(), id)),
        );
    }
    Ok(())
}
