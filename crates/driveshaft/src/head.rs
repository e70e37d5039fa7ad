//! Head merging
//!
//! Every head child gets an identity signature. Scripts, links and metas are
//! keyed by the resource they name; everything else by its full markup.
//! Reconciliation is shallow: live children whose signature is missing from
//! the incoming head go away, incoming children with unseen signatures are
//! imported, and matching children are left in place.

use std::collections::{HashMap, HashSet};

use driveshaft_dom::{Document, DomResult, DomTree, NodeData, NodeId};
use driveshaft_html::HtmlSerializer;

use crate::attributes::sync_attributes;

/// Comparable identity of a head child
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementSignature {
    /// Keyed by the resource the element names
    Resource(String),
    /// Keyed by tag and serialized markup
    Content(String),
}

impl ElementSignature {
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource(_))
    }
}

/// Signature of a head child. `None` for `<title>`, which is reconciled by
/// text instead, and for text and comment nodes, which the merge leaves
/// where they are.
pub fn signature(tree: &DomTree, id: NodeId) -> Option<ElementSignature> {
    let NodeData::Element(e) = &tree.get(id)?.data else {
        return None;
    };
    let tag = tree.resolve(e.name);
    let attr = |name| tree.get_attribute(id, name);

    let resource = match tag {
        "title" => return None,
        "base" => Some("base".to_string()),
        "script" => attr("src").map(|src| format!("script:{src}")),
        "link" => attr("href").map(|href| format!("link:{}:{href}", attr("rel").unwrap_or_default())),
        "meta" => {
            if let Some(name) = attr("name") {
                Some(format!("meta:name:{name}"))
            } else if let Some(property) = attr("property") {
                Some(format!("meta:property:{property}"))
            } else if let Some(equiv) = attr("http-equiv") {
                Some(format!("meta:http-equiv:{}", equiv.to_ascii_lowercase()))
            } else if attr("charset").is_some() {
                Some("meta:charset".to_string())
            } else {
                None
            }
        }
        _ => None,
    };

    Some(match resource {
        Some(key) => ElementSignature::Resource(key),
        None => ElementSignature::Content(format!(
            "{tag}:{}",
            HtmlSerializer::new().serialize_outer(tree, id)
        )),
    })
}

/// Children that survive even when the incoming head lacks them
fn is_exempt(tree: &DomTree, id: NodeId) -> bool {
    tree.is_tag(id, "base") || (tree.is_tag(id, "meta") && tree.has_attribute(id, "charset"))
}

/// What a head merge changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadReport {
    pub removed: usize,
    /// Live ids of the imported children, in head order
    pub added: Vec<NodeId>,
    /// Resource-keyed matches whose attributes were refreshed
    pub updated: usize,
    pub title_changed: bool,
}

impl HeadReport {
    pub fn is_unchanged(&self) -> bool {
        self.removed == 0 && self.added.is_empty() && !self.title_changed
    }
}

/// Merge the head of `incoming` into the head of `live`
pub fn merge_head(live: &mut Document, incoming: &Document) -> DomResult<HeadReport> {
    let mut report = HeadReport::default();
    let (Some(live_head), Some(incoming_head)) = (live.head(), incoming.head()) else {
        return Ok(report);
    };

    sync_attributes(&incoming.tree, incoming_head, &mut live.tree, live_head)?;

    // Incoming signatures in order; later duplicates collapse into the first
    let mut wanted: Vec<(ElementSignature, NodeId)> = Vec::new();
    let mut wanted_set: HashSet<ElementSignature> = HashSet::new();
    for child in incoming.tree.child_ids(incoming_head) {
        if let Some(sig) = signature(&incoming.tree, child) {
            if wanted_set.insert(sig.clone()) {
                wanted.push((sig, child));
            }
        }
    }

    let mut present: HashMap<ElementSignature, NodeId> = HashMap::new();
    for child in live.tree.child_ids(live_head) {
        let Some(sig) = signature(&live.tree, child) else {
            continue;
        };
        if is_exempt(&live.tree, child) {
            present.entry(sig).or_insert(child);
        } else if !wanted_set.contains(&sig) || present.contains_key(&sig) {
            live.tree.remove(child)?;
            report.removed += 1;
        } else {
            present.insert(sig, child);
        }
    }

    for (sig, incoming_child) in wanted {
        match present.get(&sig) {
            Some(&live_child) => {
                let refresh = sig.is_resource()
                    && (live.tree.is_tag(live_child, "meta") || live.tree.is_tag(live_child, "base"));
                if refresh && live.tree.attributes(live_child) != incoming.tree.attributes(incoming_child) {
                    sync_attributes(&incoming.tree, incoming_child, &mut live.tree, live_child)?;
                    report.updated += 1;
                }
            }
            None => {
                let copy = live.tree.import_node(&incoming.tree, incoming_child, true)?;
                live.tree.append_child(live_head, copy)?;
                report.added.push(copy);
            }
        }
    }

    if incoming.title_element().is_some() {
        let title = incoming.title();
        if live.title_element().is_none() || live.title() != title {
            live.set_title(&title)?;
            report.title_changed = true;
        }
    }

    tracing::debug!(
        removed = report.removed,
        added = report.added.len(),
        updated = report.updated,
        title_changed = report.title_changed,
        "merged head"
    );
    Ok(report)
}
