//! Body replacement
//!
//! The live body keeps its element (attributes are synced) but its children
//! are swapped for the incoming ones in a single pass. Permanent elements
//! survive as the very same nodes, and scripts in the new content are
//! replaced with fresh elements so they execute.

use std::collections::HashMap;

use driveshaft_dom::{Document, DomError, DomResult, DomTree, NodeId, Selector};

use crate::attributes::sync_attributes;
use crate::config::{EVAL_ATTRIBUTE, PERMANENT_ID_PREFIX};

/// Identifier to live node mapping of permanent elements, built right
/// before a body replacement and consumed by it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermanentRegistry {
    entries: HashMap<String, NodeId>,
}

impl PermanentRegistry {
    pub fn get(&self, id: &str) -> Option<NodeId> {
        self.entries.get(id).copied()
    }

    fn take(&mut self, id: &str) -> Option<NodeId> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Give every permanent element in `doc`'s body an `id`. Elements without
/// one get `driveshaft-permanent-<n>`, numbered in document order, so the
/// same markup yields the same identifiers in both documents.
pub fn assign_permanent_ids(doc: &mut Document, selector: &Selector) -> DomResult<Vec<(String, NodeId)>> {
    let Some(body) = doc.body() else {
        return Ok(Vec::new());
    };
    let mut generated = 0;
    let mut assigned = Vec::new();
    for element in doc.tree.query_selector_all(body, selector) {
        let id = match doc.tree.get_attribute(element, "id").filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let id = format!("{PERMANENT_ID_PREFIX}{generated}");
                generated += 1;
                doc.tree.set_attribute(element, "id", id.clone())?;
                id
            }
        };
        assigned.push((id, element));
    }
    Ok(assigned)
}

/// Snapshot the live permanent elements
pub fn preserve_permanent_elements(doc: &mut Document, selector: &Selector) -> DomResult<PermanentRegistry> {
    let mut registry = PermanentRegistry::default();
    for (id, element) in assign_permanent_ids(doc, selector)? {
        registry.entries.entry(id).or_insert(element);
    }
    tracing::trace!(count = registry.len(), "preserved permanent elements");
    Ok(registry)
}

/// What a body replacement changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyReport {
    /// Permanent elements moved into the new content
    pub restored: usize,
    /// Preserved elements with no placeholder in the new content
    pub discarded: usize,
    /// Scripts replaced by fresh, executable copies
    pub scripts_activated: usize,
}

/// Replace the live body's content with `incoming`'s body content.
///
/// Incoming elements matching `selector` whose identifier is in `registry`
/// are swapped for the preserved live node. Fresh scripts are queued on the
/// live document but not run; call `Document::run_pending_scripts`.
pub fn replace_body(
    live: &mut Document,
    incoming: &Document,
    mut registry: PermanentRegistry,
    selector: &Selector,
) -> DomResult<BodyReport> {
    let mut report = BodyReport::default();
    let (Some(live_body), Some(incoming_body)) = (live.body(), incoming.body()) else {
        return Ok(report);
    };

    sync_attributes(&incoming.tree, incoming_body, &mut live.tree, live_body)?;

    let mut fresh = Vec::new();
    for child in incoming.tree.child_ids(incoming_body) {
        fresh.push(live.tree.import_node(&incoming.tree, child, true)?);
    }

    let mut restored = Vec::new();
    for root in fresh.iter_mut() {
        let mut candidates = vec![*root];
        candidates.extend(live.tree.descendants(*root));
        for placeholder in candidates {
            // Gone when an enclosing placeholder was already swapped out
            if live.tree.get(placeholder).is_none() || !live.tree.matches(placeholder, selector) {
                continue;
            }
            let Some(permanent) = live
                .tree
                .get_attribute(placeholder, "id")
                .and_then(|id| registry.take(id))
            else {
                continue;
            };
            if live.tree.get(permanent).is_none() {
                continue;
            }
            match live.tree.parent(placeholder) {
                Some(parent) => {
                    live.tree.replace_child(parent, permanent, placeholder)?;
                }
                None => {
                    live.tree.detach(permanent);
                    *root = permanent;
                }
            }
            live.tree.remove(placeholder)?;
            restored.push(permanent);
        }
    }
    report.restored = restored.len();
    report.discarded = registry.len();

    live.tree.remove_children(live_body)?;
    for node in &fresh {
        live.tree.append_child(live_body, *node)?;
    }

    let nonce = live.csp_nonce();
    let scripts: Vec<NodeId> = live
        .tree
        .descendants(live_body)
        .filter(|&s| live.tree.is_tag(s, "script"))
        .filter(|&s| !restored.iter().any(|&p| live.tree.is_inclusive_ancestor(p, s)))
        .filter(|&s| !is_opted_out(&live.tree, s))
        .collect();
    for script in scripts {
        activate_script(&mut live.tree, script, nonce.as_deref())?;
        report.scripts_activated += 1;
    }

    tracing::debug!(
        restored = report.restored,
        discarded = report.discarded,
        scripts = report.scripts_activated,
        "replaced body"
    );
    Ok(report)
}

/// `data-driveshaft-eval="false"`
pub fn is_opted_out(tree: &DomTree, script: NodeId) -> bool {
    tree.get_attribute(script, EVAL_ATTRIBUTE)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("false"))
}

/// Replace `script` with a fresh, textually identical element that will run
/// once connected. `async` and `defer` are dropped so scripts run in document
/// order; `nonce` overrides the copied nonce attribute.
pub fn activate_script(tree: &mut DomTree, script: NodeId, nonce: Option<&str>) -> DomResult<NodeId> {
    let parent = tree.parent(script).ok_or(DomError::NotAChild)?;
    let attributes: Vec<(String, String)> = tree
        .attributes(script)
        .into_iter()
        .filter(|(name, _)| !matches!(*name, "async" | "defer"))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    let text = tree.text_content(script);

    let fresh = tree.create_element("script");
    for (name, value) in attributes {
        tree.set_attribute(fresh, &name, value)?;
    }
    if let Some(nonce) = nonce {
        tree.set_attribute(fresh, "nonce", nonce)?;
    }
    if !text.is_empty() {
        let content = tree.create_text(text);
        tree.append_child(fresh, content)?;
    }

    tree.replace_child(parent, fresh, script)?;
    tree.remove(script)?;
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use driveshaft_html::parse_document;
    use url::Url;

    use super::*;
    use crate::config::DEFAULT_PERMANENT_SELECTOR;

    fn doc(body: &str) -> Document {
        let url = Url::parse("https://example.test/").unwrap();
        parse_document(&format!("<html><head></head><body>{body}</body></html>"), &url).unwrap()
    }

    fn selector() -> Selector {
        Selector::parse(DEFAULT_PERMANENT_SELECTOR).unwrap()
    }

    fn replace(live: &mut Document, mut incoming: Document) -> BodyReport {
        let registry = preserve_permanent_elements(live, &selector()).unwrap();
        assign_permanent_ids(&mut incoming, &selector()).unwrap();
        replace_body(live, &incoming, registry, &selector()).unwrap()
    }

    #[test]
    fn test_content_swapped() {
        let mut live = doc("<p>old</p>");
        let body = live.body().unwrap();
        replace(&mut live, doc("<h1>new</h1><p>content</p>"));
        assert_eq!(live.body(), Some(body));
        assert_eq!(live.tree.text_content(body), "newcontent");
    }

    #[test]
    fn test_permanent_keeps_live_node() {
        let mut live = doc("<div id=player data-driveshaft-permanent>playing</div><p>a</p>");
        let player = live.get_element_by_id("player").unwrap();
        let report = replace(&mut live, doc("<p>b</p><div id=player data-driveshaft-permanent>fresh</div>"));

        assert_eq!(report.restored, 1);
        assert_eq!(live.get_element_by_id("player"), Some(player));
        assert_eq!(live.tree.text_content(player), "playing");
        let body = live.body().unwrap();
        assert_eq!(live.tree.element_children(body)[1], player);
    }

    #[test]
    fn test_permanent_without_id_pairs_by_order() {
        let mut live = doc("<nav data-driveshaft-permanent>menu</nav>");
        let nav = live.tree.element_children(live.body().unwrap())[0];
        replace(&mut live, doc("<main></main><nav data-driveshaft-permanent>other</nav>"));
        assert_eq!(live.tree.text_content(nav), "menu");
        assert_eq!(
            live.tree.get_attribute(nav, "id"),
            Some("driveshaft-permanent-0")
        );
        assert!(live.tree.is_connected(nav));
    }

    #[test]
    fn test_unmatched_counts() {
        let mut live = doc("<div id=a data-driveshaft-permanent></div>");
        let old = live.get_element_by_id("a").unwrap();
        let report = replace(&mut live, doc("<div id=b data-driveshaft-permanent>b</div>"));
        assert_eq!(report.restored, 0);
        assert_eq!(report.discarded, 1);
        assert!(live.tree.get(old).is_none());
        assert_eq!(live.tree.text_content(live.get_element_by_id("b").unwrap()), "b");
    }

    #[test]
    fn test_scripts_activated_with_nonce() {
        let url = Url::parse("https://example.test/").unwrap();
        let mut live = parse_document(
            "<head><meta name=csp-nonce content=n1></head><body></body>",
            &url,
        )
        .unwrap();
        let report = replace(
            &mut live,
            doc("<script async src=/a.js></script><script data-driveshaft-eval=false>skip()</script>"),
        );
        assert_eq!(report.scripts_activated, 1);

        let body = live.body().unwrap();
        let scripts = live.tree.element_children(body);
        let fresh = scripts[0];
        assert!(!live.tree.has_attribute(fresh, "async"));
        assert_eq!(live.tree.get_attribute(fresh, "nonce"), Some("n1"));
        assert_eq!(live.tree.take_pending_scripts(), vec![fresh]);
    }

    #[test]
    fn test_activate_script_copies_text() {
        let mut live = doc("<div><script type=module defer>run()</script></div>");
        let body = live.body().unwrap();
        let div = live.tree.element_children(body)[0];
        let old = live.tree.element_children(div)[0];
        let fresh = activate_script(&mut live.tree, old, None).unwrap();
        assert!(live.tree.get(old).is_none());
        assert_eq!(live.tree.parent(fresh), Some(div));
        assert_eq!(live.tree.text_content(fresh), "run()");
        assert_eq!(live.tree.attributes(fresh), vec![("type", "module")]);
    }
}
