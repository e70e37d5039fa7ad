//! Attribute synchronization
//!
//! Makes a destination element carry exactly the attributes of a source
//! element: stale attributes are removed, everything else is copied over.

use driveshaft_dom::{DomError, DomResult, DomTree, NodeId};

/// Sync attributes from an element of one tree onto an element of another
pub fn sync_attributes(
    from_tree: &DomTree,
    from: NodeId,
    to_tree: &mut DomTree,
    to: NodeId,
) -> DomResult<()> {
    let incoming = owned_attributes(from_tree, from)?;
    apply(to_tree, to, incoming)
}

/// Sync attributes between two elements of the same tree
pub fn sync_attributes_within(tree: &mut DomTree, from: NodeId, to: NodeId) -> DomResult<()> {
    let incoming = owned_attributes(tree, from)?;
    apply(tree, to, incoming)
}

fn owned_attributes(tree: &DomTree, id: NodeId) -> DomResult<Vec<(String, String)>> {
    if tree.element(id).is_none() {
        return Err(DomError::InvalidNodeType);
    }
    Ok(tree
        .attributes(id)
        .into_iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect())
}

fn apply(tree: &mut DomTree, to: NodeId, incoming: Vec<(String, String)>) -> DomResult<()> {
    if tree.element(to).is_none() {
        return Err(DomError::InvalidNodeType);
    }
    let stale: Vec<String> = tree
        .attributes(to)
        .into_iter()
        .filter(|(name, _)| !incoming.iter().any(|(n, _)| n == name))
        .map(|(name, _)| name.to_string())
        .collect();
    for name in stale {
        tree.remove_attribute(to, &name);
    }
    for (name, value) in incoming {
        if tree.get_attribute(to, &name) != Some(value.as_str()) {
            tree.set_attribute(to, &name, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tree: &mut DomTree, attrs: &[(&str, &str)]) -> NodeId {
        let id = tree.create_element("body");
        for (k, v) in attrs {
            tree.set_attribute(id, k, *v).unwrap();
        }
        id
    }

    #[test]
    fn test_sync_across_trees() {
        let mut source = DomTree::new();
        let from = element(&mut source, &[("class", "new"), ("data-x", "1")]);
        let mut target = DomTree::new();
        let to = element(&mut target, &[("class", "old"), ("lang", "en")]);

        sync_attributes(&source, from, &mut target, to).unwrap();
        assert_eq!(target.attributes(to), vec![("class", "new"), ("data-x", "1")]);
    }

    #[test]
    fn test_sync_within_tree() {
        let mut tree = DomTree::new();
        let from = element(&mut tree, &[]);
        let to = element(&mut tree, &[("hidden", "")]);
        sync_attributes_within(&mut tree, from, to).unwrap();
        assert!(tree.attributes(to).is_empty());
    }

    #[test]
    fn test_non_element_rejected() {
        let mut tree = DomTree::new();
        let text = tree.create_text("x");
        let el = element(&mut tree, &[]);
        assert_eq!(sync_attributes_within(&mut tree, text, el), Err(DomError::InvalidNodeType));
        assert_eq!(sync_attributes_within(&mut tree, el, text), Err(DomError::InvalidNodeType));
    }
}
