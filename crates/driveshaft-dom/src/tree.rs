//! DOM Tree (arena-based allocation)
//!
//! Nodes are allocated into a single `Vec`. Removed nodes free their slot
//! for reuse, and each slot carries a generation that is bumped on release,
//! so a stale `NodeId` misses instead of reaching the slot's new occupant.

use std::collections::HashSet;

use crate::node::{ElementData, Node, NodeData, TextData};
use crate::{DomError, DomResult, InternedString, NodeId, Selector, StringInterner};

/// Arena-based DOM tree
#[derive(Debug, Clone)]
pub struct DomTree {
    pub(crate) nodes: Vec<Node>,
    /// Current generation of each slot
    generations: Vec<u32>,
    /// Released slots, reused before the arena grows
    free: Vec<u32>,
    live: usize,
    interner: StringInterner,
    /// Script elements that became connected without having started
    pending_scripts: Vec<NodeId>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a tree holding only the document root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
            generations: vec![0],
            free: Vec::new(),
            live: 1,
            interner: StringInterner::new(),
            pending_scripts: Vec::new(),
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if !self.is_current(id) {
            return None;
        }
        self.nodes
            .get(id.index())
            .filter(|n| !matches!(n.data, NodeData::Removed))
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !self.is_current(id) {
            return None;
        }
        self.nodes
            .get_mut(id.index())
            .filter(|n| !matches!(n.data, NodeData::Removed))
    }

    #[inline]
    fn is_current(&self, id: NodeId) -> bool {
        self.generations.get(id.index()) == Some(&id.generation)
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.get_mut(id).ok_or(DomError::NotFound(id))
    }

    /// Number of live nodes in the tree
    pub fn len(&self) -> usize {
        self.live
    }

    /// Number of slots the arena holds, live or free
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn interner_mut(&mut self) -> &mut StringInterner {
        &mut self.interner
    }

    /// Resolve an interned name
    #[inline]
    pub fn resolve(&self, name: InternedString) -> &str {
        self.interner.get(name)
    }

    // ========== Node creation ==========

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.nodes[index as usize] = Node::new(data);
                NodeId::new(index, self.generations[index as usize])
            }
            None => {
                let index = self.nodes.len() as u32;
                self.nodes.push(Node::new(data));
                self.generations.push(0);
                NodeId::new(index, 0)
            }
        }
    }

    /// Return a slot to the free list and invalidate ids pointing at it
    fn release(&mut self, id: NodeId) {
        let index = id.index();
        self.nodes[index] = Node::new(NodeData::Removed);
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
    }

    /// Create a detached element; the tag name is lowercased
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let name = self.interner.intern(&tag.to_ascii_lowercase());
        self.alloc(NodeData::Element(ElementData::new(name)))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(TextData {
            content: content.into(),
        }))
    }

    /// Create a detached comment
    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(content.into()))
    }

    /// Create a detached doctype
    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeId {
        self.alloc(NodeData::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        })
    }

    // ========== Navigation ==========

    /// Parent of a node, if attached
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> Children<'_> {
        let next = self.get(id).map_or(NodeId::NONE, |n| n.first_child);
        Children { tree: self, next }
    }

    /// Snapshot of child IDs, safe to hold across mutation
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).map(|(child, _)| child).collect()
    }

    /// Snapshot of element child IDs
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .filter(|(_, n)| n.is_element())
            .map(|(child, _)| child)
            .collect()
    }

    /// Preorder traversal of all descendants, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let next = self.get(id).map_or(NodeId::NONE, |n| n.first_child);
        Descendants {
            tree: self,
            root: id,
            next,
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = node;
        while cursor.is_valid() {
            if cursor == ancestor {
                return true;
            }
            cursor = self.get(cursor).map_or(NodeId::NONE, |n| n.parent);
        }
        false
    }

    /// Whether a node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.get(id).is_some() && self.is_inclusive_ancestor(NodeId::ROOT, id)
    }

    // ========== Mutation ==========

    /// Insert `child` before `reference` (or append when `None`)
    ///
    /// All checks happen before any link changes, so a failed insertion
    /// leaves the tree untouched.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<NodeId> {
        match self.node(parent)?.data {
            NodeData::Element(_) | NodeData::Document => {}
            _ => return Err(DomError::HierarchyRequest),
        }
        if matches!(self.node(child)?.data, NodeData::Document) {
            return Err(DomError::HierarchyRequest);
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest);
        }

        let mut reference = match reference {
            Some(r) => {
                if self.node(r)?.parent != parent {
                    return Err(DomError::NotAChild);
                }
                r
            }
            None => NodeId::NONE,
        };
        if reference == child {
            reference = self.node(child)?.next_sibling;
        }

        self.detach(child);
        self.link(parent, child, reference);

        if self.is_connected(parent) {
            self.queue_scripts(child);
        }
        Ok(child)
    }

    /// Append a child as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Remove `child` from `parent`, keeping it alive as a detached node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if self.node(child)?.parent != parent {
            return Err(DomError::NotAChild);
        }
        self.detach(child);
        Ok(child)
    }

    /// Replace `old` with `new` under `parent`, returning `old`
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> DomResult<NodeId> {
        if self.node(old)?.parent != parent {
            return Err(DomError::NotAChild);
        }
        if new == old {
            return Ok(old);
        }
        self.insert_before(parent, new, Some(old))?;
        self.detach(old);
        Ok(old)
    }

    /// Unlink a node from its parent and siblings. No-op when detached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return;
        }

        if let Some(p) = self.get_mut(prev) {
            p.next_sibling = next;
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = next;
        }
        if let Some(n) = self.get_mut(next) {
            n.prev_sibling = prev;
        } else if let Some(par) = self.get_mut(parent) {
            par.last_child = prev;
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Link a detached `child` into `parent` before `reference` (NONE appends)
    fn link(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        let prev = if reference.is_valid() {
            self.nodes[reference.index()].prev_sibling
        } else {
            self.nodes[parent.index()].last_child
        };

        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        if reference.is_valid() {
            self.nodes[reference.index()].prev_sibling = child;
        } else {
            self.nodes[parent.index()].last_child = child;
        }
    }

    /// Detach a node and free it with its whole subtree
    pub fn remove(&mut self, id: NodeId) -> DomResult<()> {
        if id == NodeId::ROOT {
            return Err(DomError::HierarchyRequest);
        }
        self.node(id)?;
        self.detach(id);

        let mut doomed: HashSet<NodeId> = self.descendants(id).collect();
        doomed.insert(id);
        for &dead in &doomed {
            self.release(dead);
        }
        self.pending_scripts.retain(|s| !doomed.contains(s));
        Ok(())
    }

    /// Remove and free every child of a node
    pub fn remove_children(&mut self, id: NodeId) -> DomResult<()> {
        for child in self.child_ids(id) {
            self.remove(child)?;
        }
        Ok(())
    }

    // ========== Scripts ==========

    /// Queue every not-yet-started script in a freshly connected subtree.
    /// An inline script with no text is left unstarted, as browsers do.
    fn queue_scripts(&mut self, root: NodeId) {
        let Some(script) = self.interner.lookup("script") else { return };
        let src = self.interner.lookup("src");

        let mut candidates = vec![root];
        candidates.extend(self.descendants(root));
        for id in candidates {
            let ready = match self.get(id).and_then(Node::as_element) {
                Some(e) if e.name == script && !e.already_started => {
                    src.is_some_and(|s| e.get_attr(s).is_some())
                        || !self.text_content(id).is_empty()
                }
                _ => false,
            };
            if ready {
                self.mark_script_started(id);
                self.pending_scripts.push(id);
            }
        }
    }

    /// Drain the queue of scripts waiting to execute
    pub fn take_pending_scripts(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending_scripts)
    }

    /// Set the "already started" flag, so the script never runs on insertion
    pub fn mark_script_started(&mut self, id: NodeId) {
        if let Some(e) = self.get_mut(id).and_then(Node::as_element_mut) {
            e.already_started = true;
        }
    }

    // ========== Elements and attributes ==========

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    /// Lowercase tag name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| self.interner.get(e.name))
    }

    /// Whether `id` is an element with the given (lowercase) tag
    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag_name(id) == Some(tag)
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        let key = self.interner.lookup(name)?;
        self.element(id)?.get_attr(key)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> DomResult<Option<String>> {
        let key = self.interner.intern(name);
        let element = self.node_mut(id)?.as_element_mut().ok_or(DomError::InvalidNodeType)?;
        Ok(element.set_attr(key, value.into()))
    }

    /// Remove an attribute, returning its value
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let key = self.interner.lookup(name)?;
        self.element_mut(id)?.remove_attr(key)
    }

    /// Attributes of an element as `(name, value)` pairs in source order
    pub fn attributes(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.element(id)
            .map(|e| {
                e.attrs
                    .iter()
                    .map(|a| (self.interner.get(a.name), a.value.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========== Text ==========

    /// Concatenated text of a node, like `Node.textContent`
    pub fn text_content(&self, id: NodeId) -> String {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Text(t)) => t.content.clone(),
            Some(NodeData::Comment(c)) => c.clone(),
            Some(NodeData::Element(_)) | Some(NodeData::Document) => self
                .descendants(id)
                .filter_map(|d| self.get(d).and_then(Node::as_text))
                .collect(),
            _ => String::new(),
        }
    }

    /// Replace all children with a single text node (none for empty text)
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(t) => {
                t.content = text.to_string();
                return Ok(());
            }
            NodeData::Comment(c) => {
                *c = text.to_string();
                return Ok(());
            }
            _ => {}
        }
        self.remove_children(id)?;
        if !text.is_empty() {
            let child = self.create_text(text);
            self.append_child(id, child)?;
        }
        Ok(())
    }

    // ========== Cloning and import ==========

    /// Clone a node within this tree. Script "already started" flags are
    /// copied along, so clones of parsed scripts stay inert.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let data = self.copyable(id)?.clone();
        let root = self.alloc(data);
        if deep {
            let mut stack = vec![(id, root)];
            while let Some((src, dst)) = stack.pop() {
                for child in self.child_ids(src) {
                    let data = self.nodes[child.index()].data.clone();
                    let copy = self.alloc(data);
                    self.link(dst, copy, NodeId::NONE);
                    stack.push((child, copy));
                }
            }
        }
        Ok(root)
    }

    /// Copy a node (and optionally its subtree) out of another tree into
    /// this one, detached. Names are re-interned against this tree.
    pub fn import_node(&mut self, source: &DomTree, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let data = self.translate(source, source.copyable(id)?);
        let root = self.alloc(data);
        if deep {
            let mut stack = vec![(id, root)];
            while let Some((src, dst)) = stack.pop() {
                for (child, node) in source.children(src) {
                    let data = self.translate(source, &node.data);
                    let copy = self.alloc(data);
                    self.link(dst, copy, NodeId::NONE);
                    stack.push((child, copy));
                }
            }
        }
        Ok(root)
    }

    fn copyable(&self, id: NodeId) -> DomResult<&NodeData> {
        match &self.node(id)?.data {
            NodeData::Document => Err(DomError::InvalidNodeType),
            data => Ok(data),
        }
    }

    fn translate(&mut self, source: &DomTree, data: &NodeData) -> NodeData {
        match data {
            NodeData::Element(e) => {
                let mut copy = ElementData::new(self.interner.intern(source.resolve(e.name)));
                copy.already_started = e.already_started;
                copy.attrs = e
                    .attrs
                    .iter()
                    .map(|a| crate::Attribute {
                        name: self.interner.intern(source.resolve(a.name)),
                        value: a.value.clone(),
                    })
                    .collect();
                NodeData::Element(copy)
            }
            other => other.clone(),
        }
    }

    // ========== Queries ==========

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        selector.matches(self, id)
    }

    /// First descendant of `root` matching the selector, in tree order
    pub fn query_selector(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(root).find(|&d| selector.matches(self, d))
    }

    /// All descendants of `root` matching the selector, in tree order
    pub fn query_selector_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(root)
            .filter(|&d| selector.matches(self, d))
            .collect()
    }

    /// First descendant element of `root` with the given id attribute
    pub fn find_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .find(|&d| self.get_attribute(d, "id") == Some(id))
    }

    /// Nearest inclusive ancestor element with the given tag
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = id;
        while cursor.is_valid() {
            if self.is_tag(cursor, tag) {
                return Some(cursor);
            }
            cursor = self.get(cursor)?.parent;
        }
        None
    }
}

/// Iterator over the children of a node
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}

/// Preorder iterator over the descendants of a node
pub struct Descendants<'a> {
    tree: &'a DomTree,
    root: NodeId,
    next: NodeId,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next;
        let node = self.tree.get(current)?;

        self.next = if node.first_child.is_valid() {
            node.first_child
        } else {
            let mut cursor = current;
            loop {
                if cursor == self.root {
                    break NodeId::NONE;
                }
                let Some(n) = self.tree.get(cursor) else {
                    break NodeId::NONE;
                };
                if n.next_sibling.is_valid() {
                    break n.next_sibling;
                }
                cursor = n.parent;
            }
        };
        Some(current)
    }
}
