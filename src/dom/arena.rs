//! Arena-based document tree.
//!
//! All nodes live in one contiguous vector and are addressed by a stable
//! [`NodeId`]. Children form a doubly linked sibling chain owned by their
//! parent; every node also records its parent so rewrites can walk upward.
//! Detached nodes stay in the arena (ids are never reused) but are
//! unreachable from the document.

use std::fmt::Write as _;

/// Steps kept by [`Dom::describe`] before the middle of a path is elided.
pub const DESCRIBE_DEPTH: usize = 16;

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A namespace-resolved XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, `None` for names outside any namespace.
    pub ns: Option<String>,
    /// Preferred prefix when serializing. Only a hint; the writer declares
    /// whatever it needs.
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    /// A name in the given namespace (or none) without a prefix hint.
    pub fn new(ns: Option<&str>, local: &str) -> Self {
        Self {
            ns: ns.map(str::to_string),
            prefix: None,
            local: local.to_string(),
        }
    }

    /// A namespaced name with a preferred prefix.
    pub fn prefixed(ns: &str, prefix: &str, local: &str) -> Self {
        Self {
            ns: Some(ns.to_string()),
            prefix: Some(prefix.to_string()),
            local: local.to_string(),
        }
    }

    /// Compare namespace and local name, ignoring the prefix hint.
    pub fn is(&self, ns: Option<&str>, local: &str) -> bool {
        self.ns.as_deref() == ns && self.local == local
    }

    /// `prefix:local`, or just `local` without a prefix hint.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Element name and attributes.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    pub attrs: Vec<Attribute>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attrs: Vec::new(),
        }
    }

    /// Get an attribute value by namespace and local name.
    pub fn attr(&self, ns: Option<&str>, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.is(ns, local))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing any existing value with the same name.
    pub fn set_attr(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|a| a.name.is(name.ns.as_deref(), &name.local))
        {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attribute { name, value }),
        }
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attr(&mut self, ns: Option<&str>, local: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|a| a.name.is(ns, local))?;
        Some(self.attrs.remove(pos).value)
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root (parent of the document element).
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Arena-based document tree.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    document: NodeId,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Create a new empty tree with a document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
            document: NodeId(0),
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    fn slot(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// The document node.
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.document).find(|&c| self.is_element(c))
    }

    /// Number of allocated nodes, including detached ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.get(id).map(|n| &n.data)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.alloc(NodeData::Element(Element::new(name)))
    }

    pub fn create_element_with(&mut self, name: QName, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(NodeData::Element(Element { name, attrs }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    /// Copy a node without its children: element name and attributes, or
    /// the text of a leaf. The copy is detached.
    pub fn shallow_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let data = self.data(id)?.clone();
        Some(self.alloc(data))
    }

    /// Deep-copy a subtree of this tree. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let copy = self.shallow_clone(id)?;
        let mut stack = vec![(id, copy)];
        while let Some((src, dst)) = stack.pop() {
            let children: Vec<_> = self.children(src).collect();
            for child in children {
                if let Some(child_copy) = self.shallow_clone(child) {
                    self.append(dst, child_copy);
                    stack.push((child, child_copy));
                }
            }
        }
        Some(copy)
    }

    /// Deep-copy a subtree from another tree into this one. The copy is detached.
    pub fn import(&mut self, src: &Dom, src_id: NodeId) -> Option<NodeId> {
        let copy = self.alloc(src.data(src_id)?.clone());
        let mut stack = vec![(src_id, copy)];
        while let Some((from, to)) = stack.pop() {
            for child in src.children(from) {
                if let Some(data) = src.data(child) {
                    let child_copy = self.alloc(data.clone());
                    self.append(to, child_copy);
                    stack.push((child, child_copy));
                }
            }
        }
        Some(copy)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.first_child)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.last_child)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling)
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        ChildrenIter {
            dom: self,
            current: self.first_child(parent),
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.first_child(id).is_some()
    }

    /// Iterate over the strict ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            dom: self,
            current: self.parent(id),
        }
    }

    /// True if `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// True if the node is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.document || self.ancestors(id).any(|a| a == self.document)
    }

    /// Pre-order iterator over the strict descendants of `root`.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            dom: self,
            root,
            next: self.first_child(root),
        }
    }

    /// The node following `id` in document order, not leaving `within`.
    ///
    /// Visits children before siblings, so starting from any node this walks
    /// its subtree and then everything after it inside `within`.
    pub fn next_in_order(&self, id: NodeId, within: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(id) {
            return Some(child);
        }
        self.next_after_subtree(id, within)
    }

    /// The first node after the subtree of `id` in document order, not leaving `within`.
    pub fn next_after_subtree(&self, id: NodeId, within: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if current == within {
                return None;
            }
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.parent(current)?;
        }
    }

    /// Position of a node among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|c| c == id)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Unlink a node from its parent. The subtree stays intact.
    ///
    /// The parent's child chain and the node's back-reference are updated
    /// together; a detached node has no parent and no siblings.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        let Some(parent) = parent else {
            return;
        };

        match prev {
            Some(p) => self.slot(p).next_sibling = next,
            None => self.slot(parent).first_child = next,
        }
        match next {
            Some(n) => self.slot(n).prev_sibling = prev,
            None => self.slot(parent).last_child = prev,
        }

        let node = self.slot(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Append a child to a parent node, detaching it from its old position.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            child != parent && !self.is_ancestor_of(child, parent),
            "append would create a cycle"
        );
        self.detach(child);

        let last_child = self.last_child(parent);
        {
            let node = self.slot(child);
            node.parent = Some(parent);
            node.prev_sibling = last_child;
        }
        match last_child {
            Some(last) => self.slot(last).next_sibling = Some(child),
            None => self.slot(parent).first_child = Some(child),
        }
        self.slot(parent).last_child = Some(child);
    }

    /// Insert a child as the first child of a parent.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        match self.first_child(parent) {
            Some(first) => self.insert_before(first, child),
            None => self.append(parent, child),
        }
    }

    /// Insert a node before a sibling, detaching it from its old position.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let Some(parent) = self.parent(sibling) else {
            return;
        };
        debug_assert!(
            new_node != sibling && !self.is_ancestor_of(new_node, sibling),
            "insert would create a cycle"
        );
        self.detach(new_node);

        let prev = self.prev_sibling(sibling);
        {
            let node = self.slot(new_node);
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = Some(sibling);
        }
        self.slot(sibling).prev_sibling = Some(new_node);
        match prev {
            Some(p) => self.slot(p).next_sibling = Some(new_node),
            None => self.slot(parent).first_child = Some(new_node),
        }
    }

    /// Insert a node after a sibling, detaching it from its old position.
    pub fn insert_after(&mut self, sibling: NodeId, new_node: NodeId) {
        match self.next_sibling(sibling) {
            Some(next) => self.insert_before(next, new_node),
            None => {
                if let Some(parent) = self.parent(sibling) {
                    self.append(parent, new_node);
                }
            }
        }
    }

    /// Move all children of `from` to the end of `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        while let Some(child) = self.first_child(from) {
            self.append(to, child);
        }
    }

    /// Replace a node with its children (unwrap).
    pub fn unwrap(&mut self, id: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        while let Some(child) = self.first_child(id) {
            self.insert_before(id, child);
        }
        self.detach(id);
    }

    /// Wrap a node in a freshly created (detached) wrapper, taking its place.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) {
        if self.parent(id).is_none() {
            return;
        }
        self.insert_before(id, wrapper);
        self.append(wrapper, id);
    }

    // ------------------------------------------------------------------
    // Element and text accessors
    // ------------------------------------------------------------------

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id)? {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.index())?.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn element_name(&self, id: NodeId) -> Option<&QName> {
        self.element(id).map(|e| &e.name)
    }

    pub fn attr(&self, id: NodeId, ns: Option<&str>, local: &str) -> Option<&str> {
        self.element(id)?.attr(ns, local)
    }

    pub fn set_attr(&mut self, id: NodeId, name: QName, value: impl Into<String>) {
        if let Some(e) = self.element_mut(id) {
            e.set_attr(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, ns: Option<&str>, local: &str) -> Option<String> {
        self.element_mut(id)?.remove_attr(ns, local)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Element(_)))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Text(_)))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Comment(_)))
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable text of a text node.
    pub fn text_mut(&mut self, id: NodeId) -> Option<&mut String> {
        match &mut self.nodes.get_mut(id.index())?.data {
            NodeData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Append text to the last child if it is a text node, otherwise add one.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(last) = self.last_child(parent)
            && let Some(existing) = self.text_mut(last)
        {
            existing.push_str(text);
            return;
        }
        let node = self.create_text(text);
        self.append(parent, node);
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// XPath-like location of a node, for diagnostics.
    ///
    /// Elements are written as `name[n]` (1-based among same-named element
    /// siblings), text nodes as `text()[n]`. Detached subtrees are prefixed
    /// with `(detached)`. Paths deeper than [`DESCRIBE_DEPTH`] keep the
    /// outermost step and the innermost ones, with `...` between.
    pub fn describe(&self, id: NodeId) -> String {
        let mut chain = Vec::new();
        let mut current = Some(id);
        let mut attached = false;

        while let Some(node) = current {
            if node == self.document {
                attached = true;
                break;
            }
            chain.push(node);
            current = self.parent(node);
        }

        let mut segments: Vec<String> = Vec::with_capacity(chain.len().min(DESCRIBE_DEPTH + 1));
        if chain.len() > DESCRIBE_DEPTH {
            segments.extend(chain[..DESCRIBE_DEPTH - 1].iter().map(|&n| self.describe_step(n)));
            segments.push("...".to_string());
            if let Some(&outermost) = chain.last() {
                segments.push(self.describe_step(outermost));
            }
        } else {
            segments.extend(chain.iter().map(|&n| self.describe_step(n)));
        }

        let mut out = String::new();
        if !attached {
            out.push_str("(detached)");
        }
        for segment in segments.iter().rev() {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    fn describe_step(&self, id: NodeId) -> String {
        let Some(parent) = self.parent(id) else {
            return match self.data(id) {
                Some(NodeData::Element(e)) => e.name.qualified(),
                Some(NodeData::Text(_)) => "text()".to_string(),
                _ => "node()".to_string(),
            };
        };

        let mut step = String::new();
        match self.data(id) {
            Some(NodeData::Element(e)) => {
                let position = self
                    .children(parent)
                    .take_while(|&c| c != id)
                    .filter(|&c| {
                        self.element_name(c)
                            .is_some_and(|n| n.is(e.name.ns.as_deref(), &e.name.local))
                    })
                    .count()
                    + 1;
                let _ = write!(step, "{}[{position}]", e.name.qualified());
            }
            Some(NodeData::Text(_)) => {
                let position = self
                    .children(parent)
                    .take_while(|&c| c != id)
                    .filter(|&c| self.is_text(c))
                    .count()
                    + 1;
                let _ = write!(step, "text()[{position}]");
            }
            Some(NodeData::Comment(_)) => step.push_str("comment()"),
            _ => step.push_str("node()"),
        }
        step
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Dom,
    current: Option<NodeId>,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.dom.next_sibling(id);
        Some(id)
    }
}

/// Iterator over strict ancestors, nearest first.
pub struct Ancestors<'a> {
    dom: &'a Dom,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.dom.parent(id);
        Some(id)
    }
}

/// Pre-order iterator over the descendants of a root.
pub struct Descendants<'a> {
    dom: &'a Dom,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.dom.next_in_order(id, self.root);
        Some(id)
    }
}
