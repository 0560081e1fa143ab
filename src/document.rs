//! Document tree
//!
//! An arena-backed node tree standing in for the rendered page. Nodes are
//! addressed by `NodeId` handles, so identity comparisons are handle
//! comparisons. A `NodeId` is only meaningful for the document that issued it.
//!
//! Documents are loaded from XHTML markup (the same well-formed content EPUB
//! chapters use) or assembled programmatically.

use std::cmp::Ordering;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("XML parse error: {0}")]
    XmlError(String),

    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Node {0:?} cannot have children")]
    NotAContainer(NodeId),

    #[error("Node {0:?} is not a child of {1:?}")]
    NotAChild(NodeId, NodeId),

    #[error("Node {0:?} is already attached")]
    AlreadyAttached(NodeId),

    #[error("Inserting {0:?} would create a cycle")]
    Cycle(NodeId),
}

/// Handle to a node inside a `Document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// DOM-style node type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        value: String,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    /// Create an empty document holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse XHTML markup into a document
    pub fn parse(markup: &str) -> Result<Self, DocumentError> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let xml = roxmltree::Document::parse_with_options(markup, options)
            .map_err(|e| DocumentError::XmlError(e.to_string()))?;

        let mut document = Self::new();
        let root = document.root();
        for child in xml.root().children() {
            document.import(child, root);
        }

        tracing::debug!(nodes = document.nodes.len(), "parsed document");
        Ok(document)
    }

    fn import(&mut self, source: roxmltree::Node<'_, '_>, parent: NodeId) {
        let kind = if source.is_element() {
            NodeKind::Element {
                tag: source.tag_name().name().to_string(),
                attributes: source
                    .attributes()
                    .map(|a| (a.name().to_string(), a.value().to_string()))
                    .collect(),
            }
        } else if source.is_text() {
            NodeKind::Text(source.text().unwrap_or_default().to_string())
        } else if source.is_comment() {
            NodeKind::Comment(source.text().unwrap_or_default().to_string())
        } else if let Some(pi) = source.pi() {
            NodeKind::ProcessingInstruction {
                target: pi.target.to_string(),
                value: pi.value.unwrap_or_default().to_string(),
            }
        } else {
            return;
        };

        let id = self.push(kind);
        self.attach(parent, id, None);
        for child in source.children() {
            self.import(child, id);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, at: Option<usize>) {
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match at {
            Some(index) => children.insert(index, child),
            None => children.push(child),
        }
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0]
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Whether `node` was issued by this document
    pub fn contains_node(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    /// Set (or replace) an attribute on an element
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        self.check(node)?;
        match &mut self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => {
                if let Some(existing) = attributes.iter_mut().find(|(n, _)| n == name) {
                    existing.1 = value.to_string();
                } else {
                    attributes.push((name.to_string(), value.to_string()));
                }
                Ok(())
            }
            _ => Err(DocumentError::NotAContainer(node)),
        }
    }

    /// Append a detached node as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.check_insertion(parent, child)?;
        self.attach(parent, child, None);
        Ok(())
    }

    /// Insert a detached node before `reference`, an existing child of `parent`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DocumentError> {
        self.check_insertion(parent, child)?;
        let index = self
            .data(parent)
            .children
            .iter()
            .position(|c| *c == reference)
            .ok_or(DocumentError::NotAChild(reference, parent))?;
        self.attach(parent, child, Some(index));
        Ok(())
    }

    fn check(&self, node: NodeId) -> Result<(), DocumentError> {
        if self.contains_node(node) {
            Ok(())
        } else {
            Err(DocumentError::NodeNotFound(node))
        }
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.check(parent)?;
        self.check(child)?;
        if !matches!(
            self.kind(parent),
            NodeKind::Document | NodeKind::Element { .. }
        ) {
            return Err(DocumentError::NotAContainer(parent));
        }
        if self.data(child).parent.is_some() || child == self.root() {
            return Err(DocumentError::AlreadyAttached(child));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DocumentError::Cycle(child));
        }
        Ok(())
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.data(node).kind
    }

    pub fn node_type(&self, node: NodeId) -> NodeType {
        match self.kind(node) {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.data(node).children
    }

    /// Position of `node` among its parent's children
    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|c| *c == node)
    }

    /// Siblings before `node`, nearest first
    pub fn preceding_siblings(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let siblings: &[NodeId] = match (self.parent(node), self.index_in_parent(node)) {
            (Some(parent), Some(index)) => &self.children(parent)[..index],
            _ => &[],
        };
        siblings.iter().rev().copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.preceding_siblings(node).next()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "id")
    }

    /// Character data of text, comment and processing-instruction nodes
    pub fn data_str(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            NodeKind::ProcessingInstruction { value, .. } => Some(value),
            _ => None,
        }
    }

    /// DOM node length: characters for character data, children otherwise
    pub fn length(&self, node: NodeId) -> usize {
        match self.data_str(node) {
            Some(text) => text.chars().count(),
            None => self.children(node).len(),
        }
    }

    /// Descendants of `node` in document order, excluding `node` itself
    pub fn descendants(&self, node: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(node).to_vec();
        stack.reverse();
        Descendants {
            document: self,
            stack,
        }
    }

    /// Elements carrying `id`, in document order
    pub fn elements_with_id(&self, id: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .filter(|n| self.id(*n) == Some(id))
            .collect()
    }

    /// First element carrying `id`, in document order
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root()).find(|n| self.id(*n) == Some(id))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, node: NodeId) -> String {
        if let NodeKind::Text(text) = self.kind(node) {
            return text.clone();
        }
        self.descendants(node)
            .filter_map(|n| match self.kind(n) {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Topmost ancestor of `node`; the document node for attached nodes
    pub fn root_of(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.root_of(node) == self.root()
    }

    /// Deepest node that is an inclusive ancestor of both `a` and `b`
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut current = Some(a);
        while let Some(n) = current {
            if self.is_inclusive_ancestor(n, b) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Child indices leading from the tree root down to `node`
    pub fn tree_position(&self, node: NodeId) -> Vec<usize> {
        let mut position = Vec::new();
        let mut current = node;
        while let Some(index) = self.index_in_parent(current) {
            position.push(index);
            current = self.parent(current).unwrap_or(current);
        }
        position.reverse();
        position
    }

    /// Compare two nodes in document order
    pub fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.tree_position(a).cmp(&self.tree_position(b))
    }

    /// Compare two boundary points `(node, offset)` in document order
    ///
    /// A point is keyed by its node's tree position followed by the offset.
    /// Lexicographic order on these keys matches DOM boundary-point order:
    /// `(parent, i)` sorts before everything inside child `i`, and after
    /// everything inside children `< i`.
    pub fn compare_points(&self, a: (NodeId, usize), b: (NodeId, usize)) -> Ordering {
        if a.0 == b.0 {
            return a.1.cmp(&b.1);
        }
        let mut key_a = self.tree_position(a.0);
        key_a.push(a.1);
        let mut key_b = self.tree_position(b.0);
        key_b.push(b.1);
        key_a.cmp(&key_b)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order traversal over a subtree
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.document.children(node).iter().rev().copied());
        Some(node)
    }
}
