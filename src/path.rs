//! Structural paths
//!
//! Encodes a node as the walk from an anchor down to it, and resolves such a
//! walk back to a node. Paths are a subset of XPath:
//!
//! ```text
//! //*[@id="app"]/article[1]/p[2]/b[1]/text()[1]
//! │              │          │    │    └── 1st text node among its siblings
//! │              │          │    └─────── 1st <b> among its siblings
//! │              │          └──────────── 2nd <p> among its siblings
//! │              └─────────────────────── 1st <article>
//! └────────────────────────────────────── anchor element, located by id
//! ```
//!
//! Sibling indices only count *preceding* siblings of the same kind, so a
//! path survives content appended after the node but goes stale when content
//! is inserted before it.
//!
//! Grammar (accepted by `parse`):
//! ```text
//! path      = "/" | ("/" | "//") step { ("/" | "//") step }
//! step      = test { predicate }
//! test      = name | "*" | "text()"
//! predicate = "[" number "]" | "[@" name "=" quoted "]"
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Document, NodeId, NodeKind, NodeType};
use crate::error::{HighlightError, Result};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty path")]
    Empty,

    #[error("Path must start with '/'")]
    NotAbsolute,

    #[error("Expected step at position {0}")]
    ExpectedStep(usize),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed predicate at position {0}")]
    UnclosedPredicate(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("{0:?} nodes cannot be addressed by a structural path")]
    UnsupportedNode(NodeType),

    #[error("Node is outside the anchor subtree")]
    OutsideAnchor,
}

/// Serialized structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralPath(String);

impl StructuralPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<StructuralPath> for String {
    fn from(path: StructuralPath) -> Self {
        path.0
    }
}

/// The node every path is relative to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// The whole document
    Document(NodeId),
    /// An element located by a unique id
    Element { node: NodeId, id: String },
}

impl Anchor {
    /// Resolve the configured anchor; the document when `id` is `None`
    pub fn resolve(document: &Document, id: Option<&str>) -> Result<Self> {
        let Some(id) = id else {
            return Ok(Anchor::Document(document.root()));
        };

        match document.elements_with_id(id).as_slice() {
            [] => Err(HighlightError::AnchorNotFound(id.to_string())),
            [node] => Ok(Anchor::Element {
                node: *node,
                id: id.to_string(),
            }),
            _ => Err(HighlightError::AnchorIdNotUnique(id.to_string())),
        }
    }

    pub fn node(&self) -> NodeId {
        match self {
            Anchor::Document(node) | Anchor::Element { node, .. } => *node,
        }
    }
}

/// Encode `node` as a path relative to `anchor`
pub fn encode(
    document: &Document,
    node: NodeId,
    anchor: &Anchor,
) -> std::result::Result<StructuralPath, PathError> {
    let mut segments = Vec::new();
    let mut current = node;

    while current != anchor.node() {
        let segment = match document.kind(current) {
            NodeKind::Element { tag, .. } => {
                let index = 1 + document
                    .preceding_siblings(current)
                    .filter(|s| document.tag_name(*s).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
                    .count();
                format!("{}[{}]", tag.to_ascii_lowercase(), index)
            }
            NodeKind::Text(_) => {
                let index = 1 + document
                    .preceding_siblings(current)
                    .filter(|s| document.node_type(*s) == NodeType::Text)
                    .count();
                format!("text()[{}]", index)
            }
            NodeKind::Document => return Err(PathError::OutsideAnchor),
            _ => return Err(PathError::UnsupportedNode(document.node_type(current))),
        };
        segments.push(segment);
        current = document.parent(current).ok_or(PathError::OutsideAnchor)?;
    }

    segments.reverse();
    if let Anchor::Element { id, .. } = anchor {
        segments.insert(0, format!("/*[@id=\"{}\"]", id));
    }

    Ok(StructuralPath(format!("/{}", segments.join("/"))))
}

/// Resolve a path string against `document`
///
/// `None` means the endpoint cannot be restored, whether the path is
/// syntactically unsupported or simply matches nothing.
pub fn decode(path: &str, document: &Document) -> Option<NodeId> {
    match parse(path) {
        Ok(location) => location.resolve(document),
        Err(e) => {
            tracing::debug!(path, error = %e, "unparseable structural path");
            None
        }
    }
}

/// Parsed location path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPath {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `/step`
    Child,
    /// `//step`, i.e. `descendant-or-self::node()/child::step`
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(String),
    AnyElement,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// 1-based position among the nodes matched so far
    Position(usize),
    AttributeEquals { name: String, value: String },
}

impl NodeTest {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        match (self, document.kind(node)) {
            (NodeTest::Name(name), NodeKind::Element { tag, .. }) => tag.eq_ignore_ascii_case(name),
            (NodeTest::AnyElement, NodeKind::Element { .. }) => true,
            (NodeTest::Text, NodeKind::Text(_)) => true,
            _ => false,
        }
    }
}

impl LocationPath {
    /// First matching node in document order
    pub fn resolve(&self, document: &Document) -> Option<NodeId> {
        let mut context = vec![document.root()];

        for step in &self.steps {
            let bases: Vec<NodeId> = match step.axis {
                Axis::Child => context,
                Axis::Descendant => {
                    let mut seen = HashSet::new();
                    context
                        .iter()
                        .flat_map(|n| std::iter::once(*n).chain(document.descendants(*n)))
                        .filter(|n| seen.insert(*n))
                        .collect()
                }
            };

            let mut matched: Vec<NodeId> = bases
                .into_iter()
                .flat_map(|base| step.select(document, base))
                .collect();
            if matched.is_empty() {
                return None;
            }
            matched.sort_by_cached_key(|n| document.tree_position(*n));
            matched.dedup();
            context = matched;
        }

        context.first().copied()
    }
}

impl Step {
    fn select(&self, document: &Document, base: NodeId) -> Vec<NodeId> {
        let mut candidates: Vec<NodeId> = document
            .children(base)
            .iter()
            .copied()
            .filter(|c| self.test.matches(document, *c))
            .collect();

        for predicate in &self.predicates {
            candidates = match predicate {
                Predicate::Position(n) => n
                    .checked_sub(1)
                    .and_then(|i| candidates.get(i).copied())
                    .into_iter()
                    .collect(),
                Predicate::AttributeEquals { name, value } => candidates
                    .into_iter()
                    .filter(|c| document.attribute(*c, name) == Some(value.as_str()))
                    .collect(),
            };
        }
        candidates
    }
}

impl fmt::Display for LocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            f.write_str(match step.axis {
                Axis::Child => "/",
                Axis::Descendant => "//",
            })?;
            match &step.test {
                NodeTest::Name(name) => f.write_str(name)?,
                NodeTest::AnyElement => f.write_str("*")?,
                NodeTest::Text => f.write_str("text()")?,
            }
            for predicate in &step.predicates {
                match predicate {
                    Predicate::Position(n) => write!(f, "[{}]", n)?,
                    Predicate::AttributeEquals { name, value } => {
                        write!(f, "[@{}=\"{}\"]", name, value)?
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> std::result::Result<(), PathError> {
        if self.skip_if(expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> PathError {
        match self.peek() {
            Some(ch) => PathError::UnexpectedChar(ch, self.pos),
            None => PathError::UnclosedPredicate(self.pos),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn parse_number(&mut self) -> std::result::Result<usize, PathError> {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return Err(PathError::ExpectedNumber(start));
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| PathError::ExpectedNumber(start))
    }

    fn parse_name(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                self.advance();
            }
            _ => return None,
        }
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':'))
        {
            self.advance();
        }
        Some(self.input[start..self.pos].to_string())
    }

    fn parse_quoted(&mut self) -> std::result::Result<String, PathError> {
        let start = self.pos;
        let quote = match self.advance() {
            Some(q @ ('"' | '\'')) => q,
            Some(ch) => return Err(PathError::UnexpectedChar(ch, start)),
            None => return Err(PathError::UnclosedPredicate(start)),
        };
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(value),
                Some(ch) => value.push(ch),
                None => return Err(PathError::UnclosedPredicate(start)),
            }
        }
    }

    fn parse_predicate(&mut self) -> std::result::Result<Predicate, PathError> {
        let predicate = if self.skip_if('@') {
            let name = self
                .parse_name()
                .ok_or_else(|| self.unexpected())?;
            self.expect('=')?;
            let value = self.parse_quoted()?;
            Predicate::AttributeEquals { name, value }
        } else {
            Predicate::Position(self.parse_number()?)
        };
        self.expect(']')?;
        Ok(predicate)
    }

    fn parse_step(&mut self, axis: Axis) -> std::result::Result<Step, PathError> {
        let start = self.pos;
        let test = if self.skip_str("text()") {
            NodeTest::Text
        } else if self.skip_if('*') {
            NodeTest::AnyElement
        } else {
            NodeTest::Name(self.parse_name().ok_or(PathError::ExpectedStep(start))?)
        };

        let mut predicates = Vec::new();
        while self.skip_if('[') {
            predicates.push(self.parse_predicate()?);
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse(&mut self) -> std::result::Result<LocationPath, PathError> {
        if self.input.is_empty() {
            return Err(PathError::Empty);
        }
        if self.peek() != Some('/') {
            return Err(PathError::NotAbsolute);
        }
        if self.input == "/" {
            return Ok(LocationPath { steps: Vec::new() });
        }

        let mut steps = Vec::new();
        while !self.at_end() {
            if !self.skip_if('/') {
                return Err(self.unexpected());
            }
            let axis = if self.skip_if('/') {
                Axis::Descendant
            } else {
                Axis::Child
            };
            steps.push(self.parse_step(axis)?);
        }

        Ok(LocationPath { steps })
    }
}

/// Parse a path string
pub fn parse(path: &str) -> std::result::Result<LocationPath, PathError> {
    Parser::new(path).parse()
}
