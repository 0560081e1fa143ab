//! Highlight ranges
//!
//! A `HighlightRange` is a pair of DOM-style boundary points. Construction
//! validates offsets and ordering, so a range that exists is always
//! well-formed against the document it was built for.

use std::cmp::Ordering;

use thiserror::Error;

use crate::document::{Document, NodeId, NodeKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Node {0:?} does not belong to this document")]
    UnknownNode(NodeId),

    #[error("Range endpoints are not in the same tree")]
    Disconnected,

    #[error("Offset {offset} exceeds node length {length}")]
    OffsetOutOfBounds { offset: usize, length: usize },

    #[error("Range end precedes its start")]
    Inverted,
}

/// A position between characters (text nodes) or between children (elements)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    fn as_point(&self) -> (NodeId, usize) {
        (self.node, self.offset)
    }
}

/// A contiguous span of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRange {
    start: Boundary,
    end: Boundary,
}

/// The selected part of one text node: `node`, `from..to` in chars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSlice {
    pub node: NodeId,
    pub from: usize,
    pub to: usize,
}

impl HighlightRange {
    /// Build a range, validating both endpoints against `document`
    pub fn new(document: &Document, start: Boundary, end: Boundary) -> Result<Self, RangeError> {
        for boundary in [start, end] {
            if !document.contains_node(boundary.node) {
                return Err(RangeError::UnknownNode(boundary.node));
            }
            let length = document.length(boundary.node);
            if boundary.offset > length {
                return Err(RangeError::OffsetOutOfBounds {
                    offset: boundary.offset,
                    length,
                });
            }
        }

        if document.root_of(start.node) != document.root_of(end.node) {
            return Err(RangeError::Disconnected);
        }

        if document.compare_points(start.as_point(), end.as_point()) == Ordering::Greater {
            return Err(RangeError::Inverted);
        }

        Ok(Self { start, end })
    }

    /// Range covering `from..to` of a single text node
    pub fn within(
        document: &Document,
        node: NodeId,
        from: usize,
        to: usize,
    ) -> Result<Self, RangeError> {
        Self::new(document, Boundary::new(node, from), Boundary::new(node, to))
    }

    pub fn start(&self) -> Boundary {
        self.start
    }

    pub fn end(&self) -> Boundary {
        self.end
    }

    /// Start and end are the same boundary point
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Selected slices of every text node the range touches, in document order
    pub fn text_slices(&self, document: &Document) -> Vec<TextSlice> {
        let container = match document.common_ancestor(self.start.node, self.end.node) {
            Some(node) => node,
            None => return Vec::new(),
        };

        std::iter::once(container)
            .chain(document.descendants(container))
            .filter_map(|node| {
                let NodeKind::Text(text) = document.kind(node) else {
                    return None;
                };
                let length = text.chars().count();

                let ends_after_start =
                    document.compare_points((node, length), self.start.as_point())
                        == Ordering::Greater;
                let starts_before_end =
                    document.compare_points((node, 0), self.end.as_point()) == Ordering::Less;
                if !ends_after_start || !starts_before_end {
                    return None;
                }

                let from = if node == self.start.node { self.start.offset } else { 0 };
                let to = if node == self.end.node { self.end.offset } else { length };
                (from < to).then_some(TextSlice { node, from, to })
            })
            .collect()
    }

    /// Flattened text covered by the range
    pub fn text(&self, document: &Document) -> String {
        self.text_slices(document)
            .into_iter()
            .filter_map(|slice| {
                document.data_str(slice.node).map(|text| {
                    text.chars()
                        .skip(slice.from)
                        .take(slice.to - slice.from)
                        .collect::<String>()
                })
            })
            .collect()
    }

    /// Both endpoints lie inside the subtree rooted at `node`
    pub fn is_within(&self, document: &Document, node: NodeId) -> bool {
        document.is_inclusive_ancestor(node, self.start.node)
            && document.is_inclusive_ancestor(node, self.end.node)
    }
}
