//! Geometry for hit-testing and affordance placement
//!
//! `Layout` is the seam to whatever renders the document. `FlowLayout` is a
//! deterministic fixed-advance layout: every character occupies one cell,
//! block-level elements start a new line, and lines wrap at a fixed column.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::{Document, NodeId, NodeKind};
use crate::range::HighlightRange;

/// A point in client coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Inclusive on all four edges
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// Source of geometry for ranges
pub trait Layout {
    /// Bounding rectangle of everything the range covers, `None` if it
    /// covers nothing visible
    fn bounding_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect>;

    /// Zero-width caret rectangle at the range start
    fn head_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.bounding_rect(document, range)
            .map(|rect| Rect::new(rect.x, rect.y, 0.0, rect.height))
    }
}

/// Fixed-advance flow layout
#[derive(Debug, Clone)]
pub struct FlowLayout {
    pub origin: Point,
    pub glyph_width: f32,
    pub line_height: f32,
    /// Characters per line before wrapping
    pub wrap_columns: usize,
    pub block_tags: Vec<String>,
    /// Elements whose content is never rendered
    pub hidden_tags: Vec<String>,
}

impl Default for FlowLayout {
    fn default() -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            glyph_width: 8.0,
            line_height: 16.0,
            wrap_columns: 80,
            block_tags: [
                "html", "body", "address", "article", "aside", "blockquote", "dd", "div", "dl",
                "dt", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
                "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr",
                "ul",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            hidden_tags: ["head", "script", "style", "title", "template"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

struct FlowCursor {
    line: usize,
    column: usize,
}

impl FlowCursor {
    fn break_line(&mut self) {
        if self.column > 0 {
            self.line += 1;
            self.column = 0;
        }
    }
}

impl FlowLayout {
    fn is_block(&self, tag: &str) -> bool {
        self.block_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    fn is_hidden(&self, tag: &str) -> bool {
        self.hidden_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Glyph boxes for every rendered text node
    pub fn glyphs(&self, document: &Document) -> HashMap<NodeId, Vec<Rect>> {
        let mut glyphs = HashMap::new();
        let mut cursor = FlowCursor { line: 0, column: 0 };
        self.flow(document, document.root(), &mut cursor, &mut glyphs);
        glyphs
    }

    fn flow(
        &self,
        document: &Document,
        node: NodeId,
        cursor: &mut FlowCursor,
        glyphs: &mut HashMap<NodeId, Vec<Rect>>,
    ) {
        match document.kind(node) {
            NodeKind::Text(text) => {
                let boxes = text
                    .chars()
                    .map(|ch| {
                        if cursor.column >= self.wrap_columns.max(1) {
                            cursor.break_line();
                        }
                        let rect = Rect::new(
                            self.origin.x + cursor.column as f32 * self.glyph_width,
                            self.origin.y + cursor.line as f32 * self.line_height,
                            self.glyph_width,
                            self.line_height,
                        );
                        if ch == '\n' {
                            cursor.break_line();
                        } else {
                            cursor.column += 1;
                        }
                        rect
                    })
                    .collect();
                glyphs.insert(node, boxes);
            }
            NodeKind::Element { tag, .. } => {
                if self.is_hidden(tag) {
                    return;
                }
                if tag.eq_ignore_ascii_case("br") {
                    cursor.line += 1;
                    cursor.column = 0;
                    return;
                }
                let block = self.is_block(tag);
                if block {
                    cursor.break_line();
                }
                for child in document.children(node) {
                    self.flow(document, *child, cursor, glyphs);
                }
                if block {
                    cursor.break_line();
                }
            }
            NodeKind::Document => {
                for child in document.children(node) {
                    self.flow(document, *child, cursor, glyphs);
                }
            }
            NodeKind::Comment(_) | NodeKind::ProcessingInstruction { .. } => {}
        }
    }

    fn selected_glyphs(&self, document: &Document, range: &HighlightRange) -> Vec<Rect> {
        let glyphs = self.glyphs(document);
        range
            .text_slices(document)
            .into_iter()
            .filter_map(|slice| {
                glyphs.get(&slice.node).map(|boxes| {
                    let from = slice.from.min(boxes.len());
                    let to = slice.to.min(boxes.len());
                    boxes[from..to].to_vec()
                })
            })
            .flatten()
            .collect()
    }
}

impl Layout for FlowLayout {
    fn bounding_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.selected_glyphs(document, range)
            .into_iter()
            .reduce(|acc, rect| acc.union(&rect))
    }

    fn head_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.selected_glyphs(document, range)
            .first()
            .map(|rect| Rect::new(rect.x, rect.y, 0.0, rect.height))
    }
}
