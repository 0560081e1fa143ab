//! Registry of active highlights

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::layout::{Layout, Point};
use crate::range::HighlightRange;

/// Stable handle to a registered highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(u64);

impl HighlightId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for HighlightId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered set of highlight ranges
///
/// Iteration order is insertion order. Ids are never reused, so a removed
/// id stays dead even after `clear`.
#[derive(Debug, Clone, Default)]
pub struct RangeRegistry {
    entries: Vec<(HighlightId, HighlightRange)>,
    next_id: u64,
}

impl RangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a range; collapsed ranges are refused
    pub fn add(&mut self, range: HighlightRange) -> Option<HighlightId> {
        if range.is_collapsed() {
            tracing::debug!("refusing collapsed range");
            return None;
        }
        self.next_id += 1;
        let id = HighlightId(self.next_id);
        self.entries.push((id, range));
        Some(id)
    }

    /// Remove a highlight; `false` if it was not registered
    pub fn delete(&mut self, id: HighlightId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: HighlightId) -> Option<&HighlightRange> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, range)| range)
    }

    pub fn contains(&self, id: HighlightId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HighlightId, &HighlightRange)> + '_ {
        self.into_iter()
    }

    pub fn ids(&self) -> Vec<HighlightId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// First highlight, in insertion order, whose bounding box contains `point`
    pub fn hit_test<L: Layout + ?Sized>(
        &self,
        document: &Document,
        layout: &L,
        point: Point,
    ) -> Option<HighlightId> {
        self.iter()
            .find(|(_, range)| {
                layout
                    .bounding_rect(document, range)
                    .is_some_and(|rect| rect.contains(point))
            })
            .map(|(id, _)| id)
    }
}

impl<'a> IntoIterator for &'a RangeRegistry {
    type Item = (HighlightId, &'a HighlightRange);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (HighlightId, HighlightRange)>,
        fn(&'a (HighlightId, HighlightRange)) -> (HighlightId, &'a HighlightRange),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(entry_ref as fn(&'a _) -> _)
    }
}

fn entry_ref(entry: &(HighlightId, HighlightRange)) -> (HighlightId, &HighlightRange) {
    (entry.0, &entry.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NodeId, NodeKind};
    use crate::layout::FlowLayout;

    fn setup() -> (Document, Vec<NodeId>) {
        let doc = Document::parse("<div><p>Hello world</p><p>Second line</p></div>").unwrap();
        let texts = doc
            .descendants(doc.root())
            .filter(|n| matches!(doc.kind(*n), NodeKind::Text(_)))
            .collect();
        (doc, texts)
    }

    #[test]
    fn test_add_and_delete() {
        let (doc, t) = setup();
        let mut registry = RangeRegistry::new();
        let a = registry.add(HighlightRange::within(&doc, t[0], 0, 5).unwrap()).unwrap();
        let b = registry.add(HighlightRange::within(&doc, t[1], 0, 6).unwrap()).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.delete(a));
        assert!(!registry.delete(a));
        assert_eq!(registry.ids(), vec![b]);
    }

    #[test]
    fn test_collapsed_range_refused() {
        let (doc, t) = setup();
        let mut registry = RangeRegistry::new();
        assert_eq!(registry.add(HighlightRange::within(&doc, t[0], 3, 3).unwrap()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let (doc, t) = setup();
        let mut registry = RangeRegistry::new();
        let first = registry.add(HighlightRange::within(&doc, t[0], 0, 1).unwrap()).unwrap();
        registry.clear();
        let second = registry.add(HighlightRange::within(&doc, t[0], 0, 1).unwrap()).unwrap();
        assert_ne!(first, second);
        assert!(!registry.contains(first));
    }

    #[test]
    fn test_iteration_is_restartable() {
        let (doc, t) = setup();
        let mut registry = RangeRegistry::new();
        registry.add(HighlightRange::within(&doc, t[0], 0, 1).unwrap());
        registry.add(HighlightRange::within(&doc, t[1], 0, 1).unwrap());
        let first: Vec<_> = registry.iter().map(|(id, _)| id).collect();
        let second: Vec<_> = (&registry).into_iter().map(|(id, _)| id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hit_test_returns_first_match() {
        let (doc, t) = setup();
        let layout = FlowLayout::default();
        let mut registry = RangeRegistry::new();
        // "Hello world" occupies x 0..88 on line 0
        let wide = registry.add(HighlightRange::within(&doc, t[0], 0, 11).unwrap()).unwrap();
        let _narrow = registry.add(HighlightRange::within(&doc, t[0], 2, 4).unwrap()).unwrap();

        assert_eq!(registry.hit_test(&doc, &layout, Point::new(20.0, 8.0)), Some(wide));
        assert_eq!(registry.hit_test(&doc, &layout, Point::new(200.0, 8.0)), None);
        // second line
        assert_eq!(registry.hit_test(&doc, &layout, Point::new(4.0, 24.0)), None);
    }
}
