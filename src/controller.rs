//! Highlight controller
//!
//! Owns the document, the registry and the platform, and turns pointer input
//! into highlight creation and removal:
//!
//! ```text
//!        pointer up on a selection      confirm: add range
//!   Idle ─────────────────────────▶ PendingHighlight ──────────▶ Idle
//!     │
//!     │  click on a highlight           confirm: delete range
//!     └───────────────────────────▶ PendingRemoval ────────────▶ Idle
//!
//!   pointer down outside the shown affordance: dismiss, back to Idle
//! ```

use serde::Serialize;

use crate::config::HighlighterOptions;
use crate::document::Document;
use crate::error::{HighlightError, Result};
use crate::layout::Point;
use crate::path::{self, Anchor};
use crate::platform::{Affordance, Affordances, Platform};
use crate::range::HighlightRange;
use crate::registry::{HighlightId, RangeRegistry};
use crate::serialize::{self, HighlightDescriptor, RestoreReport};

/// Vertical distance from the selection head to the highlight button
pub const AFFORDANCE_OFFSET: f32 = 40.0;

/// Interaction state, as observed from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    PendingHighlight,
    PendingRemoval(HighlightId),
}

/// Result of `confirm`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Confirmation {
    Highlighted(HighlightId),
    Removed(HighlightId),
    Nothing,
}

enum Pending {
    Highlight {
        range: HighlightRange,
        affordance: Box<dyn Affordance>,
    },
    Removal {
        id: HighlightId,
        affordance: Box<dyn Affordance>,
    },
}

impl Pending {
    fn affordance(&self) -> &dyn Affordance {
        match self {
            Pending::Highlight { affordance, .. } | Pending::Removal { affordance, .. } => {
                affordance.as_ref()
            }
        }
    }

    fn dismiss(mut self) {
        match &mut self {
            Pending::Highlight { affordance, .. } | Pending::Removal { affordance, .. } => {
                affordance.dismiss()
            }
        }
    }
}

pub struct HighlightController<P: Platform> {
    document: Document,
    anchor: Anchor,
    options: HighlighterOptions,
    registry: RangeRegistry,
    platform: P,
    affordances: Affordances,
    pending: Option<Pending>,
    destroyed: bool,
}

impl<P: Platform> HighlightController<P> {
    /// Resolve the anchor and register the overlay style
    pub fn new(
        document: Document,
        options: HighlighterOptions,
        mut platform: P,
        affordances: Affordances,
    ) -> Result<Self> {
        options.validate()?;
        let anchor = Anchor::resolve(&document, options.anchor_element_id.as_deref())?;
        platform.register_overlay_style(&options.overlay_name, &options.highlight_style)?;

        tracing::info!(
            overlay = %options.overlay_name,
            anchor = ?options.anchor_element_id,
            "highlighter ready"
        );

        Ok(Self {
            document,
            anchor,
            options,
            registry: RangeRegistry::new(),
            platform,
            affordances,
            pending: None,
            destroyed: false,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn options(&self) -> &HighlighterOptions {
        &self.options
    }

    pub fn highlights(&self) -> &RangeRegistry {
        &self.registry
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn state(&self) -> InteractionState {
        match &self.pending {
            None => InteractionState::Idle,
            Some(Pending::Highlight { .. }) => InteractionState::PendingHighlight,
            Some(Pending::Removal { id, .. }) => InteractionState::PendingRemoval(*id),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(HighlightError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn refresh(&mut self) {
        self.platform.refresh_overlay(
            &self.options.overlay_name,
            &self.document,
            &self.anchor,
            &self.registry,
        );
    }

    /// Pointer pressed; cancels a pending action unless it lands on its affordance
    pub fn pointer_down(&mut self, point: Point) {
        let outside = self
            .pending
            .as_ref()
            .is_some_and(|pending| !pending.affordance().contains(point));
        if outside {
            self.cancel();
        }
    }

    /// Pointer released; offers to highlight a fresh selection
    ///
    /// Returns whether the highlight affordance is now shown.
    pub fn pointer_up(&mut self, _point: Point) -> bool {
        if self.destroyed || self.pending.is_some() {
            return false;
        }
        let Some(range) = self.platform.current_selection(&self.document) else {
            return false;
        };
        if range.is_collapsed() || !range.is_within(&self.document, self.anchor.node()) {
            return false;
        }
        let Some(head) = self.platform.head_rect(&self.document, &range) else {
            return false;
        };

        let affordance = self
            .affordances
            .highlight
            .show(Point::new(head.x, head.y - AFFORDANCE_OFFSET));
        self.pending = Some(Pending::Highlight { range, affordance });
        true
    }

    /// Click; offers to remove the first highlight under `point`
    pub fn click(&mut self, point: Point) -> Option<HighlightId> {
        if self.destroyed || self.pending.is_some() {
            return None;
        }
        let id = self.registry.hit_test(&self.document, &self.platform, point)?;
        let affordance = self.affordances.removal.show(point);
        self.pending = Some(Pending::Removal { id, affordance });
        Some(id)
    }

    /// Act on the shown affordance
    pub fn confirm(&mut self) -> Result<Confirmation> {
        self.ensure_alive()?;
        let Some(pending) = self.pending.take() else {
            return Ok(Confirmation::Nothing);
        };

        match pending {
            Pending::Highlight { range, mut affordance } => {
                affordance.dismiss();
                self.platform.clear_selection();
                match self.highlight(range)? {
                    Some(id) => Ok(Confirmation::Highlighted(id)),
                    None => Ok(Confirmation::Nothing),
                }
            }
            Pending::Removal { id, mut affordance } => {
                affordance.dismiss();
                if self.remove(id) {
                    Ok(Confirmation::Removed(id))
                } else {
                    Ok(Confirmation::Nothing)
                }
            }
        }
    }

    /// Dismiss any shown affordance and clear the selection
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            if matches!(pending, Pending::Highlight { .. }) {
                self.platform.clear_selection();
            }
            pending.dismiss();
        }
    }

    /// Highlight the current selection directly
    pub fn highlight_selection(&mut self) -> Result<Option<HighlightId>> {
        self.ensure_alive()?;
        let range = self
            .platform
            .current_selection(&self.document)
            .ok_or(HighlightError::EmptySelection)?;
        let id = self.highlight(range)?;
        self.platform.clear_selection();
        Ok(id)
    }

    /// Register `range`; `None` for a collapsed range
    ///
    /// Fails when the range does not belong to this document, leaves the
    /// anchor, or touches a node that cannot be persisted.
    pub fn highlight(&mut self, range: HighlightRange) -> Result<Option<HighlightId>> {
        self.ensure_alive()?;
        let range = HighlightRange::new(&self.document, range.start(), range.end())?;
        if !range.is_within(&self.document, self.anchor.node()) {
            return Err(HighlightError::OutsideAnchor);
        }
        path::encode(&self.document, range.start().node, &self.anchor)?;
        path::encode(&self.document, range.end().node, &self.anchor)?;

        let id = self.registry.add(range);
        if let Some(id) = id {
            tracing::debug!(%id, "highlight added");
            self.refresh();
        }
        Ok(id)
    }

    pub fn remove(&mut self, id: HighlightId) -> bool {
        let removed = self.registry.delete(id);
        if removed {
            tracing::debug!(%id, "highlight removed");
            self.refresh();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.registry.clear();
        self.refresh();
    }

    pub fn descriptors(&self, capture_text: bool) -> Vec<HighlightDescriptor> {
        serialize::serialize(&self.registry, &self.document, &self.anchor, capture_text)
    }

    /// Active highlights as a JSON array
    pub fn serialize(&self, capture_text: bool) -> Result<String> {
        serialize::to_json(&self.descriptors(capture_text))
    }

    /// Restore highlights from a JSON array
    ///
    /// Malformed input fails before the registry is touched.
    pub fn deserialize(&mut self, text: &str, replace_existing: bool) -> Result<RestoreReport> {
        let descriptors = serialize::from_json(text)?;
        self.restore(&descriptors, replace_existing)
    }

    pub fn restore(
        &mut self,
        descriptors: &[HighlightDescriptor],
        replace_existing: bool,
    ) -> Result<RestoreReport> {
        self.ensure_alive()?;
        let report = serialize::deserialize(
            descriptors,
            &self.document,
            &self.anchor,
            &mut self.registry,
            replace_existing,
        );
        self.refresh();
        Ok(report)
    }

    /// Release the overlay and dismiss any affordance; safe to call twice
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.cancel();
        self.platform.unregister_overlay_style(&self.options.overlay_name);
        self.destroyed = true;
        tracing::debug!(overlay = %self.options.overlay_name, "highlighter destroyed");
    }
}

impl<P: Platform> Drop for HighlightController<P> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NodeId, NodeKind, NodeType};
    use crate::layout::Rect;
    use crate::path::PathError;
    use crate::platform::{FloatingButtonFactory, HeadlessPlatform};
    use crate::range::{Boundary, RangeError};

    const MARKUP: &str = concat!(
        r#"<html><body><p>Outside</p><div id="app"><article>"#,
        r#"<p>First paragraph</p><p>Second <b>bold</b></p>"#,
        r#"</article></div></body></html>"#,
    );

    struct Harness {
        controller: HighlightController<HeadlessPlatform>,
        highlight_buttons: FloatingButtonFactory,
        removal_buttons: FloatingButtonFactory,
        texts: Vec<NodeId>,
    }

    fn harness() -> Harness {
        let document = Document::parse(MARKUP).unwrap();
        let texts = document
            .descendants(document.root())
            .filter(|n| matches!(document.kind(*n), NodeKind::Text(_)))
            .collect();
        let highlight_buttons = FloatingButtonFactory::new("Highlight");
        let removal_buttons = FloatingButtonFactory::new("Remove");
        let controller = HighlightController::new(
            document,
            HighlighterOptions::default().with_anchor("app"),
            HeadlessPlatform::new(),
            Affordances::new(highlight_buttons.clone(), removal_buttons.clone()),
        )
        .unwrap();
        Harness {
            controller,
            highlight_buttons,
            removal_buttons,
            texts,
        }
    }

    fn select(h: &mut Harness, node: usize, from: usize, to: usize) {
        let range =
            HighlightRange::within(h.controller.document(), h.texts[node], from, to).unwrap();
        h.controller.platform_mut().select(range);
    }

    #[test]
    fn test_new_registers_overlay() {
        let h = harness();
        assert!(h.controller.platform().is_registered("TextHighlighter-default"));
        assert_eq!(h.controller.state(), InteractionState::Idle);
    }

    #[test]
    fn test_new_rejects_missing_anchor() {
        let result = HighlightController::new(
            Document::parse(MARKUP).unwrap(),
            HighlighterOptions::default().with_anchor("nope"),
            HeadlessPlatform::new(),
            Affordances::default(),
        );
        assert!(matches!(result, Err(HighlightError::AnchorNotFound(_))));
    }

    #[test]
    fn test_highlight_flow() {
        let mut h = harness();
        // "First paragraph" is on line 1, after "Outside" on line 0
        select(&mut h, 1, 6, 15);
        assert!(h.controller.pointer_up(Point::new(100.0, 20.0)));
        assert_eq!(h.controller.state(), InteractionState::PendingHighlight);
        assert_eq!(h.highlight_buttons.visible(), vec![Rect::new(48.0, -24.0, 80.0, 30.0)]);

        // pressing on the button keeps it
        h.controller.pointer_down(Point::new(60.0, -10.0));
        let confirmation = h.controller.confirm().unwrap();
        let Confirmation::Highlighted(id) = confirmation else {
            panic!("unexpected confirmation: {:?}", confirmation);
        };

        assert_eq!(h.controller.state(), InteractionState::Idle);
        assert!(h.highlight_buttons.visible().is_empty());
        assert!(h.controller.platform().selection().is_none());
        assert_eq!(h.controller.highlights().ids(), vec![id]);
        assert_eq!(h.controller.platform().painted("TextHighlighter-default"), &[id]);
    }

    #[test]
    fn test_pointer_down_outside_cancels() {
        let mut h = harness();
        select(&mut h, 1, 0, 5);
        assert!(h.controller.pointer_up(Point::new(0.0, 20.0)));

        h.controller.pointer_down(Point::new(500.0, 500.0));
        assert_eq!(h.controller.state(), InteractionState::Idle);
        assert!(h.highlight_buttons.visible().is_empty());
        assert!(h.controller.platform().selection().is_none());
        assert!(h.controller.highlights().is_empty());
    }

    #[test]
    fn test_selection_outside_anchor_ignored() {
        let mut h = harness();
        select(&mut h, 0, 0, 7);
        assert!(!h.controller.pointer_up(Point::new(0.0, 0.0)));
        assert_eq!(h.controller.state(), InteractionState::Idle);

        let range = HighlightRange::within(h.controller.document(), h.texts[0], 0, 7).unwrap();
        assert!(matches!(h.controller.highlight(range), Err(HighlightError::OutsideAnchor)));
    }

    #[test]
    fn test_collapsed_selection_ignored() {
        let mut h = harness();
        select(&mut h, 1, 3, 3);
        assert!(!h.controller.pointer_up(Point::new(0.0, 20.0)));
        assert!(matches!(h.controller.highlight_selection(), Ok(None)));
    }

    #[test]
    fn test_removal_flow() {
        let mut h = harness();
        select(&mut h, 1, 0, 5);
        let id = h.controller.highlight_selection().unwrap().unwrap();

        // "First" spans x 0..40 on line 1 (y 16..32)
        assert_eq!(h.controller.click(Point::new(400.0, 24.0)), None);
        assert_eq!(h.controller.click(Point::new(12.0, 24.0)), Some(id));
        assert_eq!(h.controller.state(), InteractionState::PendingRemoval(id));
        assert_eq!(h.removal_buttons.visible().len(), 1);

        assert_eq!(h.controller.confirm().unwrap(), Confirmation::Removed(id));
        assert!(h.controller.highlights().is_empty());
        assert!(h.removal_buttons.visible().is_empty());
    }

    #[test]
    fn test_highlight_rejects_range_from_other_document() {
        let h = harness();
        let foreign = h.texts[3];
        let range = HighlightRange::within(h.controller.document(), foreign, 0, 4).unwrap();

        let mut small = HighlightController::new(
            Document::parse("<p>x</p>").unwrap(),
            HighlighterOptions::default(),
            HeadlessPlatform::new(),
            Affordances::default(),
        )
        .unwrap();
        assert!(matches!(
            small.highlight(range),
            Err(HighlightError::Range(RangeError::UnknownNode(_)))
        ));
        assert!(small.highlights().is_empty());
    }

    #[test]
    fn test_highlight_rejects_unencodable_endpoint() {
        let document = Document::parse(r#"<div id="app"><p>text<!--note--></p></div>"#).unwrap();
        let p = document
            .descendants(document.root())
            .find(|n| document.tag_name(*n) == Some("p"))
            .unwrap();
        let text = document.children(p)[0];
        let comment = document.children(p)[1];
        let range =
            HighlightRange::new(&document, Boundary::new(text, 0), Boundary::new(comment, 2))
                .unwrap();

        let mut controller = HighlightController::new(
            document,
            HighlighterOptions::default().with_anchor("app"),
            HeadlessPlatform::new(),
            Affordances::default(),
        )
        .unwrap();
        assert!(matches!(
            controller.highlight(range),
            Err(HighlightError::Path(PathError::UnsupportedNode(NodeType::Comment)))
        ));
        assert!(controller.highlights().is_empty());
        assert!(controller.platform().painted("TextHighlighter-default").is_empty());
    }

    #[test]
    fn test_restore_skips_ranges_outside_anchor() {
        let mut h = harness();
        let saved = r#"[
            {"startContainer": "/html[1]/body[1]/p[1]/text()[1]", "startOffset": 0,
             "endContainer": "/html[1]/body[1]/p[1]/text()[1]", "endOffset": 7}
        ]"#;
        let report = h.controller.deserialize(saved, false).unwrap();
        assert_eq!(report.skipped[0].reason, crate::serialize::SkipReason::OutsideAnchor);
        assert!(h.controller.highlights().is_empty());
        assert_eq!(h.controller.serialize(false).unwrap(), "[]");
    }

    #[test]
    fn test_confirm_without_pending() {
        let mut h = harness();
        assert_eq!(h.controller.confirm().unwrap(), Confirmation::Nothing);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut h = harness();
        select(&mut h, 3, 0, 4);
        h.controller.highlight_selection().unwrap();
        let saved = h.controller.serialize(true).unwrap();
        assert!(saved.contains("\"text\":\"bold\""));
        assert_eq!(saved, h.controller.serialize(true).unwrap());

        let report = h.controller.deserialize(&saved, true).unwrap();
        assert_eq!(report.restored_count(), 1);
        assert_eq!(h.controller.serialize(true).unwrap(), saved);
    }

    #[test]
    fn test_malformed_input_leaves_registry() {
        let mut h = harness();
        select(&mut h, 1, 0, 5);
        h.controller.highlight_selection().unwrap();

        let result = h.controller.deserialize("not json", true);
        assert!(matches!(result, Err(HighlightError::MalformedInput(_))));
        assert_eq!(h.controller.highlights().len(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut h = harness();
        select(&mut h, 1, 0, 5);
        h.controller.pointer_up(Point::new(0.0, 20.0));

        h.controller.destroy();
        assert!(h.controller.is_destroyed());
        assert!(!h.controller.platform().is_registered("TextHighlighter-default"));
        assert!(h.highlight_buttons.visible().is_empty());

        h.controller.destroy();
        assert!(matches!(h.controller.confirm(), Err(HighlightError::Destroyed)));
    }
}
