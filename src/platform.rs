//! Host capabilities
//!
//! The controller never touches a rendering surface directly. Everything it
//! needs from the host (selection, overlay painting, geometry, floating
//! buttons) comes through the traits in this module. `HeadlessPlatform` and
//! `FloatingButtonFactory` are in-memory implementations used by native
//! builds and tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use crate::config::HighlightStyle;
use crate::document::Document;
use crate::layout::{FlowLayout, Layout, Point, Rect};
use crate::path::Anchor;
use crate::range::HighlightRange;
use crate::registry::{HighlightId, RangeRegistry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Failed to register overlay '{0}'")]
    OverlayRegistration(String),

    #[error("Overlay '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Selection, overlay and geometry services of the host
pub trait Platform: Layout {
    /// The user's current selection, if any
    fn current_selection(&self, document: &Document) -> Option<HighlightRange>;

    fn clear_selection(&mut self);

    /// Install the paint rule for `name`
    fn register_overlay_style(
        &mut self,
        name: &str,
        style: &HighlightStyle,
    ) -> Result<(), PlatformError>;

    /// Remove the paint rule for `name`; unknown names are ignored
    fn unregister_overlay_style(&mut self, name: &str);

    /// Repaint `name` with the active set
    fn refresh_overlay(
        &mut self,
        _name: &str,
        _document: &Document,
        _anchor: &Anchor,
        _registry: &RangeRegistry,
    ) {
    }
}

/// A visible, clickable affordance
pub trait Affordance {
    fn contains(&self, point: Point) -> bool;

    fn dismiss(&mut self);
}

/// Creates affordances of one kind
pub trait AffordanceFactory {
    fn show(&mut self, at: Point) -> Box<dyn Affordance>;
}

/// The two affordance kinds the controller uses
pub struct Affordances {
    pub highlight: Box<dyn AffordanceFactory>,
    pub removal: Box<dyn AffordanceFactory>,
}

impl Affordances {
    pub fn new(
        highlight: impl AffordanceFactory + 'static,
        removal: impl AffordanceFactory + 'static,
    ) -> Self {
        Self {
            highlight: Box::new(highlight),
            removal: Box::new(removal),
        }
    }

    /// Floating buttons labelled "Highlight" and "Remove"
    pub fn floating_buttons() -> Self {
        Self::new(
            FloatingButtonFactory::new("Highlight"),
            FloatingButtonFactory::new("Remove"),
        )
    }
}

impl Default for Affordances {
    fn default() -> Self {
        Self::floating_buttons()
    }
}

#[derive(Debug, Clone)]
struct Overlay {
    css: String,
    painted: Vec<HighlightId>,
}

/// In-memory platform
///
/// The selection is whatever was last passed to `select`; overlay rules are
/// kept as rendered CSS text.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform {
    layout: FlowLayout,
    selection: Option<HighlightRange>,
    overlays: BTreeMap<String, Overlay>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: FlowLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn layout(&self) -> &FlowLayout {
        &self.layout
    }

    /// Simulate the user selecting `range`
    pub fn select(&mut self, range: HighlightRange) {
        self.selection = Some(range);
    }

    pub fn selection(&self) -> Option<&HighlightRange> {
        self.selection.as_ref()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.overlays.contains_key(name)
    }

    /// Rendered CSS of a registered overlay
    pub fn overlay_rule(&self, name: &str) -> Option<&str> {
        self.overlays.get(name).map(|o| o.css.as_str())
    }

    /// Ids painted by the last refresh of `name`
    pub fn painted(&self, name: &str) -> &[HighlightId] {
        self.overlays
            .get(name)
            .map(|o| o.painted.as_slice())
            .unwrap_or_default()
    }
}

impl Layout for HeadlessPlatform {
    fn bounding_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.layout.bounding_rect(document, range)
    }

    fn head_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.layout.head_rect(document, range)
    }
}

impl Platform for HeadlessPlatform {
    fn current_selection(&self, document: &Document) -> Option<HighlightRange> {
        // a stale selection from another document must not leak through
        let range = self.selection.as_ref()?;
        HighlightRange::new(document, range.start(), range.end()).ok()
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn register_overlay_style(
        &mut self,
        name: &str,
        style: &HighlightStyle,
    ) -> Result<(), PlatformError> {
        if self.overlays.contains_key(name) {
            return Err(PlatformError::AlreadyRegistered(name.to_string()));
        }
        self.overlays.insert(
            name.to_string(),
            Overlay {
                css: style.to_css_rule(name),
                painted: Vec::new(),
            },
        );
        Ok(())
    }

    fn unregister_overlay_style(&mut self, name: &str) {
        self.overlays.remove(name);
    }

    fn refresh_overlay(
        &mut self,
        name: &str,
        _document: &Document,
        _anchor: &Anchor,
        registry: &RangeRegistry,
    ) {
        if let Some(overlay) = self.overlays.get_mut(name) {
            overlay.painted = registry.ids();
        }
    }
}

/// Visible buttons, shared between a factory and its buttons
#[derive(Debug, Default)]
pub struct ButtonTray {
    next: u64,
    visible: Vec<(u64, Rect)>,
}

/// Shows fixed-size buttons whose top-left corner is the requested point
#[derive(Debug, Clone)]
pub struct FloatingButtonFactory {
    pub label: String,
    pub width: f32,
    pub height: f32,
    tray: Rc<RefCell<ButtonTray>>,
}

impl FloatingButtonFactory {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            width: 80.0,
            height: 30.0,
            tray: Rc::new(RefCell::new(ButtonTray::default())),
        }
    }

    /// Bounds of every button currently shown
    pub fn visible(&self) -> Vec<Rect> {
        self.tray.borrow().visible.iter().map(|(_, rect)| *rect).collect()
    }
}

impl AffordanceFactory for FloatingButtonFactory {
    fn show(&mut self, at: Point) -> Box<dyn Affordance> {
        let bounds = Rect::new(at.x, at.y, self.width, self.height);
        let handle = {
            let mut tray = self.tray.borrow_mut();
            tray.next += 1;
            let handle = tray.next;
            tray.visible.push((handle, bounds));
            handle
        };
        tracing::debug!(label = %self.label, x = at.x, y = at.y, "showing button");
        Box::new(FloatingButton {
            handle,
            bounds,
            tray: Rc::clone(&self.tray),
        })
    }
}

/// Button shown by a `FloatingButtonFactory`
#[derive(Debug)]
pub struct FloatingButton {
    handle: u64,
    bounds: Rect,
    tray: Rc<RefCell<ButtonTray>>,
}

impl Affordance for FloatingButton {
    fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }

    fn dismiss(&mut self) {
        self.tray.borrow_mut().visible.retain(|(h, _)| *h != self.handle);
    }
}
