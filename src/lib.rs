//! Text Highlighter
//!
//! Lets a reader mark spans of a document and keeps those marks portable:
//! - highlight creation and removal driven by pointer input
//! - structural-path encoding of range endpoints
//! - best-effort restore of saved highlights into a reloaded document
//!
//! The core runs natively against an in-memory document; the
//! `TextHighlighter` type is the JavaScript-facing wrapper.

use wasm_bindgen::prelude::*;

pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod layout;
pub mod path;
pub mod platform;
pub mod range;
pub mod registry;
pub mod serialize;
#[cfg(target_arch = "wasm32")]
pub mod web;

// Re-export common types
pub use config::{HighlightStyle, HighlighterOptions};
pub use controller::{Confirmation, HighlightController, InteractionState};
pub use document::{Document, NodeId};
pub use error::HighlightError;
pub use layout::{FlowLayout, Layout, Point, Rect};
pub use path::{Anchor, StructuralPath};
pub use platform::{Affordance, AffordanceFactory, Affordances, HeadlessPlatform, Platform};
pub use range::{Boundary, HighlightRange};
pub use registry::{HighlightId, RangeRegistry};
pub use serialize::{HighlightDescriptor, RestoreReport, SkipReason};

/// Platform backing `TextHighlighter`
#[cfg(target_arch = "wasm32")]
pub type BrowserPlatform = web::StyleSheetPlatform;
#[cfg(not(target_arch = "wasm32"))]
pub type BrowserPlatform = platform::HeadlessPlatform;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(e: HighlightError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Highlighter over one XHTML document
#[wasm_bindgen]
pub struct TextHighlighter {
    controller: HighlightController<BrowserPlatform>,
}

impl TextHighlighter {
    /// Build from markup and JSON options
    pub fn from_json(markup: &str, options: &str) -> error::Result<Self> {
        let options = if options.trim().is_empty() {
            HighlighterOptions::default()
        } else {
            HighlighterOptions::from_json(options)?
        };
        Self::with_options(markup, options)
    }

    pub fn with_options(markup: &str, options: HighlighterOptions) -> error::Result<Self> {
        let document = Document::parse(markup)?;
        let controller = HighlightController::new(
            document,
            options,
            BrowserPlatform::new(),
            Affordances::floating_buttons(),
        )?;
        Ok(Self { controller })
    }

    pub fn controller(&self) -> &HighlightController<BrowserPlatform> {
        &self.controller
    }

    /// Select `startOffset..endOffset` between two structural paths
    pub fn select_paths(
        &mut self,
        start_path: &str,
        start_offset: usize,
        end_path: &str,
        end_offset: usize,
    ) -> error::Result<()> {
        let document = self.controller.document();
        let start = path::parse(start_path)?
            .resolve(document)
            .ok_or_else(|| HighlightError::UnresolvedPath(start_path.to_string()))?;
        let end = path::parse(end_path)?
            .resolve(document)
            .ok_or_else(|| HighlightError::UnresolvedPath(end_path.to_string()))?;
        let range = HighlightRange::new(
            document,
            Boundary::new(start, start_offset),
            Boundary::new(end, end_offset),
        )?;
        self.controller.platform_mut().select(range);
        Ok(())
    }
}

#[wasm_bindgen]
impl TextHighlighter {
    /// Create a highlighter; `options` is a plain object or undefined
    #[wasm_bindgen(constructor)]
    pub fn new(markup: &str, options: JsValue) -> Result<TextHighlighter, JsValue> {
        let options: HighlighterOptions = if options.is_undefined() || options.is_null() {
            HighlighterOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        Self::with_options(markup, options).map_err(to_js)
    }

    #[wasm_bindgen(js_name = "setSelection")]
    pub fn set_selection(
        &mut self,
        start_path: &str,
        start_offset: usize,
        end_path: &str,
        end_offset: usize,
    ) -> Result<(), JsValue> {
        self.select_paths(start_path, start_offset, end_path, end_offset)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = "pointerDown")]
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.controller.pointer_down(Point::new(x, y));
    }

    /// Returns whether the highlight button is shown
    #[wasm_bindgen(js_name = "pointerUp")]
    pub fn pointer_up(&mut self, x: f32, y: f32) -> bool {
        self.controller.pointer_up(Point::new(x, y))
    }

    /// Returns the id of the highlight offered for removal
    pub fn click(&mut self, x: f32, y: f32) -> Option<u64> {
        self.controller.click(Point::new(x, y)).map(|id| id.value())
    }

    /// Returns `{ "highlighted": id }`, `{ "removed": id }` or `"nothing"`
    pub fn confirm(&mut self) -> Result<JsValue, JsValue> {
        let confirmation = self.controller.confirm().map_err(to_js)?;
        serde_wasm_bindgen::to_value(&confirmation).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn serialize(&self, capture_text: bool) -> Result<String, JsValue> {
        self.controller.serialize(capture_text).map_err(to_js)
    }

    /// Restore saved highlights and return the `RestoreReport`
    pub fn deserialize(&mut self, text: &str, replace_existing: bool) -> Result<JsValue, JsValue> {
        let report = self.controller.deserialize(text, replace_existing).map_err(to_js)?;
        serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn count(&self) -> usize {
        self.controller.highlights().len()
    }

    pub fn destroy(&mut self) {
        self.controller.destroy();
    }
}
