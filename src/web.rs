//! Browser platform
//!
//! Installs the overlay rule as a `<style>` element and paints the active
//! highlights through the CSS Custom Highlight API (`CSS.highlights`).
//! Ranges are carried over to the page by their structural paths, so the
//! markup the highlighter was built from must mirror the live subtree under
//! the anchor. Selection and geometry stay in the in-memory platform.

use std::collections::HashMap;

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, Node};

use crate::config::HighlightStyle;
use crate::document::Document;
use crate::layout::{Layout, Rect};
use crate::path::Anchor;
use crate::platform::{HeadlessPlatform, Platform, PlatformError};
use crate::range::HighlightRange;
use crate::registry::RangeRegistry;
use crate::serialize::{self, HighlightDescriptor};

const OVERLAY_ATTRIBUTE: &str = "data-highlight-overlay";

#[derive(Debug, Default)]
pub struct StyleSheetPlatform {
    inner: HeadlessPlatform,
    /// `<style>` elements this platform installed, by overlay name
    styles: HashMap<String, Element>,
}

impl StyleSheetPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, range: HighlightRange) {
        self.inner.select(range);
    }

    fn page() -> Option<web_sys::Document> {
        web_sys::window()?.document()
    }

    fn style_host(page: &web_sys::Document) -> Result<Element, PlatformError> {
        if let Ok(Some(head)) = page.query_selector("head") {
            return Ok(head);
        }
        page.body()
            .map(Element::from)
            .ok_or_else(|| PlatformError::OverlayRegistration("no head or body".to_string()))
    }

    /// Whether some `<style>` in the page already claims `name`
    fn style_in_page(page: &web_sys::Document, name: &str) -> bool {
        page.query_selector(&format!("style[{}=\"{}\"]", OVERLAY_ATTRIBUTE, name))
            .ok()
            .flatten()
            .is_some()
    }

    fn install_style(name: &str, style: &HighlightStyle) -> Result<Element, PlatformError> {
        let page = Self::page()
            .ok_or_else(|| PlatformError::OverlayRegistration("no document".to_string()))?;
        if Self::style_in_page(&page, name) {
            return Err(PlatformError::AlreadyRegistered(name.to_string()));
        }

        let host = Self::style_host(&page)?;
        let failed = |e: JsValue| PlatformError::OverlayRegistration(format!("{:?}", e));
        let element = page.create_element("style").map_err(failed)?;
        element.set_attribute(OVERLAY_ATTRIBUTE, name).map_err(failed)?;
        element.set_text_content(Some(&style.to_css_rule(name)));
        host.append_child(&element).map_err(failed)?;
        Ok(element)
    }
}

/// `CSS.highlights`, when the browser has one
fn highlight_registry() -> Result<Option<JsValue>, JsValue> {
    let css = Reflect::get(&js_sys::global(), &JsValue::from_str("CSS"))?;
    if css.is_undefined() {
        return Ok(None);
    }
    let highlights = Reflect::get(&css, &JsValue::from_str("highlights"))?;
    Ok((!highlights.is_undefined()).then_some(highlights))
}

fn method(target: &JsValue, name: &str) -> Result<Function, JsValue> {
    Reflect::get(target, &JsValue::from_str(name))?.dyn_into::<Function>()
}

/// Character offset to the UTF-16 offset the DOM expects
fn dom_offset(node: &Node, offset: usize) -> u32 {
    let units = if node.node_type() == Node::TEXT_NODE {
        let text = node.node_value().unwrap_or_default();
        text.chars().take(offset).map(char::len_utf16).sum()
    } else {
        offset
    };
    u32::try_from(units).unwrap_or(u32::MAX)
}

fn resolve_live(page: &web_sys::Document, path: &str) -> Result<Option<Node>, JsValue> {
    page.evaluate(path, page)?.iterate_next()
}

fn live_range(
    page: &web_sys::Document,
    descriptor: &HighlightDescriptor,
) -> Result<Option<web_sys::Range>, JsValue> {
    let start = resolve_live(page, &descriptor.start_container)?;
    let end = resolve_live(page, &descriptor.end_container)?;
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(None);
    };

    let range = page.create_range()?;
    range.set_start(&start, dom_offset(&start, descriptor.start_offset))?;
    range.set_end(&end, dom_offset(&end, descriptor.end_offset))?;
    Ok(Some(range))
}

fn paint(
    name: &str,
    document: &Document,
    anchor: &Anchor,
    registry: &RangeRegistry,
) -> Result<usize, JsValue> {
    let Some(highlights) = highlight_registry()? else {
        web_sys::console::debug_1(&"[Highlighter] CSS.highlights is not available".into());
        return Ok(0);
    };
    let page = StyleSheetPlatform::page().ok_or_else(|| JsValue::from_str("no document"))?;

    let ranges = Array::new();
    for (id, range) in registry.iter() {
        let Ok(descriptor) = serialize::describe(range, document, anchor, false) else {
            continue;
        };
        match live_range(&page, &descriptor) {
            Ok(Some(live)) => {
                ranges.push(live.as_ref());
            }
            Ok(None) => {
                let message = format!("[Highlighter] Highlight {} is not in the page", id.value());
                web_sys::console::debug_1(&message.into());
            }
            Err(e) => {
                let message =
                    format!("[Highlighter] Highlight {} not painted: {:?}", id.value(), e);
                web_sys::console::warn_1(&message.into());
            }
        }
    }

    let constructor = method(&js_sys::global(), "Highlight")?;
    let highlight = Reflect::construct(&constructor, &ranges)?;
    method(&highlights, "set")?.call2(&highlights, &JsValue::from_str(name), &highlight)?;
    Ok(ranges.length() as usize)
}

fn clear_paint(name: &str) -> Result<(), JsValue> {
    if let Some(highlights) = highlight_registry()? {
        method(&highlights, "delete")?.call1(&highlights, &JsValue::from_str(name))?;
    }
    Ok(())
}

impl Layout for StyleSheetPlatform {
    fn bounding_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.inner.bounding_rect(document, range)
    }

    fn head_rect(&self, document: &Document, range: &HighlightRange) -> Option<Rect> {
        self.inner.head_rect(document, range)
    }
}

impl Platform for StyleSheetPlatform {
    fn current_selection(&self, document: &Document) -> Option<HighlightRange> {
        self.inner.current_selection(document)
    }

    fn clear_selection(&mut self) {
        self.inner.clear_selection();
    }

    fn register_overlay_style(
        &mut self,
        name: &str,
        style: &HighlightStyle,
    ) -> Result<(), PlatformError> {
        self.inner.register_overlay_style(name, style)?;

        match Self::install_style(name, style) {
            Ok(element) => {
                self.styles.insert(name.to_string(), element);
            }
            Err(e) => {
                self.inner.unregister_overlay_style(name);
                return Err(e);
            }
        }

        web_sys::console::debug_1(&format!("[Highlighter] Installed overlay '{}'", name).into());
        Ok(())
    }

    fn unregister_overlay_style(&mut self, name: &str) {
        self.inner.unregister_overlay_style(name);
        // only the element this platform installed; other owners keep theirs
        if let Some(element) = self.styles.remove(name) {
            element.remove();
            if let Err(e) = clear_paint(name) {
                let message = format!("[Highlighter] Could not clear overlay '{}': {:?}", name, e);
                web_sys::console::warn_1(&message.into());
            }
        }
    }

    fn refresh_overlay(
        &mut self,
        name: &str,
        document: &Document,
        anchor: &Anchor,
        registry: &RangeRegistry,
    ) {
        self.inner.refresh_overlay(name, document, anchor, registry);
        if !self.styles.contains_key(name) {
            return;
        }
        match paint(name, document, anchor, registry) {
            Ok(painted) => {
                let message = format!("[Highlighter] Painted {} range(s) in '{}'", painted, name);
                web_sys::console::debug_1(&message.into());
            }
            Err(e) => {
                let message = format!("[Highlighter] Could not paint overlay '{}': {:?}", name, e);
                web_sys::console::warn_1(&message.into());
            }
        }
    }
}
