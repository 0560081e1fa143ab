//! Browser tests for the JavaScript-facing wrapper
//!
//! Run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

use text_highlighter::platform::PlatformError;
use text_highlighter::{HighlightError, TextHighlighter};

wasm_bindgen_test_configure!(run_in_browser);

const CHAPTER: &str = r#"<html><body><div id="app"><p>Hello <b>world</b></p></div></body></html>"#;

fn page() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

fn overlay_style(name: &str) -> Option<web_sys::Element> {
    page()
        .query_selector(&format!("style[data-highlight-overlay=\"{}\"]", name))
        .unwrap()
}

fn overlay_installed(name: &str) -> bool {
    overlay_style(name).is_some()
}

/// Mount `markup` in the page body
fn mount(markup: &str) -> web_sys::Element {
    let host = page().create_element("div").unwrap();
    host.set_inner_html(markup);
    page().body().unwrap().append_child(&host).unwrap();
    host
}

fn call(target: &JsValue, name: &str, args: &[&JsValue]) -> JsValue {
    let function: Function = Reflect::get(target, &JsValue::from_str(name))
        .unwrap()
        .dyn_into()
        .unwrap();
    match args {
        [] => function.call0(target),
        [a] => function.call1(target, a),
        _ => unreachable!(),
    }
    .unwrap()
}

fn highlights_supported() -> bool {
    let css = Reflect::get(&js_sys::global(), &JsValue::from_str("CSS")).unwrap();
    !css.is_undefined()
        && !Reflect::get(&css, &JsValue::from_str("highlights"))
            .unwrap()
            .is_undefined()
}

/// The highlight painted under `name`
fn painted_highlight(name: &str) -> Option<JsValue> {
    if !highlights_supported() {
        return None;
    }
    let css = Reflect::get(&js_sys::global(), &JsValue::from_str("CSS")).unwrap();
    let registry = Reflect::get(&css, &JsValue::from_str("highlights")).unwrap();
    let highlight = call(&registry, "get", &[&JsValue::from_str(name)]);
    (!highlight.is_undefined()).then_some(highlight)
}

#[wasm_bindgen_test]
fn installs_and_removes_overlay_rule() {
    let mut highlighter = TextHighlighter::new(CHAPTER, JsValue::UNDEFINED).unwrap();
    assert!(overlay_installed("TextHighlighter-default"));

    highlighter.destroy();
    assert!(!overlay_installed("TextHighlighter-default"));
    highlighter.destroy();
}

#[wasm_bindgen_test]
fn highlight_and_restore() {
    let mut highlighter =
        TextHighlighter::from_json(CHAPTER, r#"{"overlayName": "marks"}"#).unwrap();
    let path = "/html[1]/body[1]/div[1]/p[1]/b[1]/text()[1]";
    highlighter.select_paths(path, 0, path, 5).unwrap();
    assert!(highlighter.pointer_up(0.0, 0.0));
    let confirmation = highlighter.confirm().unwrap();
    let id = js_sys::Reflect::get(&confirmation, &JsValue::from_str("highlighted")).unwrap();
    assert!(id.as_f64().is_some());
    assert_eq!(highlighter.count(), 1);

    let saved = highlighter.serialize(true).unwrap();
    assert!(saved.contains("\"text\":\"world\""));
    highlighter.destroy();

    let mut restored = TextHighlighter::from_json(CHAPTER, r#"{"overlayName": "marks"}"#).unwrap();
    restored.deserialize(&saved, true).unwrap();
    assert_eq!(restored.count(), 1);
}

#[wasm_bindgen_test]
fn reports_errors_as_strings() {
    let result = TextHighlighter::from_json(CHAPTER, r#"{"anchorElementId": "missing"}"#);
    assert!(result.is_err());

    let mut highlighter = TextHighlighter::new(CHAPTER, JsValue::NULL).unwrap();
    let error = highlighter.deserialize("not json", false).unwrap_err();
    assert!(error.as_string().unwrap().contains("Malformed"));
}

#[wasm_bindgen_test]
fn refuses_overlay_name_already_in_page() {
    let mut first = TextHighlighter::from_json(CHAPTER, r#"{"overlayName": "shared"}"#).unwrap();
    let second = TextHighlighter::from_json(CHAPTER, r#"{"overlayName": "shared"}"#);
    assert!(matches!(
        second,
        Err(HighlightError::Platform(PlatformError::AlreadyRegistered(name))) if name == "shared"
    ));
    assert!(overlay_installed("shared"));

    first.destroy();
    assert!(!overlay_installed("shared"));
}

#[wasm_bindgen_test]
fn destroy_leaves_foreign_style_alone() {
    let mut highlighter =
        TextHighlighter::from_json(CHAPTER, r#"{"overlayName": "contested"}"#).unwrap();
    // another party claims the same name after registration
    let foreign = mount(r#"<style data-highlight-overlay="contested" data-owner="other"></style>"#);
    let ours = overlay_style("contested").unwrap();
    assert_eq!(ours.get_attribute("data-owner"), None);

    highlighter.destroy();
    let remaining = overlay_style("contested").unwrap();
    assert_eq!(remaining.get_attribute("data-owner").as_deref(), Some("other"));
    foreign.remove();
}

#[wasm_bindgen_test]
fn paints_highlights_into_the_page() {
    let live = r#"<div id="live"><p>Hello <b>w😀rld</b></p></div>"#;
    let host = mount(live);
    let markup = format!("<html><body>{}</body></html>", live);
    let options = r#"{"anchorElementId": "live", "overlayName": "live-marks"}"#;
    let mut highlighter = TextHighlighter::from_json(&markup, options).unwrap();

    let path = r#"//*[@id="live"]/p[1]/b[1]/text()[1]"#;
    highlighter.select_paths(path, 1, path, 5).unwrap();
    assert!(highlighter.pointer_up(0.0, 0.0));
    highlighter.confirm().unwrap();

    // browsers without the highlight registry only get the style rule
    if highlights_supported() {
        let highlight = painted_highlight("live-marks").unwrap();
        let size = Reflect::get(&highlight, &JsValue::from_str("size")).unwrap();
        assert_eq!(size.as_f64(), Some(1.0));

        let values = call(&highlight, "values", &[]);
        let first = Reflect::get(&call(&values, "next", &[]), &JsValue::from_str("value")).unwrap();
        let text = call(&first, "toString", &[]).as_string().unwrap();
        assert_eq!(text, "😀rld");
    }

    highlighter.destroy();
    assert!(painted_highlight("live-marks").is_none());
    host.remove();
}
