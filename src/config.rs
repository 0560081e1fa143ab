//! Highlighter options
//!
//! Options deserialize from camelCase JSON (or a JS object on the WASM side)
//! and fall back to defaults field by field.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, Result};

pub const DEFAULT_OVERLAY_NAME: &str = "TextHighlighter-default";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#f06";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlighterOptions {
    /// Element bounding every structural path; the whole document when unset
    pub anchor_element_id: Option<String>,
    /// Name the overlay style rule is registered under
    pub overlay_name: String,
    pub highlight_style: HighlightStyle,
}

/// Visual style applied to every active highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlightStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_shadow: Option<String>,
}

impl Default for HighlighterOptions {
    fn default() -> Self {
        Self {
            anchor_element_id: None,
            overlay_name: DEFAULT_OVERLAY_NAME.to_string(),
            highlight_style: HighlightStyle::default(),
        }
    }
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: None,
            background_color: Some(DEFAULT_BACKGROUND_COLOR.to_string()),
            text_decoration: None,
            text_shadow: None,
        }
    }
}

fn style_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[#(),./%\w\s+-]+$").expect("valid style value pattern"))
}

fn overlay_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][\w-]*$").expect("valid overlay name pattern"))
}

impl HighlighterOptions {
    /// Load options from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HighlightError::InvalidOptions(e.to_string()))
    }

    pub fn with_anchor(mut self, id: &str) -> Self {
        self.anchor_element_id = Some(id.to_string());
        self
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.highlight_style = style;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.anchor_element_id {
            if id.is_empty() || id.contains('"') {
                return Err(HighlightError::InvalidOptions(format!(
                    "anchor element id {:?} cannot be addressed",
                    id
                )));
            }
        }
        if !overlay_name_pattern().is_match(&self.overlay_name) {
            return Err(HighlightError::InvalidOptions(format!(
                "overlay name {:?} is not a CSS identifier",
                self.overlay_name
            )));
        }
        self.highlight_style.validate()
    }
}

impl HighlightStyle {
    fn declarations(&self) -> Vec<(&'static str, &str)> {
        [
            ("color", &self.color),
            ("background-color", &self.background_color),
            ("text-decoration", &self.text_decoration),
            ("text-shadow", &self.text_shadow),
        ]
        .into_iter()
        .filter_map(|(property, value)| value.as_deref().map(|v| (property, v)))
        .collect()
    }

    /// Reject values that could escape the generated rule
    pub fn validate(&self) -> Result<()> {
        for (property, value) in self.declarations() {
            if !style_value_pattern().is_match(value) {
                return Err(HighlightError::InvalidStyle {
                    property,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Render the `::highlight(name)` rule
    pub fn to_css_rule(&self, name: &str) -> String {
        let body: String = self
            .declarations()
            .into_iter()
            .map(|(property, value)| format!("  {}: {};\n", property, value.trim()))
            .collect();
        format!("::highlight({}) {{\n{}}}", name, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = HighlighterOptions::default();
        assert_eq!(options.anchor_element_id, None);
        assert_eq!(options.overlay_name, "TextHighlighter-default");
        assert_eq!(options.highlight_style.background_color.as_deref(), Some("#f06"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let options = HighlighterOptions::from_json(
            r#"{"anchorElementId": "app", "highlightStyle": {"color": "white"}}"#,
        )
        .unwrap();
        assert_eq!(options.anchor_element_id.as_deref(), Some("app"));
        assert_eq!(options.overlay_name, DEFAULT_OVERLAY_NAME);
        assert_eq!(options.highlight_style.color.as_deref(), Some("white"));
        // missing fields fall back to the default style
        assert_eq!(options.highlight_style.background_color.as_deref(), Some("#f06"));
    }

    #[test]
    fn test_from_json_invalid() {
        let result = HighlighterOptions::from_json("{\"anchorElementId\": 3}");
        assert!(matches!(result, Err(HighlightError::InvalidOptions(_))));
    }

    #[test]
    fn test_css_rule() {
        let style = HighlightStyle {
            color: Some("white".to_string()),
            text_shadow: Some("1px 1px 2px rgba(0, 0, 0, 0.5)".to_string()),
            ..HighlightStyle::default()
        };
        assert!(style.validate().is_ok());
        assert_eq!(
            style.to_css_rule("marks"),
            concat!(
                "::highlight(marks) {\n",
                "  color: white;\n",
                "  background-color: #f06;\n",
                "  text-shadow: 1px 1px 2px rgba(0, 0, 0, 0.5);\n",
                "}"
            )
        );
    }

    #[test]
    fn test_rejects_rule_injection() {
        let style = HighlightStyle {
            background_color: Some("red; } body { display: none".to_string()),
            ..HighlightStyle::default()
        };
        match style.validate() {
            Err(HighlightError::InvalidStyle { property, .. }) => {
                assert_eq!(property, "background-color")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_anchor_and_overlay_name() {
        let options = HighlighterOptions::default().with_anchor("");
        assert!(matches!(options.validate(), Err(HighlightError::InvalidOptions(_))));

        let options = HighlighterOptions {
            overlay_name: "1bad name".to_string(),
            ..HighlighterOptions::default()
        };
        assert!(matches!(options.validate(), Err(HighlightError::InvalidOptions(_))));
    }
}
