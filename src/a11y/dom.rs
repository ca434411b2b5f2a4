//! Read-only page model for the accessibility passes.
//!
//! A page is a flat list of elements in document order plus its
//! stylesheets. An element carries its full text content and, when the page
//! was laid out, its bounding rect in CSS pixels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bounding client rect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rect: Option<Rect>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn is_any(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.is(t))
    }

    /// Heading level for h1..h6.
    pub fn heading_level(&self) -> Option<u8> {
        let rest = self.tag.strip_prefix('h')?;
        match rest.parse::<u8>() {
            Ok(n @ 1..=6) => Some(n),
            _ => None,
        }
    }

    /// Layout box; unrendered elements measure 0×0 at the origin.
    pub fn bounds(&self) -> Rect {
        self.rect.unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CssRule {
    #[serde(default)]
    pub selector: Option<String>,
    /// Condition text of an enclosing `@media` rule.
    #[serde(default)]
    pub media: Option<String>,
}

impl CssRule {
    pub fn style(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            media: None,
        }
    }

    pub fn media(condition: &str) -> Self {
        Self {
            selector: None,
            media: Some(condition.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    /// Cross-origin sheets cannot be read; their rules are never inspected.
    #[serde(default = "readable")]
    pub accessible: bool,
    #[serde(default)]
    pub rules: Vec<CssRule>,
}

fn readable() -> bool {
    true
}

impl StyleSheet {
    pub fn new(rules: Vec<CssRule>) -> Self {
        Self {
            accessible: true,
            rules,
        }
    }

    pub fn cross_origin() -> Self {
        Self {
            accessible: false,
            rules: Vec::new(),
        }
    }

    /// Rules visible to inspection.
    pub fn readable_rules(&self) -> &[CssRule] {
        if self.accessible {
            &self.rules
        } else {
            &[]
        }
    }
}

/// Read-only view of a rendered page.
pub trait PageInspector {
    /// Elements in document order.
    fn elements(&self) -> &[Element];

    fn stylesheets(&self) -> &[StyleSheet];

    fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.elements().iter().find(|e| e.get("id") == Some(id))
    }

    fn any(&self, pred: &dyn Fn(&Element) -> bool) -> bool {
        self.elements().iter().any(|e| pred(e))
    }

    /// True if any readable rule satisfies `pred`.
    fn any_rule(&self, pred: &dyn Fn(&CssRule) -> bool) -> bool {
        self.stylesheets()
            .iter()
            .flat_map(|s| s.readable_rules())
            .any(|r| pred(r))
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read page snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed page snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory page, built directly or loaded from a JSON snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub stylesheets: Vec<StyleSheet>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_sheet(mut self, sheet: StyleSheet) -> Self {
        self.stylesheets.push(sheet);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        let mut doc: Document = serde_json::from_str(json)?;
        for e in &mut doc.elements {
            e.tag.make_ascii_lowercase();
            e.attrs = std::mem::take(&mut e.attrs)
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect();
        }
        Ok(doc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

impl PageInspector for Document {
    fn elements(&self) -> &[Element] {
        &self.elements
    }

    fn stylesheets(&self) -> &[StyleSheet] {
        &self.stylesheets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_levels() {
        assert_eq!(Element::new("H2").heading_level(), Some(2));
        assert_eq!(Element::new("h6").heading_level(), Some(6));
        assert_eq!(Element::new("h7").heading_level(), None);
        assert_eq!(Element::new("header").heading_level(), None);
        assert_eq!(Element::new("h").heading_level(), None);
    }

    #[test]
    fn cross_origin_rules_are_hidden() {
        let doc = Document::new()
            .with_sheet(StyleSheet {
                accessible: false,
                rules: vec![CssRule::style("a:focus")],
            })
            .with_sheet(StyleSheet::new(vec![CssRule::media("(prefers-contrast: more)")]));

        assert!(!doc.any_rule(&|r| r.selector.as_deref().is_some_and(|s| s.contains(":focus"))));
        assert!(doc.any_rule(&|r| r.media.as_deref().is_some_and(|m| m.contains("prefers-contrast"))));
    }

    #[test]
    fn snapshot_json_round_trips_into_inspector() {
        let json = r#"{
            "elements": [
                {"tag": "MAIN", "attrs": {"id": "main-content"}},
                {"tag": "button", "text": "Consult", "rect": {"top": 10, "left": 0, "width": 48, "height": 48}}
            ],
            "stylesheets": [{"rules": [{"selector": "button:focus"}]}, {"accessible": false}]
        }"#;
        let doc = Document::from_json_str(json).unwrap();
        assert!(doc.elements()[0].is("main"));
        assert_eq!(doc.element_by_id("main-content").map(|e| e.tag.as_str()), Some("main"));
        assert_eq!(doc.elements()[1].bounds().width, 48.0);
        assert!(doc.stylesheets()[0].accessible);
        assert!(!doc.stylesheets()[1].accessible);
    }

    #[test]
    fn snapshot_attribute_names_are_case_insensitive() {
        let json = r#"{"elements": [
            {"tag": "IMG", "attrs": {"ALT": "Temple flame"}},
            {"tag": "button", "attrs": {"Aria-Label": "Consult", "TabIndex": "0"}}
        ]}"#;
        let doc = Document::from_json_str(json).unwrap();
        assert_eq!(doc.elements()[0].get("alt"), Some("Temple flame"));
        assert_eq!(doc.elements()[1].get("aria-label"), Some("Consult"));
        assert!(doc.elements()[1].has("tabindex"));
        assert!(!doc.elements()[1].has("TabIndex"));
    }

    #[test]
    fn unrendered_element_measures_zero() {
        assert_eq!(Element::new("a").bounds(), Rect::default());
    }
}
