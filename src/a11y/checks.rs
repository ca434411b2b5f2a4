//! The individual accessibility passes. Each inspects the page and appends
//! to a shared [`Findings`]; none depends on another's outcome.

use super::dom::{Element, PageInspector};
use super::report::Findings;

/// Minimum touch target edge in CSS pixels.
pub const MIN_TOUCH_TARGET: f64 = 44.0;

const FOCUSABLE_TAGS: &[&str] = &["button", "a", "input", "select", "textarea"];
const TOUCH_TAGS: &[&str] = &["button", "a", "input", "select"];
const LANDMARK_TAGS: &[&str] = &["main", "nav", "aside", "header", "footer"];
const LANDMARK_ROLES: &[&str] = &["main", "navigation", "banner", "contentinfo", "complementary"];
const KNOWN_ROLES: &[&str] = &[
    "button",
    "link",
    "main",
    "navigation",
    "banner",
    "contentinfo",
    "complementary",
    "list",
    "listitem",
    "img",
    "presentation",
];
const COLOR_WORDS: &[&str] = &["red", "green", "blue", "yellow", "color"];

pub fn is_focusable(e: &Element) -> bool {
    e.is_any(FOCUSABLE_TAGS) || e.get("tabindex").is_some_and(|t| t != "-1")
}

fn has_role(e: &Element, role: &str) -> bool {
    e.get("role") == Some(role)
}

fn focusable<'a>(page: &'a dyn PageInspector) -> impl Iterator<Item = &'a Element> + 'a {
    page.elements().iter().filter(|e| is_focusable(e))
}

fn headings_in_order(page: &dyn PageInspector) -> bool {
    let mut levels = page.elements().iter().filter_map(Element::heading_level);
    let Some(first) = levels.next() else {
        return false;
    };
    if first != 1 {
        return false;
    }
    let mut prev = first;
    for level in levels {
        if level > prev + 1 {
            return false;
        }
        prev = level;
    }
    true
}

pub fn check_structure(page: &dyn PageInspector, f: &mut Findings) {
    f.require(
        page.any(&|e| e.is("main")),
        "Main landmark present",
        "Missing main landmark",
    );
    f.require(
        headings_in_order(page),
        "Heading hierarchy correct",
        "Improper heading hierarchy",
    );
    f.suggest(
        page.any(&|e| has_role(e, "list")),
        "List structure implemented",
        "Consider list structure for gateway options",
    );
    f.suggest(
        page.any(&|e| {
            e.is_any(LANDMARK_TAGS) || e.get("role").is_some_and(|r| LANDMARK_ROLES.contains(&r))
        }),
        "Landmark regions present",
        "Consider landmark regions for page sections",
    );
}

pub fn check_keyboard(page: &dyn PageInspector, f: &mut Findings) {
    let count = focusable(page).count();
    if count > 0 {
        f.pass(format!("{count} focusable elements found"));
    }
    f.require(
        page.any(&|e| e.is("a") && e.get("href") == Some("#main-content")),
        "Skip link implemented",
        "Missing skip link",
    );
    f.require(
        page.any_rule(&|r| r.selector.as_deref().is_some_and(|s| s.contains(":focus"))),
        "Visible focus indicators present",
        "Missing visible focus indicators",
    );
}

pub fn check_screen_reader(page: &dyn PageInspector, f: &mut Findings) {
    let images_described = page
        .elements()
        .iter()
        .filter(|e| e.is("img"))
        .all(|img| img.has("alt") || img.has("aria-label") || has_role(img, "presentation"));
    f.require(
        images_described,
        "Images have text alternatives",
        "Images missing text alternatives",
    );
    f.suggest(
        page.any(&|e| e.has("aria-label") || e.has("aria-labelledby")),
        "ARIA labels implemented",
        "Consider adding more ARIA labels",
    );
    f.suggest(
        page.any(&|e| e.has("aria-live")),
        "Live regions for dynamic content",
        "Consider live regions for status updates",
    );
    f.suggest(
        page.any(&|e| e.has("aria-describedby")),
        "ARIA descriptions provided",
        "Consider adding ARIA descriptions",
    );
}

fn relies_on_color(e: &Element) -> bool {
    if !e.get("style").is_some_and(|s| s.contains("color")) {
        return false;
    }
    let text = e.text.to_lowercase();
    COLOR_WORDS.iter().any(|w| text.contains(w))
}

pub fn check_contrast(page: &dyn PageInspector, f: &mut Findings) {
    f.require(
        page.any_rule(&|r| r.media.as_deref().is_some_and(|m| m.contains("prefers-contrast"))),
        "High contrast mode support implemented",
        "Missing high contrast mode support",
    );
    f.require(
        !page.any(&relies_on_color),
        "Information not conveyed by color alone",
        "Some information relies only on color",
    );
}

pub fn check_motion(page: &dyn PageInspector, f: &mut Findings) {
    f.require(
        page.any_rule(&|r| {
            r.media
                .as_deref()
                .is_some_and(|m| m.contains("prefers-reduced-motion"))
        }),
        "Reduced motion preference support",
        "Missing reduced motion support",
    );
}

pub fn check_mobile(page: &dyn PageInspector, f: &mut Findings) {
    let targets_ok = page
        .elements()
        .iter()
        .filter(|e| e.is_any(TOUCH_TAGS))
        .all(|e| {
            let r = e.bounds();
            r.width >= MIN_TOUCH_TARGET && r.height >= MIN_TOUCH_TARGET
        });
    f.suggest(
        targets_ok,
        "Touch targets meet size requirements",
        "Some touch targets may be too small",
    );

    let is_viewport = |e: &Element| e.is("meta") && e.get("name") == Some("viewport");
    f.require(
        page.any(&is_viewport),
        "Viewport meta tag present",
        "Missing viewport meta tag",
    );
    f.require(
        !page.any(&|e| {
            is_viewport(e) && e.get("content").is_some_and(|c| c.contains("user-scalable=no"))
        }),
        "Zoom functionality preserved",
        "Zoom disabled - accessibility barrier",
    );
}

fn is_trap(e: &Element) -> bool {
    let positive = e
        .get("tabindex")
        .and_then(|t| t.trim().parse::<i32>().ok())
        .is_some_and(|t| t > 0);
    positive && !e.has("data-focus-trap")
}

pub fn check_focus(page: &dyn PageInspector, f: &mut Findings) {
    f.require(
        !focusable(page).any(is_trap),
        "No keyboard traps detected",
        "Keyboard trap detected",
    );

    let tops: Vec<f64> = focusable(page).map(|e| e.bounds().top).collect();
    f.suggest(
        tops.windows(2).all(|w| w[0] <= w[1]),
        "Logical tab order maintained",
        "Review tab order for optimal UX",
    );
}

fn valid_state(e: &Element) -> bool {
    let boolean = |name: &str| e.get(name).map_or(true, |v| v == "true" || v == "false");
    boolean("aria-expanded")
        && boolean("aria-selected")
        && boolean("aria-pressed")
        && e
            .get("aria-checked")
            .map_or(true, |v| matches!(v, "true" | "false" | "mixed"))
}

fn references_resolve(page: &dyn PageInspector, e: &Element) -> bool {
    ["aria-labelledby", "aria-describedby"].iter().all(|attr| {
        e.get(attr).map_or(true, |ids| {
            ids.split_whitespace()
                .all(|id| page.element_by_id(id).is_some())
        })
    })
}

pub fn check_aria(page: &dyn PageInspector, f: &mut Findings) {
    f.suggest(
        page.elements()
            .iter()
            .filter_map(|e| e.get("role"))
            .all(|r| KNOWN_ROLES.contains(&r)),
        "ARIA roles properly implemented",
        "Review ARIA role usage",
    );
    f.suggest(
        page.elements().iter().all(valid_state),
        "ARIA states valid",
        "Review ARIA state values",
    );
    f.suggest(
        page.elements().iter().all(|e| references_resolve(page, e)),
        "ARIA relationships resolve",
        "ARIA relationships reference missing elements",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a11y::dom::{CssRule, Document, Rect, StyleSheet};

    fn run(check: fn(&dyn PageInspector, &mut Findings), doc: &Document) -> Findings {
        let mut f = Findings::new();
        check(doc, &mut f);
        f
    }

    #[test]
    fn focusable_elements() {
        assert!(is_focusable(&Element::new("button")));
        assert!(is_focusable(&Element::new("div").attr("tabindex", "0")));
        assert!(!is_focusable(&Element::new("div").attr("tabindex", "-1")));
        assert!(!is_focusable(&Element::new("div")));
    }

    #[test]
    fn heading_skip_fails() {
        let doc = Document::new().with(Element::new("h1")).with(Element::new("h3"));
        let f = run(check_structure, &doc);
        assert!(f.failed.contains(&"Improper heading hierarchy".to_string()));

        let doc = Document::new()
            .with(Element::new("h1"))
            .with(Element::new("h2"))
            .with(Element::new("h3"))
            .with(Element::new("h2"));
        let f = run(check_structure, &doc);
        assert!(f.passed.contains(&"Heading hierarchy correct".to_string()));
    }

    #[test]
    fn no_headings_or_h2_first_fails() {
        assert!(!headings_in_order(&Document::new()));
        assert!(!headings_in_order(&Document::new().with(Element::new("h2"))));
    }

    #[test]
    fn structure_warnings_do_not_fail() {
        let doc = Document::new().with(Element::new("main")).with(Element::new("h1"));
        let f = run(check_structure, &doc);
        assert_eq!(
            f.passed,
            vec!["Main landmark present", "Heading hierarchy correct", "Landmark regions present"]
        );
        assert_eq!(f.warnings, vec!["Consider list structure for gateway options"]);
        assert!(f.failed.is_empty());
    }

    #[test]
    fn only_page_level_roles_count_as_landmarks() {
        let landmarks = "Consider landmark regions for page sections".to_string();
        for role in ["region", "search", "form"] {
            let doc = Document::new().with(Element::new("section").attr("role", role));
            let f = run(check_structure, &doc);
            assert!(f.warnings.contains(&landmarks), "role {role}");
        }
        let doc = Document::new().with(Element::new("div").attr("role", "contentinfo"));
        let f = run(check_structure, &doc);
        assert!(f.passed.contains(&"Landmark regions present".to_string()));
    }

    #[test]
    fn keyboard_counts_focusables_and_reads_focus_rules() {
        let doc = Document::new()
            .with(Element::new("a").attr("href", "#main-content"))
            .with(Element::new("button"))
            .with(Element::new("div").attr("tabindex", "-1"))
            .with_sheet(StyleSheet::new(vec![CssRule::style(".gate:focus-visible")]));
        let f = run(check_keyboard, &doc);
        assert_eq!(
            f.passed,
            vec![
                "2 focusable elements found",
                "Skip link implemented",
                "Visible focus indicators present"
            ]
        );

        let f = run(check_keyboard, &Document::new());
        assert!(f.passed.is_empty());
        assert_eq!(f.failed, vec!["Missing skip link", "Missing visible focus indicators"]);
    }

    #[test]
    fn images_need_alternatives() {
        let good = Document::new()
            .with(Element::new("img").attr("alt", "Oracle sigil"))
            .with(Element::new("img").attr("role", "presentation"))
            .with(Element::new("img").attr("aria-label", "Flame"));
        let f = run(check_screen_reader, &good);
        assert!(f.passed.contains(&"Images have text alternatives".to_string()));

        let bad = good.with(Element::new("img"));
        let f = run(check_screen_reader, &bad);
        assert!(f.failed.contains(&"Images missing text alternatives".to_string()));
    }

    #[test]
    fn color_only_heuristic() {
        let doc = Document::new().with(
            Element::new("span")
                .attr("style", "color: #f00")
                .text("Fields in RED are required"),
        );
        let f = run(check_contrast, &doc);
        assert!(f.failed.contains(&"Some information relies only on color".to_string()));

        let doc = Document::new()
            .with(Element::new("span").attr("style", "color: #f00").text("Mandatory"))
            .with_sheet(StyleSheet::new(vec![CssRule::media("(prefers-contrast: more)")]));
        let f = run(check_contrast, &doc);
        assert!(f.failed.is_empty());
    }

    #[test]
    fn color_words_match_as_substrings() {
        // "requiRED" contains a colour word; the heuristic does not tokenize.
        let doc = Document::new().with(Element::new("span").attr("style", "color: #f00").text("Required"));
        let f = run(check_contrast, &doc);
        assert!(f.failed.contains(&"Some information relies only on color".to_string()));

        // Text alone is not enough without an inline colour style.
        let doc = Document::new().with(Element::new("span").text("Required"));
        let f = run(check_contrast, &doc);
        assert!(f.passed.contains(&"Information not conveyed by color alone".to_string()));
    }

    #[test]
    fn motion_needs_reduced_motion_query() {
        let doc = Document::new()
            .with_sheet(StyleSheet::cross_origin())
            .with_sheet(StyleSheet::new(vec![CssRule::media("(prefers-reduced-motion: reduce)")]));
        assert_eq!(run(check_motion, &doc).passed, vec!["Reduced motion preference support"]);
        assert_eq!(run(check_motion, &Document::new()).failed, vec!["Missing reduced motion support"]);
    }

    #[test]
    fn mobile_targets_viewport_and_zoom() {
        let doc = Document::new()
            .with(Element::new("button").rect(Rect::new(0.0, 0.0, 44.0, 44.0)))
            .with(
                Element::new("meta")
                    .attr("name", "viewport")
                    .attr("content", "width=device-width, user-scalable=no"),
            );
        let f = run(check_mobile, &doc);
        assert_eq!(
            f.passed,
            vec!["Touch targets meet size requirements", "Viewport meta tag present"]
        );
        assert_eq!(f.failed, vec!["Zoom disabled - accessibility barrier"]);

        // Unrendered links measure zero.
        let doc = Document::new().with(Element::new("a"));
        let f = run(check_mobile, &doc);
        assert_eq!(f.warnings, vec!["Some touch targets may be too small"]);
        assert_eq!(f.failed, vec!["Missing viewport meta tag"]);
        assert!(f.passed.contains(&"Zoom functionality preserved".to_string()));
    }

    #[test]
    fn positive_tabindex_is_a_trap_unless_marked() {
        let doc = Document::new().with(Element::new("div").attr("tabindex", "3"));
        assert_eq!(run(check_focus, &doc).failed, vec!["Keyboard trap detected"]);

        let doc = Document::new().with(
            Element::new("div")
                .attr("tabindex", "3")
                .attr("data-focus-trap", ""),
        );
        assert!(run(check_focus, &doc).failed.is_empty());
    }

    #[test]
    fn tab_order_follows_layout() {
        let doc = Document::new()
            .with(Element::new("button").rect(Rect::new(100.0, 0.0, 50.0, 50.0)))
            .with(Element::new("button").rect(Rect::new(20.0, 0.0, 50.0, 50.0)));
        assert_eq!(run(check_focus, &doc).warnings, vec!["Review tab order for optimal UX"]);
    }

    #[test]
    fn aria_roles_states_and_relationships() {
        let doc = Document::new()
            .with(Element::new("p").attr("id", "hint"))
            .with(Element::new("h2").attr("id", "title"))
            .with(
                Element::new("div")
                    .attr("role", "button")
                    .attr("aria-pressed", "false")
                    .attr("aria-labelledby", "title  hint")
                    .attr("aria-describedby", "hint"),
            )
            .with(Element::new("input").attr("aria-checked", "mixed"));
        let f = run(check_aria, &doc);
        assert_eq!(f.passed.len(), 3);
        assert!(f.warnings.is_empty());

        let doc = Document::new()
            .with(Element::new("div").attr("role", "slider"))
            .with(Element::new("div").attr("aria-expanded", "yes"))
            .with(Element::new("div").attr("aria-describedby", "gone"));
        let f = run(check_aria, &doc);
        assert_eq!(
            f.warnings,
            vec![
                "Review ARIA role usage",
                "Review ARIA state values",
                "ARIA relationships reference missing elements"
            ]
        );
    }
}
