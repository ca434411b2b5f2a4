//! Accessibility self-check for the temple page.
//!
//! [`validate_temple_accessibility`] runs every pass against a read-only
//! [`PageInspector`] and folds the findings into a [`ComplianceReport`].
//! Passed and failed findings are scored; warnings are advisory.

pub mod checks;
pub mod dom;
pub mod report;

pub use dom::{CssRule, Document, Element, PageInspector, Rect, SnapshotError, StyleSheet};
pub use report::{ComplianceReport, Findings, Rating};

type Pass = fn(&dyn PageInspector, &mut Findings);

const PASSES: &[(&str, Pass)] = &[
    ("structure", checks::check_structure),
    ("keyboard", checks::check_keyboard),
    ("screen-reader", checks::check_screen_reader),
    ("contrast", checks::check_contrast),
    ("motion", checks::check_motion),
    ("mobile", checks::check_mobile),
    ("focus", checks::check_focus),
    ("aria", checks::check_aria),
];

pub fn validate_temple_accessibility(page: &dyn PageInspector) -> ComplianceReport {
    tracing::debug!(elements = page.elements().len(), "validating accessibility");
    let mut findings = Findings::new();
    for (name, pass) in PASSES {
        let before = findings.failed.len();
        pass(page, &mut findings);
        tracing::debug!(pass = *name, failed = findings.failed.len() - before, "pass complete");
    }
    ComplianceReport::from_findings(findings)
}
