//! Findings and the compliance report built from them.

use serde::Serialize;
use std::fmt;

/// Outcome lists collected by the passes, in the order they ran.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Findings {
    pub passed: Vec<String>,
    pub warnings: Vec<String>,
    pub failed: Vec<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&mut self, msg: impl Into<String>) {
        self.passed.push(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn fail(&mut self, msg: impl Into<String>) {
        self.failed.push(msg.into());
    }

    /// Record `pass` when `ok`, otherwise `fail`.
    pub fn require(&mut self, ok: bool, pass: &str, fail: &str) {
        if ok {
            self.pass(pass)
        } else {
            self.fail(fail)
        }
    }

    /// Record `pass` when `ok`, otherwise `warn`.
    pub fn suggest(&mut self, ok: bool, pass: &str, warn: &str) {
        if ok {
            self.pass(pass)
        } else {
            self.warn(warn)
        }
    }

    /// Share of scored findings that passed, rounded to a whole percent.
    /// Warnings are not scored.
    pub fn percentage(&self) -> u32 {
        let total = self.passed.len() + self.failed.len();
        if total == 0 {
            return 0;
        }
        (self.passed.len() as f64 / total as f64 * 100.0).round() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Rating {
    Critical,
    NeedsWork,
    Good,
    Excellent,
}

impl Rating {
    pub fn from_percentage(pct: u32) -> Self {
        match pct {
            95.. => Rating::Excellent,
            80..=94 => Rating::Good,
            60..=79 => Rating::NeedsWork,
            _ => Rating::Critical,
        }
    }

    pub fn verdict(self) -> &'static str {
        match self {
            Rating::Excellent => "EXCELLENT - WCAG 2.1 AA compliant",
            Rating::Good => "GOOD - minor improvements needed",
            Rating::NeedsWork => "NEEDS WORK - address failed checks for WCAG compliance",
            Rating::Critical => "CRITICAL - significant accessibility barriers",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::NeedsWork => "Needs work",
            Rating::Critical => "Critical",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub findings: Findings,
    pub percentage: u32,
    pub rating: Rating,
}

impl ComplianceReport {
    pub fn from_findings(findings: Findings) -> Self {
        let percentage = findings.percentage();
        Self {
            findings,
            percentage,
            rating: Rating::from_percentage(percentage),
        }
    }

    pub fn passed(&self) -> &[String] {
        &self.findings.passed
    }

    pub fn warnings(&self) -> &[String] {
        &self.findings.warnings
    }

    pub fn failed(&self) -> &[String] {
        &self.findings.failed
    }

    /// Emit the summary at info, each warning and failure at warn.
    pub fn log(&self) {
        tracing::info!(
            passed = self.findings.passed.len(),
            warnings = self.findings.warnings.len(),
            failed = self.findings.failed.len(),
            percentage = self.percentage,
            rating = %self.rating,
            "accessibility report"
        );
        for w in &self.findings.warnings {
            tracing::warn!(finding = %w, "accessibility warning");
        }
        for f in &self.findings.failed {
            tracing::warn!(finding = %f, "accessibility failure");
        }
    }
}

impl fmt::Display for ComplianceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accessibility compliance report")?;
        writeln!(f, "===============================")?;

        writeln!(f, "\nPassed ({}):", self.findings.passed.len())?;
        for p in &self.findings.passed {
            writeln!(f, "  [pass] {p}")?;
        }
        if !self.findings.warnings.is_empty() {
            writeln!(f, "\nWarnings ({}):", self.findings.warnings.len())?;
            for w in &self.findings.warnings {
                writeln!(f, "  [warn] {w}")?;
            }
        }
        if !self.findings.failed.is_empty() {
            writeln!(f, "\nFailed ({}):", self.findings.failed.len())?;
            for x in &self.findings.failed {
                writeln!(f, "  [fail] {x}")?;
            }
        }

        writeln!(f, "\nCompliance: {}%", self.percentage)?;
        write!(f, "Rating: {}", self.rating.verdict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(passed: usize, failed: usize, warnings: usize) -> Findings {
        let mut f = Findings::new();
        (0..passed).for_each(|i| f.pass(format!("p{i}")));
        (0..failed).for_each(|i| f.fail(format!("f{i}")));
        (0..warnings).for_each(|i| f.warn(format!("w{i}")));
        f
    }

    #[test]
    fn percentage_ignores_warnings() {
        assert_eq!(findings(3, 1, 10).percentage(), 75);
        assert_eq!(findings(2, 1, 0).percentage(), 67);
        assert_eq!(findings(0, 0, 4).percentage(), 0);
        assert_eq!(findings(5, 0, 0).percentage(), 100);
    }

    #[test]
    fn rating_tiers() {
        assert_eq!(Rating::from_percentage(100), Rating::Excellent);
        assert_eq!(Rating::from_percentage(95), Rating::Excellent);
        assert_eq!(Rating::from_percentage(94), Rating::Good);
        assert_eq!(Rating::from_percentage(80), Rating::Good);
        assert_eq!(Rating::from_percentage(79), Rating::NeedsWork);
        assert_eq!(Rating::from_percentage(60), Rating::NeedsWork);
        assert_eq!(Rating::from_percentage(59), Rating::Critical);
        assert_eq!(Rating::from_percentage(0), Rating::Critical);
    }

    #[test]
    fn display_lists_every_finding() {
        let mut f = Findings::new();
        f.pass("Main landmark present");
        f.warn("Review tab order for optimal UX");
        f.fail("Missing skip link");
        let report = ComplianceReport::from_findings(f);
        let text = report.to_string();

        assert!(text.contains("Passed (1):"));
        assert!(text.contains("[pass] Main landmark present"));
        assert!(text.contains("[warn] Review tab order for optimal UX"));
        assert!(text.contains("[fail] Missing skip link"));
        assert!(text.contains("Compliance: 50%"));
        assert!(text.contains("CRITICAL"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let report = ComplianceReport::from_findings(findings(1, 0, 0));
        let text = report.to_string();
        assert!(!text.contains("Warnings"));
        assert!(!text.contains("Failed"));
        assert_eq!(report.rating, Rating::Excellent);
    }
}
