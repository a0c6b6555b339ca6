//! Carousel doctor — diagnostics and health checks
//!
//! Analyzes `carousel.toml` and `.carousel/log.jsonl` to diagnose issues
//! and suggest fixes. Returns a structured report with categories:
//! errors (must fix), warnings (should fix), info (suggestions).

use regex::Regex;

use crate::cycle::config::{Config, Tolerance};
use crate::log::SelectionRecord;

/// Severity level for a diagnostic finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    /// Must fix — something is broken
    Error,
    /// Should fix — suboptimal configuration
    Warning,
    /// Suggestion — informational improvement
    Info,
}

/// A single diagnostic finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Severity of the finding
    pub severity: Severity,
    /// Short code for the finding (e.g., "D001")
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Suggested fix (optional)
    pub suggestion: Option<String>,
}

/// Diagnostic report from `carousel doctor`
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    /// All findings, in order of severity (errors first)
    pub findings: Vec<Finding>,
}

impl DiagnosticReport {
    /// Returns true if the report has no findings at all
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Returns the number of errors
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warnings
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    /// Returns the number of info items
    #[must_use]
    pub fn info_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Info)
            .count()
    }
}

/// Run all diagnostic checks and return a report.
#[must_use]
pub fn diagnose(config: &Config, log: &[SelectionRecord]) -> DiagnosticReport {
    let mut findings = Vec::new();

    check_unmatched_overrides(config, log, &mut findings);
    check_shadowed_overrides(config, &mut findings);
    check_escalation_pressure(config, log, &mut findings);
    check_cycle_distance(log, &mut findings);

    // Sort: errors first, then warnings, then info
    findings.sort_by_key(|f| match f.severity {
        Severity::Error => 0,
        Severity::Warning => 1,
        Severity::Info => 2,
    });

    DiagnosticReport { findings }
}

/// D001: Override patterns that never matched a journaled document selection
fn check_unmatched_overrides(
    config: &Config,
    log: &[SelectionRecord],
    findings: &mut Vec<Finding>,
) {
    let doc_targets: Vec<&str> = log
        .iter()
        .filter(|r| r.kind == "document")
        .map(|r| r.target.as_str())
        .collect();
    if doc_targets.is_empty() {
        return;
    }

    for entry in &config.kind_overrides {
        let Ok(regex) = Regex::new(&entry.pattern) else {
            continue;
        };
        if !doc_targets.iter().any(|target| regex.is_match(target)) {
            findings.push(Finding {
                severity: Severity::Warning,
                code: "D001".to_string(),
                message: format!(
                    "Override pattern '{}' matched none of the {} journaled document selections",
                    entry.pattern,
                    doc_targets.len()
                ),
                suggestion: Some("Remove the entry or adjust its pattern".to_string()),
            });
        }
    }
}

/// D002: A catch-all override pattern shadows every later entry
fn check_shadowed_overrides(config: &Config, findings: &mut Vec<Finding>) {
    for (index, entry) in config.kind_overrides.iter().enumerate() {
        let Ok(regex) = Regex::new(&entry.pattern) else {
            continue;
        };
        // A pattern that matches the empty string matches every root name.
        if regex.is_match("") && index + 1 < config.kind_overrides.len() {
            findings.push(Finding {
                severity: Severity::Warning,
                code: "D002".to_string(),
                message: format!(
                    "Override pattern '{}' matches everything; the {} entries after it are unreachable",
                    entry.pattern,
                    config.kind_overrides.len() - index - 1
                ),
                suggestion: Some("Move the catch-all entry last or anchor the pattern".to_string()),
            });
            return;
        }
    }
}

/// D003: Console selections repeatedly escalated to force-fresh
fn check_escalation_pressure(
    config: &Config,
    log: &[SelectionRecord],
    findings: &mut Vec<Finding>,
) {
    let forced: usize = log
        .iter()
        .filter(|r| r.kind == "console" && r.escalation >= 16)
        .count();
    if forced >= 3 && config.console.tolerance == Tolerance::Strict {
        findings.push(Finding {
            severity: Severity::Warning,
            code: "D003".to_string(),
            message: format!(
                "{forced} console selections escalated to a forced-fresh console"
            ),
            suggestion: Some(
                "Set [console] tolerance = \"tolerant\" to reuse busy consoles sooner".to_string(),
            ),
        });
    }
}

/// D004: Cycling sessions travel far before settling
fn check_cycle_distance(log: &[SelectionRecord], findings: &mut Vec<Finding>) {
    let distances: Vec<u64> = log
        .iter()
        .filter(|r| r.cycled)
        .map(|r| r.net_moves.unsigned_abs())
        .collect();
    if distances.len() < 5 {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let average = distances.iter().sum::<u64>() as f64 / distances.len() as f64;
    if average > 2.0 {
        findings.push(Finding {
            severity: Severity::Info,
            code: "D004".to_string(),
            message: format!(
                "Cycling sessions average {average:.1} moves before settling"
            ),
            suggestion: Some(
                "Kind overrides can tighten candidate rings so wanted documents come first"
                    .to_string(),
            ),
        });
    }
}
