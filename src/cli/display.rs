//! Rich CLI display for replay runs and diagnostics
//!
//! Renders replay transcripts and doctor reports as human-readable terminal
//! output. All output goes to stderr so stdout remains clean for piping.

use colored::Colorize;

use crate::doctor::{DiagnosticReport, Severity};
use crate::replay::{ReplayResult, TranscriptLine};

/// Display handler for one replay run
pub struct ReplayDisplay {
    script_name: String,
}

impl ReplayDisplay {
    /// Create a new display handler for the given script
    #[must_use]
    pub fn new(script_name: &str) -> Self {
        Self {
            script_name: script_name.to_string(),
        }
    }

    /// Print the replay header at the start of execution
    pub fn print_header(&self) {
        eprintln!(
            "\n{} {}",
            "===".bold().cyan(),
            format!("Replay: {}", self.script_name).bold().cyan()
        );
        eprintln!("{}", "─".repeat(50).dimmed());
    }

    /// Render a transcript line to stderr
    pub fn render_line(&self, line: &TranscriptLine) {
        match line {
            TranscriptLine::Event(text) => {
                eprintln!("  {text}");
            }
            TranscriptLine::Notice(text) => {
                eprintln!("  {} {}", "▶".blue(), text.bold());
            }
            TranscriptLine::Committed { target, cycled } => {
                let how = if *cycled { "after cycling" } else { "directly" };
                eprintln!(
                    "  {} selected '{}' {}",
                    "✓".green().bold(),
                    target.bold(),
                    how.dimmed()
                );
            }
            TranscriptLine::UserError(text) => {
                eprintln!("  {} {}", "✗".red().bold(), text.red());
            }
        }
    }

    /// Render the post-run summary
    pub fn render_summary(&self, result: &ReplayResult) {
        eprintln!("{}", "─".repeat(50).dimmed());
        let cycled = result.records.iter().filter(|r| r.cycled).count();
        eprintln!(
            "  {} {} steps | {} selections ({cycled} cycled)",
            "Stats:".dimmed(),
            result.steps_run,
            result.records.len()
        );
        eprintln!();
    }
}

/// Render a diagnostic report to stderr.
pub fn render_diagnostic_report(report: &DiagnosticReport) {
    if report.is_clean() {
        eprintln!("{} No issues found", "✓".green().bold());
        return;
    }

    for finding in &report.findings {
        let tag = match finding.severity {
            Severity::Error => "ERROR".red().bold().to_string(),
            Severity::Warning => "WARN".yellow().bold().to_string(),
            Severity::Info => "INFO".blue().to_string(),
        };
        eprintln!("{tag} [{}] {}", finding.code, finding.message);
        if let Some(suggestion) = &finding.suggestion {
            eprintln!("     {} {}", "fix:".dimmed(), suggestion);
        }
    }

    eprintln!(
        "\n{} error(s), {} warning(s), {} suggestion(s)",
        report.error_count(),
        report.warning_count(),
        report.info_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctor::Finding;

    #[test]
    fn test_new_display() {
        let display = ReplayDisplay::new("session.txt");
        assert_eq!(display.script_name, "session.txt");
    }

    // Rendering goes to stderr; these just exercise every branch.
    #[test]
    fn test_render_all_line_types_no_panic() {
        let display = ReplayDisplay::new("test");
        display.render_line(&TranscriptLine::Event("Opened document 'a'".to_string()));
        display.render_line(&TranscriptLine::Notice(
            "Cycling: n → next, p → previous".to_string(),
        ));
        display.render_line(&TranscriptLine::Committed {
            target: "report<2>".to_string(),
            cycled: true,
        });
        display.render_line(&TranscriptLine::Committed {
            target: "alone".to_string(),
            cycled: false,
        });
        display.render_line(&TranscriptLine::UserError(
            "No document named 'missing'".to_string(),
        ));
    }

    #[test]
    fn test_render_summary_no_panic() {
        let display = ReplayDisplay::new("test");
        let result = ReplayResult {
            steps_run: 3,
            records: vec![],
            transcript: vec![],
        };
        display.print_header();
        display.render_summary(&result);
    }

    #[test]
    fn test_render_clean_report_no_panic() {
        render_diagnostic_report(&DiagnosticReport { findings: vec![] });
    }

    #[test]
    fn test_render_report_with_findings_no_panic() {
        let report = DiagnosticReport {
            findings: vec![
                Finding {
                    severity: Severity::Warning,
                    code: "D001".to_string(),
                    message: "Pattern never matched".to_string(),
                    suggestion: Some("Remove it".to_string()),
                },
                Finding {
                    severity: Severity::Info,
                    code: "D004".to_string(),
                    message: "Long cycles".to_string(),
                    suggestion: None,
                },
            ],
        };
        render_diagnostic_report(&report);
    }
}
