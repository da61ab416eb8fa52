//! CLI display for results and diagnostics
//!
//! Result JSON is rendered for stdout; everything meant for a human goes
//! to stderr so stdout stays clean for piping.

use colored::{ColoredString, Colorize};

use crate::doctor::{DiagnosticReport, Severity};
use crate::error::BridgeError;
use crate::machine::result::ConsoleResult;

/// JSON line printed to stdout for a successful operation.
#[must_use]
pub fn result_json(result: &ConsoleResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|_| r#"{"error":"Internal error"}"#.to_string())
}

/// JSON line printed to stdout for a failed operation.
///
/// Content errors carry their message; everything else is reported the
/// same way so callers only ever parse one shape.
#[must_use]
pub fn error_json(err: &BridgeError) -> String {
    result_json(&ConsoleResult::error(err.to_string()))
}

/// Print a failed operation to stderr.
pub fn print_error(err: &BridgeError) {
    let label = if err.is_content_error() {
        "error:".yellow().bold()
    } else {
        "fatal:".red().bold()
    };
    eprintln!("{label} {err}");
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue().bold(),
    }
}

/// Render a doctor report as text lines.
#[must_use]
pub fn render_diagnostic_report(report: &DiagnosticReport) -> Vec<String> {
    if report.is_clean() {
        return vec![format!("{} WalletConsole looks healthy", "✓".green().bold())];
    }

    let mut lines = Vec::new();
    for finding in &report.findings {
        lines.push(format!(
            "{} [{}] {}",
            severity_label(finding.severity),
            finding.code.dimmed(),
            finding.message
        ));
        if let Some(suggestion) = &finding.suggestion {
            lines.push(format!("  {} {suggestion}", "→".dimmed()));
        }
    }
    lines.push(format!(
        "{} error(s), {} warning(s), {} info",
        report.error_count(),
        report.warning_count(),
        report.info_count()
    ));
    lines
}

/// Print a doctor report to stderr.
pub fn print_diagnostic_report(report: &DiagnosticReport) {
    for line in render_diagnostic_report(report) {
        eprintln!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctor::Finding;
    use crate::error::FlowError;
    use crate::machine::result::CoinInfo;

    #[test]
    fn test_result_json_shapes() {
        assert_eq!(
            result_json(&ConsoleResult::text("m/84'/0'/0'/0/0")),
            r#"{"result":"m/84'/0'/0'/0/0"}"#
        );
        assert_eq!(result_json(&ConsoleResult::boolean(false)), r#"{"result":false}"#);
        assert_eq!(
            result_json(&ConsoleResult::coins(vec![CoinInfo::from_row("btc\tbitcoin\t'bitcoin'")])),
            r#"{"result":[{"network":"btc","id":"bitcoin","name":"bitcoin"}]}"#
        );
    }

    #[test]
    fn test_error_json_uses_caller_message() {
        let err = BridgeError::from(FlowError::Filtered("Invalid component".to_string()));
        assert_eq!(error_json(&err), r#"{"error":"Invalid component"}"#);
        assert_eq!(
            error_json(&BridgeError::invalid("CoinId must be provided")),
            r#"{"error":"CoinId must be provided"}"#
        );
    }

    #[test]
    fn test_clean_report_renders_single_line() {
        colored::control::set_override(false);
        let lines = render_diagnostic_report(&DiagnosticReport::default());
        assert_eq!(lines, ["✓ WalletConsole looks healthy"]);
    }

    #[test]
    fn test_report_lists_findings_and_summary() {
        colored::control::set_override(false);
        let report = DiagnosticReport {
            findings: vec![Finding {
                severity: Severity::Error,
                code: "D001".to_string(),
                message: "WalletConsole executable not found at 'x'".to_string(),
                suggestion: Some("pass --executable".to_string()),
            }],
        };

        let lines = render_diagnostic_report(&report);
        assert_eq!(lines[0], "error [D001] WalletConsole executable not found at 'x'");
        assert_eq!(lines[1], "  → pass --executable");
        assert_eq!(lines[2], "1 error(s), 0 warning(s), 0 info");
    }

    #[test]
    fn test_print_error_no_panic() {
        print_error(&BridgeError::Cancelled);
        print_error(&BridgeError::from(FlowError::NoData));
    }
}
