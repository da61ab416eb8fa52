//! Bridge doctor — diagnostics and health checks
//!
//! Checks the console configuration and, when nothing is obviously
//! broken, starts the console once to see that its banner is recognised.
//! Returns a structured report with categories: errors (must fix),
//! warnings (should fix), info (suggestions).

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::config::ConsoleConfig;
use crate::machine::flow::Flow;
use crate::session::Session;

/// Output timeouts below this are likely to cut rounds short
const MIN_SENSIBLE_TIMEOUT_MS: u64 = 200;

/// Output timeouts above this make every error response slow
const MAX_SENSIBLE_TIMEOUT_MS: u64 = 10_000;

/// Severity level for a diagnostic finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
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

/// Diagnostic report from `wcbridge doctor`
#[derive(Debug, Clone, Default)]
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
        self.count(Severity::Error)
    }

    /// Returns the number of warnings
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Returns the number of info items
    #[must_use]
    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    fn sort(&mut self) {
        self.findings.sort_by_key(|f| f.severity);
    }
}

/// Run the static configuration checks only.
#[must_use]
pub fn diagnose(config: &ConsoleConfig) -> DiagnosticReport {
    let mut findings = Vec::new();

    check_executable(&config.executable, &mut findings);
    check_timeout(config.output_timeout_ms, &mut findings);

    let mut report = DiagnosticReport { findings };
    report.sort();
    report
}

/// Run the static checks, then probe the console if none of them failed.
pub async fn diagnose_live(config: &ConsoleConfig, cancel: CancellationToken) -> DiagnosticReport {
    let mut report = diagnose(config);

    if report.error_count() == 0 {
        if let Some(finding) = probe_startup(config, cancel).await {
            report.findings.push(finding);
            report.sort();
        }
    }

    report
}

/// D001/D002: the executable exists and can be run
fn check_executable(path: &Path, findings: &mut Vec<Finding>) {
    if !path.is_file() {
        findings.push(Finding {
            severity: Severity::Error,
            code: "D001".to_string(),
            message: format!("WalletConsole executable not found at '{}'", path.display()),
            suggestion: Some(
                "Set `executable` in the [console] section of walletconsole.toml or pass --executable"
                    .to_string(),
            ),
        });
        return;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let executable = std::fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            findings.push(Finding {
                severity: Severity::Error,
                code: "D002".to_string(),
                message: format!("'{}' is not executable", path.display()),
                suggestion: Some(format!("Run `chmod +x {}`", path.display())),
            });
        }
    }
}

/// D003: the watchdog interval is in a sensible range
fn check_timeout(timeout_ms: u64, findings: &mut Vec<Finding>) {
    if timeout_ms < MIN_SENSIBLE_TIMEOUT_MS {
        findings.push(Finding {
            severity: Severity::Warning,
            code: "D003".to_string(),
            message: format!("Output timeout of {timeout_ms}ms may end rounds before the console answers"),
            suggestion: Some(format!(
                "Raise `output_timeout_ms` to at least {MIN_SENSIBLE_TIMEOUT_MS}"
            )),
        });
    } else if timeout_ms > MAX_SENSIBLE_TIMEOUT_MS {
        findings.push(Finding {
            severity: Severity::Info,
            code: "D003".to_string(),
            message: format!("Output timeout of {timeout_ms}ms makes failed commands slow"),
            suggestion: Some("The default of 1000ms is enough for a local console".to_string()),
        });
    }
}

/// D004: the console starts and prints a recognisable banner
async fn probe_startup(config: &ConsoleConfig, cancel: CancellationToken) -> Option<Finding> {
    let outcome = match Session::open(config, Flow::ApplicationStartup, cancel) {
        Ok(mut session) => session.start().await,
        Err(err) => Err(err),
    };

    outcome.err().map(|err| Finding {
        severity: Severity::Error,
        code: "D004".to_string(),
        message: format!("WalletConsole did not start cleanly: {err}"),
        suggestion: Some(
            "Run the executable by hand and check that it prints the Wallet-core Console banner"
                .to_string(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(executable: PathBuf, output_timeout_ms: u64) -> ConsoleConfig {
        ConsoleConfig {
            executable,
            output_timeout_ms,
            ..ConsoleConfig::default()
        }
    }

    #[cfg(unix)]
    fn executable_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("walletconsole");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_report_counts() {
        let report = DiagnosticReport {
            findings: vec![
                Finding {
                    severity: Severity::Error,
                    code: "D001".to_string(),
                    message: "missing".to_string(),
                    suggestion: None,
                },
                Finding {
                    severity: Severity::Warning,
                    code: "D003".to_string(),
                    message: "short".to_string(),
                    suggestion: None,
                },
            ],
        };
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.info_count(), 0);
        assert!(!report.is_clean());
        assert!(DiagnosticReport::default().is_clean());
    }

    #[test]
    fn test_d001_missing_executable() {
        let report = diagnose(&config(PathBuf::from("/definitely/not/here/walletconsole"), 1000));
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.findings[0].code, "D001");
        assert!(report.findings[0].message.contains("/definitely/not/here/walletconsole"));
    }

    #[cfg(unix)]
    #[test]
    fn test_d002_not_executable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let report = diagnose(&config(file.path().to_path_buf(), 1000));
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code, "D002");
        assert_eq!(report.findings[0].severity, Severity::Error);
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_static_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = executable_file(&dir, "#!/bin/sh\n");
        assert!(diagnose(&config(path, 1000)).is_clean());
    }

    #[test]
    fn test_d003_short_timeout_warns() {
        let mut findings = Vec::new();
        check_timeout(50, &mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].code, "D003");
    }

    #[test]
    fn test_d003_long_timeout_is_info() {
        let mut findings = Vec::new();
        check_timeout(60_000, &mut findings);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_d003_bounds_are_inclusive() {
        let mut findings = Vec::new();
        check_timeout(MIN_SENSIBLE_TIMEOUT_MS, &mut findings);
        check_timeout(MAX_SENSIBLE_TIMEOUT_MS, &mut findings);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_findings_ordered_by_severity() {
        let report = diagnose(&config(PathBuf::from("/definitely/not/here"), 20_000));
        let severities: Vec<_> = report.findings.iter().map(|f| f.severity).collect();
        assert_eq!(severities, [Severity::Error, Severity::Info]);
    }

    #[tokio::test]
    async fn test_live_probe_skipped_when_static_errors() {
        let report = diagnose_live(
            &config(PathBuf::from("/definitely/not/here"), 1000),
            CancellationToken::new(),
        )
        .await;
        assert!(report.findings.iter().all(|f| f.code != "D004"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_d004_console_without_banner() {
        let dir = tempfile::tempdir().unwrap();
        let path = executable_file(&dir, "#!/bin/sh\necho 'hello'\nsleep 5\n");

        let report = diagnose_live(&config(path, 200), CancellationToken::new()).await;
        assert_eq!(report.error_count(), 1);
        let finding = report.findings.iter().find(|f| f.code == "D004").unwrap();
        assert!(finding.message.contains("No data"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_live_probe_passes_with_banner() {
        let dir = tempfile::tempdir().unwrap();
        let script = "#!/bin/sh\n\
            echo 'Wallet-core Console'\n\
            echo \"Type 'help' for list of commands.\"\n\
            echo 'Loading coins ...'\n\
            echo 'Set active coin to: bitcoin'\n\
            sleep 5\n";
        let path = executable_file(&dir, script);

        let report = diagnose_live(&config(path, 500), CancellationToken::new()).await;
        assert!(report.is_clean(), "{:?}", report.findings);
    }
}
