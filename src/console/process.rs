//! Wallet console process control
//!
//! Checks for the executable, builds the spawn command with all three
//! streams piped, and tears the process tree down again.

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Fail with `ProcessUnavailable` unless `path` names an existing file.
///
/// # Errors
///
/// Returns [`BridgeError::ProcessUnavailable`] when the file is missing.
pub fn ensure_executable(path: &Path) -> Result<(), BridgeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BridgeError::ProcessUnavailable(path.to_path_buf()))
    }
}

/// Build the command that starts the console.
///
/// The child is placed in its own process group on Unix so the whole
/// tree can be signalled at once, and is killed if the handle is dropped.
#[must_use]
pub fn build_command(path: &Path) -> Command {
    let mut cmd = Command::new(path);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// Kill the console and everything it started. Failures are logged only.
pub fn kill_process_tree(child: &mut Child) {
    let Some(pid) = child.id() else {
        debug!("Console already exited");
        return;
    };

    #[cfg(unix)]
    {
        let mut kill = std::process::Command::new("kill");
        kill.arg("-KILL")
            .arg("--")
            .arg(format!("-{pid}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Inside a runtime the kill runs detached and tokio reaps it.
        let sent = if tokio::runtime::Handle::try_current().is_ok() {
            Command::from(kill).spawn().map(drop)
        } else {
            kill.status().map(drop)
        };
        match sent {
            Ok(()) => debug!(pid, "Killing console process group"),
            Err(err) => warn!(pid, error = %err, "Failed to run kill for process group"),
        }
    }

    if let Err(err) = child.start_kill() {
        debug!(pid, error = %err, "Console kill failed");
    }
}

/// True when a tracer (debugger) is attached to this process.
///
/// Reads `TracerPid` from `/proc/self/status`; always false off Linux.
#[must_use]
pub fn debugger_attached() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .as_deref()
            .and_then(tracer_pid)
            .is_some_and(|pid| pid != 0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable_is_unavailable() {
        let err = ensure_executable(Path::new("/definitely/not/here/walletconsole")).unwrap_err();
        assert!(matches!(err, BridgeError::ProcessUnavailable(_)));
        assert!(err.to_string().contains("/definitely/not/here/walletconsole"));
    }

    #[test]
    fn test_directory_is_not_an_executable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_executable(dir.path()).is_err());
    }

    #[test]
    fn test_existing_file_passes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ensure_executable(file.path()).is_ok());
    }

    #[test]
    fn test_build_command_uses_path_and_parent_dir() {
        let cmd = build_command(Path::new("/opt/wallet/walletconsole"));
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "/opt/wallet/walletconsole");
        assert_eq!(std_cmd.get_current_dir(), Some(Path::new("/opt/wallet")));
        assert_eq!(std_cmd.get_args().count(), 0);
    }

    #[test]
    fn test_build_command_bare_name_keeps_cwd() {
        let cmd = build_command(Path::new("walletconsole"));
        assert_eq!(cmd.as_std().get_current_dir(), None);
    }

    #[test]
    fn test_tracer_pid_parsing() {
        assert_eq!(tracer_pid("Name:\tx\nTracerPid:\t0\n"), Some(0));
        assert_eq!(tracer_pid("TracerPid:\t4242\n"), Some(4242));
        assert_eq!(tracer_pid("Name:\tx\n"), None);
    }

    #[tokio::test]
    async fn test_kill_process_tree_stops_child() {
        let mut child = build_command(Path::new("sleep"))
            .arg("30")
            .spawn()
            .unwrap();
        kill_process_tree(&mut child);
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_process_tree_reaches_grandchildren() {
        use tokio::io::AsyncReadExt;

        let mut child = build_command(Path::new("sh"))
            .arg("-c")
            .arg("sleep 30 & wait")
            .spawn()
            .unwrap();
        let mut stdout = child.stdout.take().unwrap();

        kill_process_tree(&mut child);
        child.wait().await.unwrap();

        // The backgrounded sleep holds stdout open until it dies too
        let mut rest = Vec::new();
        tokio::time::timeout(std::time::Duration::from_secs(5), stdout.read_to_end(&mut rest))
            .await
            .expect("grandchild should be killed with the group")
            .unwrap();
    }
}
