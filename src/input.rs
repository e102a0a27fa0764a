//! Input-script execution against the discovered window.
//!
//! An input script is an executable supplied by the user that sends
//! synthetic key events during a video run. It inherits the capture
//! display, and the discovered window handle is exported so the script
//! can address the emulator without re-querying.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use crate::capture::types::CaptureResult;
use crate::session::ProcessGuard;
use crate::window::WindowId;

/// Environment variable carrying the discovered window handle
pub const ENV_WINDOW_HANDLE: &str = "NES_CAPTURE_WINDOW";

/// Run the input script to completion, bounded by the run deadline.
/// A non-zero exit is reported as a warning, not a failure; the recording
/// still happens.
pub fn run_input_script(
    script: &Path,
    display: &str,
    window: Option<WindowId>,
    deadline: Instant,
    budget: Duration,
) -> CaptureResult<()> {
    let mut command = Command::new(script);
    command.env("DISPLAY", display);
    if let Some(window) = window {
        command.env(ENV_WINDOW_HANDLE, window.to_string());
    }

    let mut guard = ProcessGuard::spawn("input script", &mut command)?;
    let status = guard.wait_until(deadline, budget)?;
    if !status.success() {
        eprintln!(
            "Warning: input script {} exited with {}",
            script.display(),
            status
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[cfg(unix)]
    fn executable_script(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("inputs.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_script_sees_the_window_handle() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("window.txt");
        let script = executable_script(
            dir.path(),
            &format!("printf '%s' \"$NES_CAPTURE_WINDOW\" > {}", marker.display()),
        );

        run_input_script(
            &script,
            ":90",
            Some(WindowId(42)),
            Instant::now() + Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&marker).unwrap(), "42");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_script_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let script = executable_script(dir.path(), "exit 3");

        let result = run_input_script(
            &script,
            ":90",
            None,
            Instant::now() + Duration::from_secs(5),
            Duration::from_secs(5),
        );
        assert!(result.is_ok());
    }
}
