//! Scoped child-process management for capture runs.
//!
//! Provides guaranteed cleanup of everything a run spawns:
//! - `ProcessGuard`: a child process terminated on drop
//! - `CaptureSession`: the set of live handles for one run, torn down in
//!   a fixed order on every exit path
//!
//! Guards never escalate teardown failures; a process that already exited
//! is simply reaped.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::types::{CaptureError, CaptureResult};
use crate::display::VirtualDisplay;
use crate::window::WindowId;

/// How long a process gets to exit after SIGTERM before it is killed
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Poll interval while waiting on a child
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A spawned child process that is terminated when the guard is dropped.
///
/// Termination is graceful-then-forced: SIGTERM, a bounded grace period,
/// then SIGKILL. All teardown errors are swallowed.
#[derive(Debug)]
pub struct ProcessGuard {
    tool: String,
    child: Child,
    reaped: bool,
}

impl ProcessGuard {
    /// Spawn `command` with stdio silenced, wrapping the child in a guard
    pub fn spawn(tool: &str, command: &mut Command) -> CaptureResult<Self> {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        Ok(Self {
            tool: tool.to_string(),
            child,
            reaped: false,
        })
    }

    /// OS process id of the guarded child
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Name of the tool this guard wraps
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Whether the child is still running
    pub fn is_running(&mut self) -> bool {
        if self.reaped {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(_)) => {
                self.reaped = true;
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Wait for the child to exit, polling until `deadline`. If the
    /// deadline passes first the child is terminated and the run fails
    /// with `Timeout(budget)`.
    pub fn wait_until(&mut self, deadline: Instant, budget: Duration) -> CaptureResult<ExitStatus> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(status);
            }
            if Instant::now() >= deadline {
                self.terminate();
                return Err(CaptureError::Timeout(budget));
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Terminate the child: SIGTERM, bounded grace period, then SIGKILL.
    /// Idempotent; errors are swallowed.
    pub fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        if let Ok(Some(_)) = self.child.try_wait() {
            self.reaped = true;
            return;
        }

        send_sigterm(self.child.id());

        let grace_deadline = Instant::now() + TERM_GRACE;
        while Instant::now() < grace_deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                self.reaped = true;
                return;
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

/// The live handles for one capture run.
///
/// Field declaration order is teardown order: the emulator must go down
/// before the window manager, and both before the display server they are
/// connected to. Drop glue follows declaration order, so the invariant
/// holds on every exit path even without an explicit `teardown()` call.
#[derive(Debug)]
pub struct CaptureSession {
    /// Emulator process
    pub emulator: Option<ProcessGuard>,
    /// Window manager process (video capture only)
    pub window_manager: Option<ProcessGuard>,
    /// The virtual display everything above is connected to
    display: VirtualDisplay,
    /// The discovered emulator window, if discovery succeeded
    pub window: Option<WindowId>,
}

impl CaptureSession {
    /// Create a session on an acquired display, with nothing spawned yet
    pub fn new(display: VirtualDisplay) -> Self {
        Self {
            emulator: None,
            window_manager: None,
            display,
            window: None,
        }
    }

    /// The display this session runs on
    pub fn display(&self) -> &VirtualDisplay {
        &self.display
    }

    /// Tear down all spawned processes in order: emulator, window manager,
    /// display server. Safe to call more than once; Drop covers the paths
    /// that never reach an explicit call.
    pub fn teardown(&mut self) {
        if let Some(mut emulator) = self.emulator.take() {
            emulator.terminate();
        }
        if let Some(mut wm) = self.window_manager.take() {
            wm.terminate();
        }
        self.display.shutdown();
    }
}
