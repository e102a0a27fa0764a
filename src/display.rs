//! Virtual display allocation and lifecycle.
//!
//! Display numbers are allocated by probing for unused X lock/socket
//! paths, so concurrent invocations land on distinct displays instead of
//! colliding on a hardcoded one. Server readiness is detected by polling
//! for the display socket with a bounded retry loop rather than sleeping
//! a fixed interval.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::capture::types::{CaptureError, CaptureResult};
use crate::config;
use crate::session::ProcessGuard;
use crate::tools;

/// Color depth of the virtual screen
const COLOR_DEPTH: u32 = 24;

/// Where X11 display sockets live
const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";

/// Poll interval while waiting for the display socket
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Attempts while waiting for the display socket (5 seconds total)
const SOCKET_POLL_ATTEMPTS: u32 = 50;

/// A running display server bound to an allocated display number.
///
/// Shut down explicitly during session teardown; the embedded guard also
/// terminates the server if the display is dropped on an error path.
#[derive(Debug)]
pub struct VirtualDisplay {
    number: u32,
    width: u32,
    height: u32,
    server: Option<ProcessGuard>,
}

impl VirtualDisplay {
    /// Allocate a free display number, start the display server on it
    /// with a `width`x`height` screen, and wait for it to become
    /// connectable.
    pub fn acquire(width: u32, height: u32) -> CaptureResult<Self> {
        let settings = &config::get().display;
        let number = allocate_display_number(settings.base, settings.attempts).ok_or_else(|| {
            CaptureError::DisplayUnavailable(format!(
                "no free display number in :{}..:{}",
                settings.base,
                settings.base + settings.attempts
            ))
        })?;

        let mut command = Command::new(tools::DISPLAY_SERVER);
        command
            .arg(format!(":{}", number))
            .arg("-screen")
            .arg("0")
            .arg(format!("{}x{}x{}", width, height, COLOR_DEPTH))
            .arg("-nolisten")
            .arg("tcp");
        let mut server = ProcessGuard::spawn(tools::DISPLAY_SERVER, &mut command)?;

        let socket = socket_path(number);
        for _ in 0..SOCKET_POLL_ATTEMPTS {
            if socket.exists() {
                return Ok(Self {
                    number,
                    width,
                    height,
                    server: Some(server),
                });
            }
            if !server.is_running() {
                return Err(CaptureError::DisplayUnavailable(format!(
                    "{} exited while starting display :{}",
                    tools::DISPLAY_SERVER,
                    number
                )));
            }
            thread::sleep(SOCKET_POLL_INTERVAL);
        }

        Err(CaptureError::DisplayUnavailable(format!(
            "display :{} socket never appeared",
            number
        )))
    }

    /// The display name, e.g. `:90`, for `DISPLAY` environment variables
    pub fn name(&self) -> String {
        format!(":{}", self.number)
    }

    /// The allocated display number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Virtual screen width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Virtual screen height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Terminate the display server. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.terminate();
        }
    }
}

fn socket_path(number: u32) -> PathBuf {
    Path::new(X11_SOCKET_DIR).join(format!("X{}", number))
}

fn display_in_use(number: u32) -> bool {
    Path::new(&format!("/tmp/.X{}-lock", number)).exists() || socket_path(number).exists()
}

/// Find an unused display number starting at `base`, probing at most
/// `attempts` numbers. A race with another allocator is possible between
/// the probe and the server binding the display; the server failing to
/// start is caught by the readiness loop in `acquire`.
pub fn allocate_display_number(base: u32, attempts: u32) -> Option<u32> {
    first_free(base, attempts, |number| !display_in_use(number))
}

fn first_free(base: u32, attempts: u32, is_free: impl Fn(u32) -> bool) -> Option<u32> {
    (base..base.saturating_add(attempts)).find(|&number| is_free(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_picks_the_base_when_free() {
        assert_eq!(first_free(90, 20, |_| true), Some(90));
    }

    #[test]
    fn test_first_free_skips_busy_numbers() {
        assert_eq!(first_free(90, 20, |n| n >= 93), Some(93));
    }

    #[test]
    fn test_first_free_exhausts_the_range() {
        assert_eq!(first_free(90, 20, |_| false), None);
        assert_eq!(first_free(90, 0, |_| true), None);
    }

    #[test]
    fn test_socket_path_shape() {
        assert_eq!(socket_path(90), Path::new("/tmp/.X11-unix/X90"));
    }
}
