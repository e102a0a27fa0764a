//! Window discovery, geometry, and activation on a virtual display.
//!
//! The emulator window does not exist immediately after process launch,
//! so discovery polls with a short backoff before giving up. Geometry
//! comes back from the query tool as free-form `KEY=VALUE` text; it is
//! parsed into a typed result so an unparseable or implausible reply
//! degrades to a full-display capture instead of a bogus region.

use std::fmt;
use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::tools;

/// Attempts when polling for the emulator window to appear
pub const DISCOVERY_ATTEMPTS: u32 = 20;

/// Backoff between discovery attempts
pub const DISCOVERY_BACKOFF: Duration = Duration::from_millis(250);

/// Minimum plausible dimension for a real emulator window. A geometry
/// reply with either dimension below this is treated as bogus and the
/// capture falls back to the full display.
pub const MIN_PLAUSIBLE_DIM: u32 = 64;

/// Opaque handle for a window on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position and size of a window (or capture region) on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Horizontal offset from the display origin
    pub x: i32,
    /// Vertical offset from the display origin
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl WindowGeometry {
    /// The full-display region for a screen of the given size
    pub fn full_display(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Why a geometry query produced no usable rectangle
#[derive(Debug)]
pub enum GeometryError {
    /// The query tool failed to run or exited non-zero
    Query(String),
    /// The reply did not parse as `KEY=VALUE` geometry output
    Parse(String),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::Query(msg) => write!(f, "geometry query failed: {}", msg),
            GeometryError::Parse(msg) => write!(f, "geometry output unparseable: {}", msg),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Window operations a capture run needs from the display.
///
/// The production implementation shells out to the window tool; tests
/// stub this to exercise the discovery and fallback paths without a
/// display server.
pub trait WindowQuery {
    /// Find a visible window whose title matches the given pattern
    fn find_window(&self, title: &str) -> Option<WindowId>;

    /// Query a window's position and size
    fn geometry(&self, window: WindowId) -> Result<WindowGeometry, GeometryError>;

    /// Give a window input focus
    fn activate(&self, window: WindowId) -> std::io::Result<()>;
}

/// xdotool-backed window operations bound to one display
pub struct Xdotool {
    display: String,
}

impl Xdotool {
    /// Create window operations for the given display name (e.g. `:90`)
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }
}

impl WindowQuery for Xdotool {
    fn find_window(&self, title: &str) -> Option<WindowId> {
        let output = Command::new(tools::WINDOW_TOOL)
            .env("DISPLAY", &self.display)
            .args(["search", "--onlyvisible", "--name", title])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find_map(|line| line.trim().parse::<u64>().ok())
            .map(WindowId)
    }

    fn geometry(&self, window: WindowId) -> Result<WindowGeometry, GeometryError> {
        let output = Command::new(tools::WINDOW_TOOL)
            .env("DISPLAY", &self.display)
            .args(["getwindowgeometry", "--shell"])
            .arg(window.to_string())
            .output()
            .map_err(|e| GeometryError::Query(e.to_string()))?;
        if !output.status.success() {
            return Err(GeometryError::Query(format!(
                "{} exited with {}",
                tools::WINDOW_TOOL,
                output.status
            )));
        }
        parse_shell_geometry(&String::from_utf8_lossy(&output.stdout))
    }

    fn activate(&self, window: WindowId) -> std::io::Result<()> {
        let status = Command::new(tools::WINDOW_TOOL)
            .env("DISPLAY", &self.display)
            .args(["windowactivate", "--sync"])
            .arg(window.to_string())
            .status()?;
        if !status.success() {
            eprintln!("Warning: could not activate window {}", window);
        }
        Ok(())
    }
}

/// Parse the window tool's `--shell` geometry output: one `KEY=VALUE`
/// per line, of which `X`, `Y`, `WIDTH` and `HEIGHT` are required.
pub fn parse_shell_geometry(text: &str) -> Result<WindowGeometry, GeometryError> {
    let mut x: Option<i32> = None;
    let mut y: Option<i32> = None;
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "X" => x = value.parse().ok(),
            "Y" => y = value.parse().ok(),
            "WIDTH" => width = value.parse().ok(),
            "HEIGHT" => height = value.parse().ok(),
            _ => {}
        }
    }

    match (x, y, width, height) {
        (Some(x), Some(y), Some(width), Some(height)) => Ok(WindowGeometry {
            x,
            y,
            width,
            height,
        }),
        _ => Err(GeometryError::Parse(format!(
            "missing geometry fields in {:?}",
            text.trim()
        ))),
    }
}

/// Poll for a window matching `title`, retrying with backoff. The window
/// may not exist immediately after the emulator launches; exhausting the
/// attempts is not an error, the caller falls back to the full display.
pub fn discover_window(
    query: &dyn WindowQuery,
    title: &str,
    attempts: u32,
    backoff: Duration,
) -> Option<WindowId> {
    for attempt in 0..attempts {
        if let Some(window) = query.find_window(title) {
            return Some(window);
        }
        if attempt + 1 < attempts {
            thread::sleep(backoff);
        }
    }
    None
}

/// Decide what region to capture: the window's own geometry when it is
/// known and plausible, otherwise the full display (with a warning).
pub fn resolve_capture_region(
    query: &dyn WindowQuery,
    window: Option<WindowId>,
    display_width: u32,
    display_height: u32,
) -> WindowGeometry {
    let full = WindowGeometry::full_display(display_width, display_height);

    let Some(window) = window else {
        eprintln!("Warning: emulator window not found, capturing the full display");
        return full;
    };

    match query.geometry(window) {
        Ok(geometry)
            if geometry.width >= MIN_PLAUSIBLE_DIM && geometry.height >= MIN_PLAUSIBLE_DIM =>
        {
            geometry
        }
        Ok(geometry) => {
            eprintln!(
                "Warning: implausible window geometry {}x{}, capturing the full display",
                geometry.width, geometry.height
            );
            full
        }
        Err(err) => {
            eprintln!("Warning: {}, capturing the full display", err);
            full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct StubQuery {
        window: Option<WindowId>,
        geometry: Option<WindowGeometry>,
    }

    impl WindowQuery for StubQuery {
        fn find_window(&self, _title: &str) -> Option<WindowId> {
            self.window
        }

        fn geometry(&self, _window: WindowId) -> Result<WindowGeometry, GeometryError> {
            self.geometry
                .ok_or_else(|| GeometryError::Query("stubbed failure".to_string()))
        }

        fn activate(&self, _window: WindowId) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_shell_geometry() {
        let text = "WINDOW=62914561\nX=0\nY=0\nWIDTH=512\nHEIGHT=480\nSCREEN=0\n";
        let geometry = parse_shell_geometry(text).unwrap();
        assert_eq!(
            geometry,
            WindowGeometry {
                x: 0,
                y: 0,
                width: 512,
                height: 480
            }
        );
    }

    #[test]
    fn test_parse_shell_geometry_negative_position() {
        let text = "X=-4\nY=22\nWIDTH=512\nHEIGHT=480\n";
        let geometry = parse_shell_geometry(text).unwrap();
        assert_eq!(geometry.x, -4);
        assert_eq!(geometry.y, 22);
    }

    #[test]
    fn test_parse_shell_geometry_rejects_garbage() {
        assert!(matches!(
            parse_shell_geometry("not geometry output"),
            Err(GeometryError::Parse(_))
        ));
        assert!(matches!(
            parse_shell_geometry("X=0\nY=0\nWIDTH=512\n"),
            Err(GeometryError::Parse(_))
        ));
    }

    #[test]
    fn test_discover_window_retries_until_found() {
        struct CountingQuery {
            calls: Cell<u32>,
        }

        impl WindowQuery for CountingQuery {
            fn find_window(&self, _title: &str) -> Option<WindowId> {
                let calls = self.calls.get() + 1;
                self.calls.set(calls);
                (calls >= 3).then_some(WindowId(7))
            }

            fn geometry(&self, _window: WindowId) -> Result<WindowGeometry, GeometryError> {
                Err(GeometryError::Query("unused".to_string()))
            }

            fn activate(&self, _window: WindowId) -> std::io::Result<()> {
                Ok(())
            }
        }

        let query = CountingQuery {
            calls: Cell::new(0),
        };
        let window = discover_window(&query, "fceux", 5, Duration::from_millis(1));
        assert_eq!(window, Some(WindowId(7)));
        assert_eq!(query.calls.get(), 3);
    }

    #[test]
    fn test_discover_window_gives_up() {
        let query = StubQuery {
            window: None,
            geometry: None,
        };
        let window = discover_window(&query, "fceux", 3, Duration::from_millis(1));
        assert_eq!(window, None);
    }

    #[test]
    fn test_resolve_region_uses_plausible_window_geometry() {
        let geometry = WindowGeometry {
            x: 10,
            y: 20,
            width: 512,
            height: 480,
        };
        let query = StubQuery {
            window: Some(WindowId(1)),
            geometry: Some(geometry),
        };
        assert_eq!(
            resolve_capture_region(&query, Some(WindowId(1)), 1024, 768),
            geometry
        );
    }

    #[test]
    fn test_resolve_region_falls_back_without_a_window() {
        let query = StubQuery {
            window: None,
            geometry: None,
        };
        assert_eq!(
            resolve_capture_region(&query, None, 512, 480),
            WindowGeometry::full_display(512, 480)
        );
    }

    #[test]
    fn test_resolve_region_falls_back_on_implausible_geometry() {
        let query = StubQuery {
            window: Some(WindowId(1)),
            geometry: Some(WindowGeometry {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            }),
        };
        assert_eq!(
            resolve_capture_region(&query, Some(WindowId(1)), 512, 480),
            WindowGeometry::full_display(512, 480)
        );
    }

    #[test]
    fn test_resolve_region_falls_back_on_query_failure() {
        let query = StubQuery {
            window: Some(WindowId(1)),
            geometry: None,
        };
        assert_eq!(
            resolve_capture_region(&query, Some(WindowId(1)), 512, 480),
            WindowGeometry::full_display(512, 480)
        );
    }
}
