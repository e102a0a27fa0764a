//! nes-capture - Headless NES emulator capture.
//!
//! This crate provides:
//! - Screenshot and fixed-duration video capture of a ROM running in a
//!   graphical NES emulator, driven entirely off-screen
//! - Per-run virtual display allocation so concurrent captures don't collide
//! - Window discovery with a full-display fallback when the emulator
//!   window can't be found or reports implausible geometry
//! - Scoped process management: everything spawned is torn down on every
//!   exit path, including timeouts
//!
//! # Example
//!
//! ```rust,no_run
//! use nes_capture::capture::{CaptureRequest, capture_screenshot};
//!
//! let request = CaptureRequest::screenshot("game.nes", "out.png")
//!     .scale(2)
//!     .crop(true);
//! let outcome = capture_screenshot(&request).unwrap();
//! println!("{}", outcome.output_path.display());
//! ```

pub mod capture;
pub mod config;
pub mod display;
pub mod emulator;
pub mod input;
pub mod session;
pub mod tools;
pub mod window;

// Re-export capture types and entry points
pub use capture::{
    CaptureError, CaptureKind, CaptureOutcome, CaptureRequest, CaptureResult, VideoFormat,
    capture_screenshot, capture_video, viewport_rect,
};

// Re-export session management
pub use session::{CaptureSession, ProcessGuard};

// Re-export display and window primitives
pub use display::VirtualDisplay;
pub use window::{
    GeometryError, WindowGeometry, WindowId, WindowQuery, Xdotool, discover_window,
    resolve_capture_region,
};
