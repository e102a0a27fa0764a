// Define core types for capture functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config;

/// NES frame width in pixels
pub const NES_FRAME_WIDTH: u32 = 256;

/// NES frame height in pixels, including overscan
pub const NES_FRAME_HEIGHT: u32 = 240;

/// Height of the reliably visible game area (overscan excluded)
pub const NES_VISIBLE_HEIGHT: u32 = 224;

/// Overscan rows hidden at the top of the frame on a CRT
pub const NES_OVERSCAN_ROWS: u32 = 8;

/// Recognized ROM file extension
pub const ROM_EXTENSION: &str = "nes";

/// Slack added on top of warm-up and recording time before the whole run
/// is declared hung and forcibly torn down.
pub const OUTER_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

/// Which kind of capture a request describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureKind {
    /// Single still image of the emulator window
    Screenshot,
    /// Fixed-duration recording of the emulator window
    Video,
}

/// Parsed, validated configuration for one capture run.
///
/// Constructed once per invocation from CLI arguments and immutable
/// thereafter. `validate()` must pass before any child process is spawned.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Kind of capture to perform
    pub kind: CaptureKind,
    /// Path to the ROM image handed to the emulator
    pub rom_path: PathBuf,
    /// Target file; the extension selects the output format
    pub output_path: PathBuf,
    /// Warm-up delay before capture (seconds, non-negative)
    pub warmup_seconds: f64,
    /// Recording length (seconds, video only)
    pub duration_seconds: f64,
    /// Emulator scale factor (1..=4)
    pub scale_factor: u32,
    /// Recording frame rate (video only)
    pub frame_rate: u32,
    /// Crop the screenshot to the visible game area (screenshot only)
    pub crop_to_viewport: bool,
    /// Script executed against the discovered window before recording
    /// starts (video only)
    pub input_script_path: Option<PathBuf>,
}

impl CaptureRequest {
    /// Create a screenshot request with defaults from the configuration
    pub fn screenshot(rom_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        let defaults = &config::get().defaults;
        Self {
            kind: CaptureKind::Screenshot,
            rom_path: rom_path.into(),
            output_path: output_path.into(),
            warmup_seconds: defaults.wait_seconds,
            duration_seconds: defaults.duration_seconds,
            scale_factor: defaults.scale_factor,
            frame_rate: defaults.frame_rate,
            crop_to_viewport: false,
            input_script_path: None,
        }
    }

    /// Create a video request with defaults from the configuration
    pub fn video(rom_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: CaptureKind::Video,
            ..Self::screenshot(rom_path, output_path)
        }
    }

    /// Set the warm-up delay
    pub fn warmup(mut self, seconds: f64) -> Self {
        self.warmup_seconds = seconds;
        self
    }

    /// Set the recording length
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Set the emulator scale factor
    pub fn scale(mut self, factor: u32) -> Self {
        self.scale_factor = factor;
        self
    }

    /// Set the recording frame rate
    pub fn fps(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Crop the screenshot to the visible game area
    pub fn crop(mut self, crop_to_viewport: bool) -> Self {
        self.crop_to_viewport = crop_to_viewport;
        self
    }

    /// Set the input script to run before recording
    pub fn input_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_script_path = Some(path.into());
        self
    }

    /// Emulator frame width at the requested scale
    pub fn frame_width(&self) -> u32 {
        NES_FRAME_WIDTH * self.scale_factor
    }

    /// Emulator frame height at the requested scale
    pub fn frame_height(&self) -> u32 {
        NES_FRAME_HEIGHT * self.scale_factor
    }

    /// Warm-up delay as a `Duration`
    pub fn warmup_delay(&self) -> Duration {
        Duration::from_secs_f64(self.warmup_seconds.max(0.0))
    }

    /// Recording length as a `Duration`
    pub fn recording_duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds.max(0.0))
    }

    /// Total wall-clock budget for the run: warm-up plus recording time
    /// (zero for screenshots) plus a fixed margin. The run is forcibly
    /// torn down once this is exceeded.
    pub fn time_budget(&self) -> Duration {
        let recording = match self.kind {
            CaptureKind::Screenshot => Duration::ZERO,
            CaptureKind::Video => self.recording_duration(),
        };
        self.warmup_delay() + recording + OUTER_TIMEOUT_MARGIN
    }

    /// Check the request against the invariants that must hold before any
    /// child process is spawned. Returns `InvalidInput` naming the
    /// offending value on violation.
    pub fn validate(&self) -> CaptureResult<()> {
        if !self.rom_path.is_file() {
            return Err(CaptureError::InvalidInput(format!(
                "ROM file not found: {}",
                self.rom_path.display()
            )));
        }

        let rom_ext = self
            .rom_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        if rom_ext.as_deref() != Some(ROM_EXTENSION) {
            return Err(CaptureError::InvalidInput(format!(
                "ROM file must have a .{} extension: {}",
                ROM_EXTENSION,
                self.rom_path.display()
            )));
        }

        if !self.warmup_seconds.is_finite() || self.warmup_seconds < 0.0 {
            return Err(CaptureError::InvalidInput(format!(
                "warm-up must be a non-negative number of seconds, got {}",
                self.warmup_seconds
            )));
        }

        if !(1..=4).contains(&self.scale_factor) {
            return Err(CaptureError::InvalidInput(format!(
                "scale factor must be between 1 and 4, got {}",
                self.scale_factor
            )));
        }

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(CaptureError::InvalidInput(format!(
                    "output directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        if self.kind == CaptureKind::Video {
            if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
                return Err(CaptureError::InvalidInput(format!(
                    "duration must be a positive number of seconds, got {}",
                    self.duration_seconds
                )));
            }

            if self.frame_rate == 0 {
                return Err(CaptureError::InvalidInput(
                    "frame rate must be a positive integer".to_string(),
                ));
            }

            if let Some(script) = &self.input_script_path {
                if !script.is_file() {
                    return Err(CaptureError::InvalidInput(format!(
                        "input script not found: {}",
                        script.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Result of a completed capture run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    /// Kind of capture performed
    pub kind: CaptureKind,
    /// Path of the produced file
    pub output_path: PathBuf,
    /// Image width in pixels (screenshots)
    pub width: Option<u32>,
    /// Image height in pixels (screenshots)
    pub height: Option<u32>,
    /// Size of the produced file in bytes
    pub size_bytes: u64,
    /// When the capture completed
    #[serde(with = "chrono::serde::ts_seconds")]
    pub completed_at: DateTime<Utc>,
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations.
///
/// Window-not-found and implausible geometry are deliberately absent:
/// both are non-fatal and degrade to a full-display capture with a warning.
#[derive(Debug)]
pub enum CaptureError {
    /// Bad or missing arguments, missing files, wrong extension.
    /// Raised before any child process is spawned.
    InvalidInput(String),

    /// A required external tool is not on PATH
    ToolNotFound(String),

    /// No free display number, or the display server died while starting
    DisplayUnavailable(String),

    /// A collaborator process failed to launch
    Spawn {
        /// The tool that failed to start
        tool: String,
        /// The underlying launch error
        source: std::io::Error,
    },

    /// The capture or encode step failed or produced no output file
    CaptureFailed(String),

    /// The run exceeded its overall time budget and was torn down
    Timeout(Duration),

    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CaptureError::ToolNotFound(tool) => {
                write!(f, "Required tool not found on PATH: {}", tool)
            }
            CaptureError::DisplayUnavailable(msg) => {
                write!(f, "Virtual display unavailable: {}", msg)
            }
            CaptureError::Spawn { tool, source } => {
                write!(f, "Failed to launch {}: {}", tool, source)
            }
            CaptureError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::Timeout(budget) => {
                write!(f, "Run exceeded its time budget of {:?}", budget)
            }
            CaptureError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Spawn { source, .. } => Some(source),
            CaptureError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::CaptureFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn rom_in(dir: &std::path::Path) -> PathBuf {
        let rom = dir.join("game.nes");
        fs::write(&rom, b"NES\x1a").unwrap();
        rom
    }

    #[test]
    fn test_validate_accepts_well_formed_screenshot_request() {
        let dir = tempfile::tempdir().unwrap();
        let request = CaptureRequest::screenshot(rom_in(dir.path()), dir.path().join("out.png"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_rom() {
        let dir = tempfile::tempdir().unwrap();
        let request =
            CaptureRequest::screenshot(dir.path().join("missing.nes"), dir.path().join("out.png"));
        assert!(matches!(
            request.validate(),
            Err(CaptureError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_rom_extension() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("game.bin");
        fs::write(&rom, b"NES\x1a").unwrap();
        let err = CaptureRequest::screenshot(&rom, dir.path().join("out.png"))
            .validate()
            .unwrap_err();
        match err {
            CaptureError::InvalidInput(msg) => assert!(msg.contains("game.bin")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_accepts_uppercase_rom_extension() {
        let dir = tempfile::tempdir().unwrap();
        let rom = dir.path().join("GAME.NES");
        fs::write(&rom, b"NES\x1a").unwrap();
        let request = CaptureRequest::screenshot(&rom, dir.path().join("out.png"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_input_script() {
        let dir = tempfile::tempdir().unwrap();
        let request = CaptureRequest::video(rom_in(dir.path()), dir.path().join("out.mp4"))
            .input_script(dir.path().join("missing.sh"));
        assert!(matches!(
            request.validate(),
            Err(CaptureError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let rom = rom_in(dir.path());

        let negative_wait =
            CaptureRequest::screenshot(&rom, dir.path().join("out.png")).warmup(-1.0);
        assert!(negative_wait.validate().is_err());

        let zero_duration = CaptureRequest::video(&rom, dir.path().join("out.mp4")).duration(0.0);
        assert!(zero_duration.validate().is_err());

        let bad_scale = CaptureRequest::screenshot(&rom, dir.path().join("out.png")).scale(5);
        assert!(bad_scale.validate().is_err());
    }

    #[test]
    fn test_scaled_frame_dimensions() {
        let request = CaptureRequest::screenshot("game.nes", "out.png").scale(2);
        assert_eq!(request.frame_width(), 512);
        assert_eq!(request.frame_height(), 480);
    }

    #[test]
    fn test_time_budget_includes_duration_for_video_only() {
        let screenshot = CaptureRequest::screenshot("game.nes", "out.png").warmup(1.0);
        let video = CaptureRequest::video("game.nes", "out.mp4")
            .warmup(1.0)
            .duration(10.0);
        assert_eq!(
            screenshot.time_budget(),
            Duration::from_secs(1) + OUTER_TIMEOUT_MARGIN
        );
        assert_eq!(
            video.time_budget(),
            Duration::from_secs(11) + OUTER_TIMEOUT_MARGIN
        );
    }
}
