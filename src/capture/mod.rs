pub mod screenshot;
pub mod types;
pub mod video;

pub use screenshot::{capture_screenshot, viewport_rect};
pub use types::{
    CaptureError, CaptureKind, CaptureOutcome, CaptureRequest, CaptureResult, NES_FRAME_HEIGHT,
    NES_FRAME_WIDTH, NES_OVERSCAN_ROWS, NES_VISIBLE_HEIGHT, OUTER_TIMEOUT_MARGIN, ROM_EXTENSION,
};
pub use video::{VideoFormat, capture_video};

use std::path::Path;
use std::process::Command;
use std::thread;

use tempfile::NamedTempFile;

use crate::config;
use crate::display::VirtualDisplay;
use crate::emulator::EmulatorCommand;
use crate::session::{CaptureSession, ProcessGuard};
use crate::tools;
use crate::window::{DISCOVERY_ATTEMPTS, DISCOVERY_BACKOFF, Xdotool, discover_window};

/// Bring up the shared part of a capture run: acquire a display sized to
/// the scaled emulator frame, optionally start a window manager, launch
/// the emulator, wait out the warm-up, and discover the emulator window.
///
/// The returned session owns every spawned process; dropping it on any
/// later error path tears everything down.
pub(crate) fn launch_session(
    request: &CaptureRequest,
    with_window_manager: bool,
) -> CaptureResult<CaptureSession> {
    let display = VirtualDisplay::acquire(request.frame_width(), request.frame_height())?;
    let mut session = CaptureSession::new(display);
    let display_name = session.display().name();

    if with_window_manager {
        let wm = config::window_manager_binary();
        if tools::available(&wm) {
            let mut command = Command::new(&wm);
            command.env("DISPLAY", &display_name);
            match ProcessGuard::spawn(&wm, &mut command) {
                Ok(guard) => session.window_manager = Some(guard),
                Err(err) => {
                    eprintln!("Warning: {}; continuing without a window manager", err)
                }
            }
        } else {
            eprintln!(
                "Warning: window manager '{}' not found, input focus may be unreliable",
                wm
            );
        }
    }

    let emulator = EmulatorCommand::new(&request.rom_path).scale(request.scale_factor);
    session.emulator = Some(emulator.launch(&display_name)?);

    // No readiness protocol exists for the emulator; the warm-up delay is
    // the only way to let the ROM reach a capturable state.
    thread::sleep(request.warmup_delay());

    let query = Xdotool::new(&display_name);
    session.window = discover_window(
        &query,
        &config::emulator_window_title(),
        DISCOVERY_ATTEMPTS,
        DISCOVERY_BACKOFF,
    );

    Ok(session)
}

/// Create a staging file next to the requested output, carrying the same
/// extension so format-sniffing tools treat it identically. The final
/// output appears only via an atomic rename; an abandoned staging file is
/// removed on drop, so no partial file is ever left at the output path.
pub(crate) fn stage_for(output: &Path) -> CaptureResult<NamedTempFile> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "capture".to_string());
    let extension = output
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "png".to_string());

    tempfile::Builder::new()
        .prefix(&format!(".{}.", stem))
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)
        .map_err(CaptureError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_for_keeps_the_extension_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clip.mp4");
        let staged = stage_for(&output).unwrap();
        assert_eq!(staged.path().parent(), Some(dir.path()));
        assert_eq!(
            staged.path().extension().and_then(|e| e.to_str()),
            Some("mp4")
        );
    }

    #[test]
    fn test_stage_for_is_dropped_without_a_trace() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage_for(&dir.path().join("out.png")).unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }
}
