//! Screenshot orchestration.
//!
//! Runs the emulator on a private virtual display, captures its window
//! (or the full display when discovery fails) with the external capture
//! tool, optionally crops to the visible game area, and reports the
//! produced image.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::types::{
    CaptureError, CaptureKind, CaptureOutcome, CaptureRequest, CaptureResult, NES_FRAME_WIDTH,
    NES_OVERSCAN_ROWS, NES_VISIBLE_HEIGHT,
};
use super::{launch_session, stage_for};
use crate::config;
use crate::session::{CaptureSession, ProcessGuard};
use crate::tools;

/// Capture a screenshot of the ROM named by `request`.
///
/// Validation happens before anything is spawned; after that, every
/// acquired process is torn down on every exit path.
pub fn capture_screenshot(request: &CaptureRequest) -> CaptureResult<CaptureOutcome> {
    request.validate()?;
    let emulator = config::emulator_binary();
    tools::preflight(&[
        tools::DISPLAY_SERVER,
        emulator.as_str(),
        tools::SCREENSHOT_TOOL,
        tools::WINDOW_TOOL,
    ])?;

    let budget = request.time_budget();
    let deadline = Instant::now() + budget;

    let mut session = launch_session(request, false)?;
    let outcome = grab(request, &mut session, deadline, budget);
    session.teardown();
    outcome
}

fn grab(
    request: &CaptureRequest,
    session: &mut CaptureSession,
    deadline: Instant,
    budget: Duration,
) -> CaptureResult<CaptureOutcome> {
    let staged = stage_for(&request.output_path)?;

    let target = match session.window {
        Some(window) => window.to_string(),
        None => "root".to_string(),
    };
    let mut command = Command::new(tools::SCREENSHOT_TOOL);
    command
        .env("DISPLAY", session.display().name())
        .arg("-silent")
        .arg("-window")
        .arg(&target)
        .arg(staged.path());

    let mut capture = ProcessGuard::spawn(tools::SCREENSHOT_TOOL, &mut command)?;
    let status = capture.wait_until(deadline, budget)?;
    if !status.success() {
        return Err(CaptureError::CaptureFailed(format!(
            "{} exited with {}",
            tools::SCREENSHOT_TOOL,
            status
        )));
    }
    if fs::metadata(staged.path()).map(|m| m.len()).unwrap_or(0) == 0 {
        return Err(CaptureError::CaptureFailed(
            "no image data was written".to_string(),
        ));
    }

    if request.crop_to_viewport {
        crop_to_viewport(staged.path(), request.scale_factor)?;
    }

    staged
        .persist(&request.output_path)
        .map_err(|err| CaptureError::Io(err.error))?;

    let (width, height) = image::image_dimensions(&request.output_path)?;
    let size_bytes = fs::metadata(&request.output_path)?.len();

    Ok(CaptureOutcome {
        kind: CaptureKind::Screenshot,
        output_path: request.output_path.clone(),
        width: Some(width),
        height: Some(height),
        size_bytes,
        completed_at: Utc::now(),
    })
}

/// The visible-game-area rectangle at a given scale, as (x, y, width,
/// height): full frame width, overscan rows trimmed from the top, visible
/// height only.
pub fn viewport_rect(scale: u32) -> (u32, u32, u32, u32) {
    (
        0,
        NES_OVERSCAN_ROWS * scale,
        NES_FRAME_WIDTH * scale,
        NES_VISIBLE_HEIGHT * scale,
    )
}

/// Crop the captured image in place to the visible game area. An image
/// smaller than the viewport (the emulator rendered something unexpected)
/// is left whole with a warning rather than failing the run.
fn crop_to_viewport(path: &Path, scale: u32) -> CaptureResult<()> {
    let image = image::open(path)?;
    let (x, y, width, height) = viewport_rect(scale);

    if image.width() < x + width || image.height() < y + height {
        eprintln!(
            "Warning: captured image is {}x{}, smaller than the {}x{} viewport; skipping crop",
            image.width(),
            image.height(),
            width,
            height
        );
        return Ok(());
    }

    image.crop_imm(x, y, width, height).save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    #[test]
    fn test_viewport_rect_at_scale_2() {
        assert_eq!(viewport_rect(2), (0, 16, 512, 448));
    }

    #[test]
    fn test_viewport_rect_at_scale_1() {
        assert_eq!(viewport_rect(1), (0, 8, 256, 224));
    }

    #[test]
    fn test_crop_to_viewport_trims_overscan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");

        // 512x480 frame: overscan rows red, visible area green
        let image: RgbImage = ImageBuffer::from_fn(512, 480, |_, y| {
            if y < 16 || y >= 464 {
                Rgb([255u8, 0, 0])
            } else {
                Rgb([0u8, 255, 0])
            }
        });
        image.save(&path).unwrap();

        crop_to_viewport(&path, 2).unwrap();

        let cropped = image::open(&path).unwrap().to_rgb8();
        assert_eq!(cropped.dimensions(), (512, 448));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([0u8, 255, 0]));
        assert_eq!(cropped.get_pixel(511, 447), &Rgb([0u8, 255, 0]));
    }

    #[test]
    fn test_crop_skips_undersized_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");

        let image: RgbImage = ImageBuffer::from_pixel(100, 100, Rgb([0u8, 0, 0]));
        image.save(&path).unwrap();

        crop_to_viewport(&path, 2).unwrap();

        // Left whole
        assert_eq!(image::image_dimensions(&path).unwrap(), (100, 100));
    }
}
