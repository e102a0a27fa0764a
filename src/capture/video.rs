//! Video orchestration and encoder settings.
//!
//! Records a fixed-duration clip of the emulator window with the external
//! encoder reading straight from the virtual display. Each recognized
//! output format gets its own encoder settings; an unrecognized extension
//! warns and records with the MP4 settings rather than failing.

use std::fmt;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::types::{CaptureError, CaptureKind, CaptureOutcome, CaptureRequest, CaptureResult};
use super::{launch_session, stage_for};
use crate::config;
use crate::input::run_input_script;
use crate::session::{CaptureSession, ProcessGuard};
use crate::tools;
use crate::window::{WindowGeometry, WindowQuery, Xdotool, resolve_capture_region};

/// Recognized video output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    /// H.264 in an MP4 container
    Mp4,
    /// VP9 in a WebM container
    Webm,
    /// Animated GIF
    Gif,
}

impl VideoFormat {
    /// Map a file extension to a format
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "mp4" => Some(VideoFormat::Mp4),
            "webm" => Some(VideoFormat::Webm),
            "gif" => Some(VideoFormat::Gif),
            _ => None,
        }
    }

    /// Pick the format for an output path. The second value reports
    /// whether the extension was recognized; unrecognized extensions get
    /// the MP4 settings and the caller warns.
    pub fn select(path: &Path) -> (Self, bool) {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
        {
            Some(format) => (format, true),
            None => (VideoFormat::Mp4, false),
        }
    }

    /// Encoder arguments appended after the screen-grab input
    pub fn encoder_args(&self) -> Vec<&'static str> {
        match self {
            // H.264 requires even dimensions
            VideoFormat::Mp4 => vec![
                "-vf",
                "crop=trunc(iw/2)*2:trunc(ih/2)*2",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "veryfast",
                "-crf",
                "18",
            ],
            VideoFormat::Webm => vec!["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "30"],
            VideoFormat::Gif => vec!["-vf", "fps=15,scale=iw:ih:flags=lanczos"],
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoFormat::Mp4 => write!(f, "mp4"),
            VideoFormat::Webm => write!(f, "webm"),
            VideoFormat::Gif => write!(f, "gif"),
        }
    }
}

/// Record a fixed-duration video of the ROM named by `request`.
///
/// Validation happens before anything is spawned; after that, every
/// acquired process is torn down on every exit path.
pub fn capture_video(request: &CaptureRequest) -> CaptureResult<CaptureOutcome> {
    request.validate()?;
    let emulator = config::emulator_binary();
    tools::preflight(&[
        tools::DISPLAY_SERVER,
        emulator.as_str(),
        tools::VIDEO_ENCODER,
        tools::WINDOW_TOOL,
    ])?;

    let (format, recognized) = VideoFormat::select(&request.output_path);
    if !recognized {
        eprintln!(
            "Warning: unrecognized video extension for {}, encoding with {} settings",
            request.output_path.display(),
            format
        );
    }

    let budget = request.time_budget();
    let deadline = Instant::now() + budget;

    let mut session = launch_session(request, true)?;
    let outcome = record(request, &mut session, format, deadline, budget);
    session.teardown();
    outcome
}

fn record(
    request: &CaptureRequest,
    session: &mut CaptureSession,
    format: VideoFormat,
    deadline: Instant,
    budget: Duration,
) -> CaptureResult<CaptureOutcome> {
    let display_name = session.display().name();
    let query = Xdotool::new(&display_name);

    if let Some(window) = session.window {
        if let Err(err) = query.activate(window) {
            eprintln!("Warning: could not activate window {}: {}", window, err);
        }
    }

    // Recording must not start until the scripted interaction is done
    if let Some(script) = &request.input_script_path {
        if session.window.is_some() {
            run_input_script(script, &display_name, session.window, deadline, budget)?;
        } else {
            eprintln!("Warning: skipping input script, no window to address");
        }
    }

    let region = resolve_capture_region(
        &query,
        session.window,
        session.display().width(),
        session.display().height(),
    );

    let staged = stage_for(&request.output_path)?;
    let mut command = record_command(
        &display_name,
        &region,
        request.frame_rate,
        request.duration_seconds,
        format,
        staged.path(),
    );

    let mut encoder = ProcessGuard::spawn(tools::VIDEO_ENCODER, &mut command)?;
    let status = encoder.wait_until(deadline, budget)?;
    if !status.success() {
        return Err(CaptureError::CaptureFailed(format!(
            "{} exited with {}",
            tools::VIDEO_ENCODER,
            status
        )));
    }
    if fs::metadata(staged.path()).map(|m| m.len()).unwrap_or(0) == 0 {
        return Err(CaptureError::CaptureFailed(
            "encoder produced no output".to_string(),
        ));
    }

    staged
        .persist(&request.output_path)
        .map_err(|err| CaptureError::Io(err.error))?;

    let size_bytes = fs::metadata(&request.output_path)?.len();

    Ok(CaptureOutcome {
        kind: CaptureKind::Video,
        output_path: request.output_path.clone(),
        width: None,
        height: None,
        size_bytes,
        completed_at: Utc::now(),
    })
}

/// Build the screen-grab invocation for one region of the display
fn record_command(
    display: &str,
    region: &WindowGeometry,
    frame_rate: u32,
    duration_seconds: f64,
    format: VideoFormat,
    output: &Path,
) -> Command {
    let mut command = Command::new(tools::VIDEO_ENCODER);
    command
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "x11grab"])
        .arg("-video_size")
        .arg(format!("{}x{}", region.width, region.height))
        .arg("-framerate")
        .arg(frame_rate.to_string())
        .arg("-i")
        .arg(format!("{}.0+{},{}", display, region.x, region.y))
        .arg("-t")
        .arg(duration_seconds.to_string())
        .args(format.encoder_args())
        .arg(output);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_of(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_select_recognizes_the_known_extensions() {
        assert_eq!(
            VideoFormat::select(Path::new("out.mp4")),
            (VideoFormat::Mp4, true)
        );
        assert_eq!(
            VideoFormat::select(Path::new("out.WEBM")),
            (VideoFormat::Webm, true)
        );
        assert_eq!(
            VideoFormat::select(Path::new("out.gif")),
            (VideoFormat::Gif, true)
        );
    }

    #[test]
    fn test_select_falls_back_to_mp4_settings() {
        assert_eq!(
            VideoFormat::select(Path::new("out.xyz")),
            (VideoFormat::Mp4, false)
        );
        assert_eq!(
            VideoFormat::select(Path::new("noextension")),
            (VideoFormat::Mp4, false)
        );
    }

    #[test]
    fn test_mp4_settings_force_even_dimensions() {
        let args = VideoFormat::Mp4.encoder_args();
        assert!(args.contains(&"libx264"));
        assert!(args.contains(&"crop=trunc(iw/2)*2:trunc(ih/2)*2"));
    }

    #[test]
    fn test_webm_and_gif_settings() {
        assert!(VideoFormat::Webm.encoder_args().contains(&"libvpx-vp9"));
        assert!(
            VideoFormat::Gif
                .encoder_args()
                .contains(&"fps=15,scale=iw:ih:flags=lanczos")
        );
    }

    #[test]
    fn test_record_command_grabs_the_region() {
        let region = WindowGeometry {
            x: 4,
            y: 20,
            width: 512,
            height: 480,
        };
        let command = record_command(
            ":91",
            &region,
            30,
            2.0,
            VideoFormat::Mp4,
            &PathBuf::from("out.mp4"),
        );
        let args = args_of(&command);

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], ":91.0+4,20");

        let size = args.iter().position(|a| a == "-video_size").unwrap();
        assert_eq!(args[size + 1], "512x480");

        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "2");

        let rate = args.iter().position(|a| a == "-framerate").unwrap();
        assert_eq!(args[rate + 1], "30");
    }
}
