//! External collaborator lookup.
//!
//! Every hard piece of work here is delegated to an external binary; this
//! module names them and checks they exist on PATH before anything is
//! spawned, so a missing tool fails the run up front with a clear message.

use crate::capture::types::{CaptureError, CaptureResult};

/// Virtual display server
pub const DISPLAY_SERVER: &str = "Xvfb";

/// Window query / activation tool
pub const WINDOW_TOOL: &str = "xdotool";

/// Still-image capture tool (ImageMagick)
pub const SCREENSHOT_TOOL: &str = "import";

/// Screen recorder / encoder
pub const VIDEO_ENCODER: &str = "ffmpeg";

/// Whether a tool can be found on PATH
pub fn available(tool: &str) -> bool {
    which::which(tool).is_ok()
}

/// Check that every named tool is on PATH, failing with `ToolNotFound`
/// for the first one that is missing
pub fn preflight(required: &[&str]) -> CaptureResult<()> {
    for tool in required {
        if !available(tool) {
            return Err(CaptureError::ToolNotFound((*tool).to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_available_finds_the_shell() {
        assert!(available("sh"));
    }

    #[test]
    fn test_preflight_names_the_missing_tool() {
        let err = preflight(&["definitely-not-a-real-tool-9f2c"]).unwrap_err();
        match err {
            CaptureError::ToolNotFound(tool) => {
                assert_eq!(tool, "definitely-not-a-real-tool-9f2c")
            }
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_preflight_empty_list_passes() {
        assert!(preflight(&[]).is_ok());
    }
}
