//! Emulator process launch.
//!
//! Builds the emulator invocation for a capture run: windowed at the
//! requested scale, sound disabled (there is no audio device on a virtual
//! display), pointed at the ROM under test.

use std::path::PathBuf;
use std::process::Command;

use crate::capture::types::CaptureResult;
use crate::config;
use crate::session::ProcessGuard;

/// Builder for the emulator invocation
#[derive(Debug, Clone)]
pub struct EmulatorCommand {
    binary: String,
    rom_path: PathBuf,
    scale_factor: u32,
}

impl EmulatorCommand {
    /// Create an emulator command for the given ROM, with the binary and
    /// scale taken from the configuration
    pub fn new(rom_path: impl Into<PathBuf>) -> Self {
        let config = config::get();
        Self {
            binary: config.emulator.binary.clone(),
            rom_path: rom_path.into(),
            scale_factor: config.defaults.scale_factor,
        }
    }

    /// Override the emulator binary
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the scale factor
    pub fn scale(mut self, factor: u32) -> Self {
        self.scale_factor = factor;
        self
    }

    /// Build the command line, bound to the given display
    pub fn build(&self, display: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .env("DISPLAY", display)
            .arg("--xscale")
            .arg(self.scale_factor.to_string())
            .arg("--yscale")
            .arg(self.scale_factor.to_string())
            .arg("--sound")
            .arg("0")
            .arg("--fullscreen")
            .arg("0")
            .arg(&self.rom_path);
        command
    }

    /// Launch the emulator on the given display
    pub fn launch(&self, display: &str) -> CaptureResult<ProcessGuard> {
        ProcessGuard::spawn(&self.binary, &mut self.build(display))
    }
}
