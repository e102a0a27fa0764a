//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for nes-capture, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults matching a stock fceux + Xvfb installation
//! - Cached global access via `config::get()`
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `NES_CAPTURE_EMULATOR` | Emulator binary name or path | `fceux` |
//! | `NES_CAPTURE_EMULATOR_TITLE` | Window title substring to search for | `fceux` |
//! | `NES_CAPTURE_WM` | Window manager binary (video mode) | `openbox` |
//! | `NES_CAPTURE_DISPLAY_BASE` | First virtual display number to probe | `90` |
//! | `NES_CAPTURE_DISPLAY_ATTEMPTS` | How many display numbers to probe | `20` |
//! | `NES_CAPTURE_DEFAULT_WAIT` | Default warm-up before capture (seconds) | `3` |
//! | `NES_CAPTURE_DEFAULT_DURATION` | Default video duration (seconds) | `10` |
//! | `NES_CAPTURE_DEFAULT_FPS` | Default video frame rate | `60` |
//! | `NES_CAPTURE_DEFAULT_SCALE` | Default emulator scale factor | `2` |
//!
//! # Example
//!
//! ```bash
//! # Use a different emulator build
//! export NES_CAPTURE_EMULATOR="/opt/fceux/bin/fceux"
//!
//! # Probe displays starting at :200 (e.g. to avoid a busy CI range)
//! export NES_CAPTURE_DISPLAY_BASE="200"
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default emulator binary
pub const DEFAULT_EMULATOR_BIN: &str = "fceux";

/// Default substring to match against emulator window titles
pub const DEFAULT_EMULATOR_TITLE: &str = "fceux";

/// Default window manager binary (only launched for video capture)
pub const DEFAULT_WINDOW_MANAGER_BIN: &str = "openbox";

/// Default first display number to probe when allocating a virtual display
pub const DEFAULT_DISPLAY_BASE: u32 = 90;

/// Default number of display numbers to probe before giving up
pub const DEFAULT_DISPLAY_ATTEMPTS: u32 = 20;

/// Default warm-up delay before capture (seconds)
pub const DEFAULT_WAIT_SECONDS: f64 = 3.0;

/// Default video duration (seconds)
pub const DEFAULT_DURATION_SECONDS: f64 = 10.0;

/// Default video frame rate
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Default emulator scale factor
pub const DEFAULT_SCALE_FACTOR: u32 = 2;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the emulator binary
pub const ENV_EMULATOR_BIN: &str = "NES_CAPTURE_EMULATOR";

/// Environment variable for the emulator window title substring
pub const ENV_EMULATOR_TITLE: &str = "NES_CAPTURE_EMULATOR_TITLE";

/// Environment variable for the window manager binary
pub const ENV_WINDOW_MANAGER_BIN: &str = "NES_CAPTURE_WM";

/// Environment variable for the first display number to probe
pub const ENV_DISPLAY_BASE: &str = "NES_CAPTURE_DISPLAY_BASE";

/// Environment variable for the number of display numbers to probe
pub const ENV_DISPLAY_ATTEMPTS: &str = "NES_CAPTURE_DISPLAY_ATTEMPTS";

/// Environment variable for the default warm-up delay
pub const ENV_DEFAULT_WAIT: &str = "NES_CAPTURE_DEFAULT_WAIT";

/// Environment variable for the default video duration
pub const ENV_DEFAULT_DURATION: &str = "NES_CAPTURE_DEFAULT_DURATION";

/// Environment variable for the default frame rate
pub const ENV_DEFAULT_FPS: &str = "NES_CAPTURE_DEFAULT_FPS";

/// Environment variable for the default scale factor
pub const ENV_DEFAULT_SCALE: &str = "NES_CAPTURE_DEFAULT_SCALE";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for nes-capture
#[derive(Debug, Clone)]
pub struct Config {
    /// Emulator configuration
    pub emulator: EmulatorSettings,
    /// Virtual display configuration
    pub display: DisplaySettings,
    /// Default values for CLI arguments
    pub defaults: DefaultSettings,
}

/// Emulator-related settings
#[derive(Debug, Clone)]
pub struct EmulatorSettings {
    /// Binary name or path
    pub binary: String,
    /// Substring matched against window titles during discovery
    pub window_title: String,
}

/// Virtual-display-related settings
#[derive(Debug, Clone)]
pub struct DisplaySettings {
    /// First display number to probe
    pub base: u32,
    /// Number of display numbers to probe
    pub attempts: u32,
    /// Window manager binary, launched for video capture
    pub window_manager: String,
}

/// Default values for CLI arguments
#[derive(Debug, Clone)]
pub struct DefaultSettings {
    /// Default warm-up delay (seconds)
    pub wait_seconds: f64,
    /// Default video duration (seconds)
    pub duration_seconds: f64,
    /// Default video frame rate
    pub frame_rate: u32,
    /// Default scale factor
    pub scale_factor: u32,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            emulator: EmulatorSettings::from_env(),
            display: DisplaySettings::from_env(),
            defaults: DefaultSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            emulator: EmulatorSettings::defaults(),
            display: DisplaySettings::defaults(),
            defaults: DefaultSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl EmulatorSettings {
    /// Create emulator settings from environment variables
    pub fn from_env() -> Self {
        Self {
            binary: env::var(ENV_EMULATOR_BIN)
                .unwrap_or_else(|_| DEFAULT_EMULATOR_BIN.to_string()),
            window_title: env::var(ENV_EMULATOR_TITLE)
                .unwrap_or_else(|_| DEFAULT_EMULATOR_TITLE.to_string()),
        }
    }

    /// Create emulator settings with defaults
    pub fn defaults() -> Self {
        Self {
            binary: DEFAULT_EMULATOR_BIN.to_string(),
            window_title: DEFAULT_EMULATOR_TITLE.to_string(),
        }
    }
}

impl DisplaySettings {
    /// Create display settings from environment variables
    pub fn from_env() -> Self {
        Self {
            base: env::var(ENV_DISPLAY_BASE)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DISPLAY_BASE),
            attempts: env::var(ENV_DISPLAY_ATTEMPTS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DISPLAY_ATTEMPTS),
            window_manager: env::var(ENV_WINDOW_MANAGER_BIN)
                .unwrap_or_else(|_| DEFAULT_WINDOW_MANAGER_BIN.to_string()),
        }
    }

    /// Create display settings with defaults
    pub fn defaults() -> Self {
        Self {
            base: DEFAULT_DISPLAY_BASE,
            attempts: DEFAULT_DISPLAY_ATTEMPTS,
            window_manager: DEFAULT_WINDOW_MANAGER_BIN.to_string(),
        }
    }
}

impl DefaultSettings {
    /// Create default settings from environment variables
    pub fn from_env() -> Self {
        Self {
            wait_seconds: env::var(ENV_DEFAULT_WAIT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WAIT_SECONDS),
            duration_seconds: env::var(ENV_DEFAULT_DURATION)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DURATION_SECONDS),
            frame_rate: env::var(ENV_DEFAULT_FPS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FRAME_RATE),
            scale_factor: env::var(ENV_DEFAULT_SCALE)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SCALE_FACTOR),
        }
    }

    /// Create default settings with hardcoded defaults
    pub fn defaults() -> Self {
        Self {
            wait_seconds: DEFAULT_WAIT_SECONDS,
            duration_seconds: DEFAULT_DURATION_SECONDS,
            frame_rate: DEFAULT_FRAME_RATE,
            scale_factor: DEFAULT_SCALE_FACTOR,
        }
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Get the emulator binary (convenience function)
pub fn emulator_binary() -> String {
    get().emulator.binary.clone()
}

/// Get the emulator window title substring (convenience function)
pub fn emulator_window_title() -> String {
    get().emulator.window_title.clone()
}

/// Get the window manager binary (convenience function)
pub fn window_manager_binary() -> String {
    get().display.window_manager.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.emulator.binary, DEFAULT_EMULATOR_BIN);
        assert_eq!(config.emulator.window_title, DEFAULT_EMULATOR_TITLE);
        assert_eq!(config.display.base, DEFAULT_DISPLAY_BASE);
        assert_eq!(config.display.attempts, DEFAULT_DISPLAY_ATTEMPTS);
    }

    #[test]
    fn test_default_settings_values() {
        let defaults = DefaultSettings::defaults();
        assert_eq!(defaults.wait_seconds, 3.0);
        assert_eq!(defaults.duration_seconds, 10.0);
        assert_eq!(defaults.frame_rate, 60);
        assert_eq!(defaults.scale_factor, 2);
    }
}
