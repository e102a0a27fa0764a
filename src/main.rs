use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use nes_capture::capture::{
    CaptureKind, CaptureOutcome, CaptureRequest, capture_screenshot, capture_video,
};
use nes_capture::config;

/// nes-capture - Headless NES emulator capture
#[derive(Parser, Debug)]
#[command(
    name = "nes-capture",
    about = "Headless NES emulator capture: screenshots and video clips for docs and CI",
    after_help = "ENVIRONMENT VARIABLES:\n\
        NES_CAPTURE_EMULATOR          Emulator binary (default: fceux)\n\
        NES_CAPTURE_EMULATOR_TITLE    Window title substring to search for\n\
        NES_CAPTURE_WM                Window manager binary for video capture\n\
        NES_CAPTURE_DISPLAY_BASE      First virtual display number to probe\n\
        NES_CAPTURE_DEFAULT_WAIT      Default warm-up before capture (seconds)\n\
        NES_CAPTURE_DEFAULT_DURATION  Default video duration (seconds)\n\
        NES_CAPTURE_DEFAULT_FPS       Default video frame rate\n\
        NES_CAPTURE_DEFAULT_SCALE     Default emulator scale factor"
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture a single screenshot of a ROM running in the emulator
    Screenshot {
        /// Path to the ROM to run
        #[arg(value_name = "ROM")]
        rom: PathBuf,

        /// Output image path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Warm-up before the capture, in seconds
        #[arg(long, env = "NES_CAPTURE_DEFAULT_WAIT", default_value_t = config::DEFAULT_WAIT_SECONDS)]
        wait: f64,

        /// Emulator scale factor
        #[arg(
            long,
            env = "NES_CAPTURE_DEFAULT_SCALE",
            default_value_t = config::DEFAULT_SCALE_FACTOR,
            value_parser = clap::value_parser!(u32).range(1..=4)
        )]
        scale: u32,

        /// Crop to the visible game area (overscan removed)
        #[arg(long)]
        crop: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a fixed-duration video of a ROM running in the emulator
    Video {
        /// Path to the ROM to run
        #[arg(value_name = "ROM")]
        rom: PathBuf,

        /// Output video path (.mp4, .webm, or .gif)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Warm-up before recording starts, in seconds
        #[arg(long, env = "NES_CAPTURE_DEFAULT_WAIT", default_value_t = config::DEFAULT_WAIT_SECONDS)]
        wait: f64,

        /// Recording length in seconds
        #[arg(long, env = "NES_CAPTURE_DEFAULT_DURATION", default_value_t = config::DEFAULT_DURATION_SECONDS)]
        duration: f64,

        /// Recording frame rate
        #[arg(
            long,
            env = "NES_CAPTURE_DEFAULT_FPS",
            default_value_t = config::DEFAULT_FRAME_RATE,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        fps: u32,

        /// Emulator scale factor
        #[arg(
            long,
            env = "NES_CAPTURE_DEFAULT_SCALE",
            default_value_t = config::DEFAULT_SCALE_FACTOR,
            value_parser = clap::value_parser!(u32).range(1..=4)
        )]
        scale: u32,

        /// Script run against the emulator window before recording starts
        #[arg(long, value_name = "SCRIPT")]
        input: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::from(1),
            };
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Commands::Screenshot {
            rom,
            output,
            wait,
            scale,
            crop,
            json,
        } => {
            let request = CaptureRequest::screenshot(rom, output)
                .warmup(wait)
                .scale(scale)
                .crop(crop);
            let outcome = capture_screenshot(&request)?;
            report(&outcome, json)?;
        }

        Commands::Video {
            rom,
            output,
            wait,
            duration,
            fps,
            scale,
            input,
            json,
        } => {
            let mut request = CaptureRequest::video(rom, output)
                .warmup(wait)
                .duration(duration)
                .fps(fps)
                .scale(scale);
            if let Some(script) = input {
                request = request.input_script(script);
            }
            let outcome = capture_video(&request)?;
            report(&outcome, json)?;
        }
    }

    Ok(())
}

fn report(outcome: &CaptureOutcome, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome.kind {
        CaptureKind::Screenshot => {
            println!("Captured screenshot: {}", outcome.output_path.display());
            if let (Some(width), Some(height)) = (outcome.width, outcome.height) {
                println!("  Size: {}x{}", width, height);
            }
        }
        CaptureKind::Video => {
            println!("Captured video: {}", outcome.output_path.display());
            println!("  File size: {} bytes", outcome.size_bytes);
        }
    }

    Ok(())
}
