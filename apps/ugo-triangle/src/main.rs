//! ugo-vk triangle demo
//!
//! Opens a window, clears it every frame and draws a hardcoded triangle.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p ugo-triangle -- [OPTIONS]
//! ```
//!
//! The triangle shaders are compiled by the `ugo-shaders` build script;
//! `--shader-dir` loads replacements from another directory.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod args;

use std::process::ExitCode;

use ugo_app::{logging, run_app};

use crate::args::Command;

fn main() -> ExitCode {
    let dispatch = logging::build_dispatch();
    tracing::dispatcher::with_default(&dispatch, run)
}

fn run() -> ExitCode {
    let config = match args::parse(std::env::args().skip(1)) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            tracing::error!("{e:#}");
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match run_app(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        "ugo-vk triangle demo

USAGE:
    cargo run -p ugo-triangle -- [OPTIONS]

OPTIONS:
    --validation            Enable Vulkan validation layers (default in debug builds)
    --no-validation         Disable Vulkan validation layers
    --clear-only            Skip the triangle, only clear the window
    --shader-dir <DIR>      Directory holding tri.vert.spv and tri.frag.spv
                            Default: the ugo-shaders build output
    --size <W>x<H>          Window size (default: 1080x720)
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
