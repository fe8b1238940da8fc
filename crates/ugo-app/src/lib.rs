//! Window and frame loop for ugo-vk.
//!
//! This crate handles:
//! - Window creation and the winit event loop
//! - GPU bootstrap through `ugo-gpu`
//! - The single-frame-in-flight render loop
//! - Log subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use ugo_app::{logging, run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let dispatch = logging::build_dispatch();
//!     tracing::dispatcher::with_default(&dispatch, || run_app(AppConfig::default()))
//! }
//! ```

pub mod config;
pub mod frame;
pub mod logging;
pub mod renderer;
mod runner;

pub use config::{AppConfig, ShaderPaths};
pub use frame::{render_complete_semaphores, FrameResources, FrameStats, PerImage};
pub use renderer::Renderer;
pub use runner::run_app;
