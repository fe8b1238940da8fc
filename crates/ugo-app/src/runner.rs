//! Application runner and event loop.

use anyhow::Context;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::renderer::Renderer;

/// Open the window and render until it is closed.
///
/// Returns the first fatal error; bootstrap and frame failures both stop the
/// event loop. GPU resources are released before this returns.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    info!("{} starting...", config.title);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        state: None,
        error: None,
    };

    event_loop
        .run_app(&mut runner)
        .context("Event loop error")?;

    // Normally released on close; covers loops that end without a close request.
    if let Some(state) = runner.state.take() {
        state.shutdown();
    }

    match runner.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner {
    config: AppConfig,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

/// Live window and renderer.
struct AppState {
    // Dropped before the window it renders into.
    renderer: Renderer,
    window: Window,
}

impl AppState {
    fn shutdown(self) {
        info!("Starting cleanup...");
        if let Err(e) = self.renderer.shutdown() {
            error!("Failed to wait idle: {e}");
        }
        drop(self.renderer);
        drop(self.window);
        info!("Cleanup complete");
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);

        let window = event_loop
            .create_window(window_attrs)
            .context("Failed to create window")?;

        // SAFETY: AppState drops the renderer before the window.
        let renderer = unsafe { Renderer::new(&window, self.config.clone())? };

        Ok(AppState { renderer, window })
    }

    /// Record the first fatal error and stop the loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        if self.error.is_none() {
            self.error = Some(e);
        }
        if let Some(state) = self.state.take() {
            state.shutdown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize application")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(state) = self.state.take() {
                    state.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match state.renderer.draw_frame() {
                    Ok(()) => state.window.request_redraw(),
                    Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("Render error")),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
