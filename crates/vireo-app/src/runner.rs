//! Application runner and event loop.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vireo_gpu::{GpuError, RendererConfig, VulkanTarget};
use vireo_platform::{PlatformError, PlatformWindow, WindowConfig, WindowInput};
use vireo_ui::{FrameStart, LayerConfig, UiLayer, WindowSource};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::UiApp;

/// Application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Window settings.
    pub window: WindowConfig,
    /// GPU settings.
    pub renderer: RendererConfig,
    /// UI layer settings.
    pub layer: LayerConfig,
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            window: WindowConfig {
                title: title.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Replace the renderer configuration.
    #[must_use]
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the layer configuration.
    #[must_use]
    pub fn with_layer(mut self, layer: LayerConfig) -> Self {
        self.layer = layer;
        self
    }
}

/// Run a [`UiApp`] with the given configuration.
///
/// Initializes logging, creates the window and the UI layer, and runs the
/// event loop until the window is closed.
pub fn run_app<A: UiApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("{} starting...", config.window.title);

    let event_loop = EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        failure: None,
    };

    event_loop
        .run_app(&mut runner)
        .map_err(|e| PlatformError::EventLoop(e.to_string()))?;

    match runner.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: UiApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    failure: Option<anyhow::Error>,
}

struct AppState<A: UiApp> {
    layer: UiLayer<VulkanTarget, A::Ui, PlatformWindow>,
    app: A,
}

impl<A: UiApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        if let Some(ui) = state.layer.ui_mut() {
            ui.handle_window_event(&event);
        }
        let mut layer_event = vireo_platform::layer_event(&event);
        state.layer.on_event(&mut layer_event);
        if !layer_event.handled && state.app.on_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = state.frame() {
                    error!("Frame failed: {e:#}");
                    if let Some(mut state) = self.state.take() {
                        state.shutdown();
                    }
                    self.failure = Some(e);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.layer.window().window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            info!("Event loop exiting");
            state.shutdown();
        }
    }
}

impl<A: UiApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window = PlatformWindow::create(event_loop, &self.config.window)?;
        let mut layer = UiLayer::new(window, self.config.layer.clone());

        let renderer = &self.config.renderer;
        let mut app = None;
        layer.attach(
            |window| {
                let (width, height) = window.drawable_size();
                VulkanTarget::new(renderer, window, width, height)
            },
            |target| {
                info!("GPU: {}", target.device().device_name());
                let (created, ui) =
                    A::init(target).map_err(|e| GpuError::Other(format!("{e:#}")))?;
                app = Some(created);
                Ok(ui)
            },
        )?;

        let app = app.ok_or_else(|| anyhow::anyhow!("application was not initialized"))?;
        Ok(AppState { layer, app })
    }
}

impl<A: UiApp> AppState<A> {
    fn frame(&mut self) -> anyhow::Result<()> {
        if self.layer.begin_frame()? == FrameStart::Active {
            if let Some(ui) = self.layer.ui_mut() {
                self.app.draw(ui);
            }
        }
        self.layer.end_frame()?;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.app.cleanup();
        if let Err(e) = self.layer.detach() {
            error!("Detach failed: {e}");
        }
    }
}
