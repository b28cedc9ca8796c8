//! som-explorer: interactive self-organizing map dashboard.
//!
//! Window, surface and event plumbing around [`Dashboard::render_frame`].
//! Uses vello/wgpu for rendering and a tokio runtime for the training worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use vello::kurbo::Point;
use vello::util::{RenderContext, RenderSurface};
use vello::{AaConfig, Renderer, RendererOptions, Scene};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window};

use vello::wgpu;

use som_explorer::dashboard::{Dashboard, DashboardState, ModelConfig};
use som_explorer::input::FrameInput;
use som_explorer::inspector::{HoverDisplay, ImageShape};
use som_explorer::logging;
use som_explorer::model::{Dataset, DemoDataset, InMemoryDataset, Model, Som};
use som_explorer::text::{TextStyle, load_ui_font};
use som_explorer::theme::Theme;
use som_explorer::theme_watcher::{ThemeWatcher, load_theme};
use som_explorer::training::TrainingCoordinator;

/// Vector length of the map when started without a dataset.
const DEFAULT_VECTOR_LEN: usize = 3;
/// Pixels per wheel line for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f64 = 20.0;

/// Interactive self-organizing map explorer
#[derive(Parser, Debug)]
#[command(name = "som-explorer", version, about = "Interactive self-organizing map explorer")]
struct Args {
    /// Map width in cells
    #[arg(long, default_value_t = 20)]
    grid_width: usize,

    /// Map height in cells
    #[arg(long, default_value_t = 15)]
    grid_height: usize,

    /// Seed for map initialisation, demo data and row shuffling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Generated dataset to start with
    #[arg(long, value_enum, default_value_t = DemoDataset::Colors)]
    dataset: DemoDataset,

    /// Number of rows in the generated dataset
    #[arg(long, default_value_t = 500)]
    rows: usize,

    /// Start in windowed mode instead of fullscreen
    #[arg(short, long)]
    windowed: bool,

    /// TOML theme file, reloaded when it changes
    #[arg(long)]
    theme: Option<PathBuf>,
}

#[derive(Debug)]
enum RenderState {
    Active {
        surface: Box<RenderSurface<'static>>,
        valid_surface: bool,
        window: Arc<Window>,
    },
    Suspended(Option<Arc<Window>>),
}

struct App {
    context: RenderContext,
    renderers: Vec<Option<Renderer>>,
    state: RenderState,
    scene: Scene,
    windowed: bool,
    dashboard: Dashboard,
    model: Arc<dyn Model>,
    dataset: Option<InMemoryDataset>,
    input: FrameInput,
    theme_watcher: Option<ThemeWatcher>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let RenderState::Suspended(cached_window) = &mut self.state else {
            return;
        };

        let window = match cached_window.take() {
            Some(window) => window,
            None => match create_window(event_loop, self.windowed) {
                Ok(window) => window,
                Err(e) => {
                    error!("Creating window: {:#}", e);
                    event_loop.exit();
                    return;
                }
            },
        };

        let size = window.inner_size();
        let surface_future = self.context.create_surface(
            window.clone(),
            size.width,
            size.height,
            wgpu::PresentMode::AutoVsync,
        );
        let surface = match pollster::block_on(surface_future) {
            Ok(surface) => surface,
            Err(e) => {
                error!("Creating surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        self.renderers
            .resize_with(self.context.devices.len(), || None);
        if self.renderers[surface.dev_id].is_none() {
            match create_renderer(&self.context, &surface) {
                Ok(renderer) => self.renderers[surface.dev_id] = Some(renderer),
                Err(e) => {
                    error!("Creating renderer: {:#}", e);
                    event_loop.exit();
                    return;
                }
            }
        }

        self.state = RenderState::Active {
            surface: Box::new(surface),
            valid_surface: true,
            window,
        };
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let RenderState::Active { window, .. } = &self.state {
            self.state = RenderState::Suspended(Some(window.clone()));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let (surface, valid_surface, window) = match &mut self.state {
            RenderState::Active {
                surface,
                valid_surface,
                window,
            } if window.id() == window_id => (surface, valid_surface, window.clone()),
            _ => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::CursorMoved { position, .. } => {
                self.input.pointer_moved(Point::new(position.x, position.y));
            }

            WindowEvent::CursorLeft { .. } => self.input.pointer_left(),

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.input.button(state == ElementState::Pressed),

            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(y),
                    MouseScrollDelta::PixelDelta(pos) => pos.y / PIXELS_PER_LINE,
                };
                self.input.scrolled(lines);
            }

            WindowEvent::Resized(size) => {
                if size.width != 0 && size.height != 0 {
                    self.context
                        .resize_surface(surface, size.width, size.height);
                    *valid_surface = true;
                } else {
                    *valid_surface = false;
                }
            }

            WindowEvent::RedrawRequested => {
                if !*valid_surface {
                    return;
                }

                if let Some(theme) = self.theme_watcher.as_ref().and_then(ThemeWatcher::poll) {
                    self.dashboard.set_theme(theme);
                }

                self.scene.reset();
                self.dashboard.render_frame(
                    &mut self.scene,
                    f64::from(surface.config.width),
                    f64::from(surface.config.height),
                    &self.input,
                    &mut self.model,
                    self.dataset.as_mut().map(|d| d as &mut dyn Dataset),
                );
                self.input.end_frame();

                let device_handle = &self.context.devices[surface.dev_id];
                let Some(renderer) = self.renderers[surface.dev_id].as_mut() else {
                    return;
                };
                let rendered = renderer.render_to_texture(
                    &device_handle.device,
                    &device_handle.queue,
                    &self.scene,
                    &surface.target_view,
                    &vello::RenderParams {
                        base_color: self.dashboard.theme().background(),
                        width: surface.config.width,
                        height: surface.config.height,
                        antialiasing_method: AaConfig::Msaa16,
                    },
                );
                if let Err(e) = rendered {
                    error!("Render failed: {}", e);
                    return;
                }

                let surface_texture = match surface.surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(e) => {
                        warn!("Surface texture unavailable: {}", e);
                        window.request_redraw();
                        return;
                    }
                };

                let mut encoder =
                    device_handle
                        .device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("Surface Blit"),
                        });
                surface.blitter.copy(
                    &device_handle.device,
                    &mut encoder,
                    &surface.target_view,
                    &surface_texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default()),
                );
                device_handle.queue.submit([encoder.finish()]);
                surface_texture.present();
                if let Err(e) = device_handle.device.poll(wgpu::PollType::Poll) {
                    warn!("Device poll failed: {}", e);
                }

                // Continuous redraw keeps training progress visible.
                window.request_redraw();
            }

            _ => {}
        }
    }
}

fn initial_theme(path: Option<&PathBuf>) -> Theme {
    let Some(path) = path else {
        return Theme::default();
    };
    load_theme(path).unwrap_or_else(|e| {
        warn!("Using default theme: {:#}", e);
        Theme::default()
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    let dataset = args.dataset.generate(args.rows, args.seed);
    let features = dataset
        .as_ref()
        .map_or(DEFAULT_VECTOR_LEN, |d| d.feature_count());

    let config = ModelConfig::new(args.grid_width, args.grid_height, args.seed);
    let model: Arc<dyn Model> =
        Arc::new(Som::new(config.width, config.height, features, args.seed));
    let mut state = DashboardState::new(config, features);
    if let Some((width, height)) = args.dataset.image_shape() {
        state.hover.shape = ImageShape { width, height };
        state.hover.display = HoverDisplay::Image;
    }

    let theme = initial_theme(args.theme.as_ref());
    let theme_watcher = args.theme.clone().and_then(|path| {
        ThemeWatcher::start(path)
            .map_err(|e| warn!("Theme hot-reload disabled: {:#}", e))
            .ok()
    });

    let font = load_ui_font();
    if font.is_none() {
        info!("No system font found; using bitmap text");
    }

    info!(
        width = model.width(),
        height = model.height(),
        features,
        rows = dataset.as_ref().map_or(0, |d| d.row_count()),
        "som-explorer v{}",
        env!("CARGO_PKG_VERSION")
    );

    let dashboard = Dashboard::new(
        TrainingCoordinator::new(runtime.handle().clone()),
        state,
        theme,
        TextStyle::new(font),
    );

    let mut app = App {
        context: RenderContext::new(),
        renderers: vec![],
        state: RenderState::Suspended(None),
        scene: Scene::new(),
        windowed: args.windowed,
        dashboard,
        model,
        dataset,
        input: FrameInput::default(),
        theme_watcher,
    };

    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;

    // Dropping the dashboard waits for an in-flight training run.
    drop(app);
    runtime.shutdown_timeout(Duration::from_secs(1));

    Ok(())
}

fn create_window(event_loop: &ActiveEventLoop, windowed: bool) -> Result<Arc<Window>> {
    let mut attr = Window::default_attributes().with_title("som-explorer");

    if !windowed {
        attr = attr.with_fullscreen(Some(Fullscreen::Borderless(None)));
    } else {
        attr = attr.with_inner_size(winit::dpi::LogicalSize::new(1600, 1000));
    }

    Ok(Arc::new(event_loop.create_window(attr)?))
}

fn create_renderer(render_cx: &RenderContext, surface: &RenderSurface<'_>) -> Result<Renderer> {
    Renderer::new(
        &render_cx.devices[surface.dev_id].device,
        RendererOptions::default(),
    )
    .context("creating renderer")
}
