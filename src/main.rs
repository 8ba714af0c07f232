mod cli;

use anyhow::{Context, Result};
use cli::Cli;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use vrplayer_config::{ConfigStore, StereoPackingMode};
use vrplayer_display::{DisplayPlacement, OutputWatcher, PlacementDecision};
use vrplayer_input::{KeyboardHandler, ViewAction};
use vrplayer_playback::mpv::MpvEngine;
use vrplayer_playback::{EngineCallbacks, EngineEvent, EngineOptions, PlaybackEngine, Property};
use vrplayer_renderer::{FrameInputs, GraphicsContext, ViewportState};
use vrplayer_tracking::HeadTracker;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

/// Wakeups posted from playback engine threads.
#[derive(Debug, Clone, Copy)]
enum UserEvent {
    EngineWakeup,
    FrameReady,
}

/// Application state.
struct App {
    settings: ConfigStore,
    video: PathBuf,
    tracker: HeadTracker,
    engine: MpvEngine,
    viewport: ViewportState,
    packing: StereoPackingMode,
    eye_separation: f32,
    keyboard: KeyboardHandler,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    outputs: OutputWatcher,
    placement: DisplayPlacement,
    /// Fatal error raised inside the event loop, returned from `main`.
    fatal: Option<anyhow::Error>,
    config_saved: bool,
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    context: GraphicsContext,
}

impl App {
    fn new(settings: ConfigStore, cli: Cli, tracker: HeadTracker, engine: MpvEngine) -> Self {
        let config = &settings.config;
        let viewport = ViewportState::from_config(
            &config.view,
            cli.projection_angle(),
            config.playback.invert_stereo,
        );
        let native_resolution = tracker
            .native_resolution()
            .map(|g| (g.horizontal_pixels, g.vertical_pixels));
        let eye_separation = tracker.eye_separation(&config.tracking);

        Self {
            packing: config.playback.packing,
            video: cli.video,
            viewport,
            eye_separation,
            tracker,
            engine,
            keyboard: KeyboardHandler::new(),
            window: None,
            gpu: None,
            outputs: OutputWatcher::new(),
            placement: DisplayPlacement::new(native_resolution),
            fatal: None,
            config_saved: false,
            settings,
        }
    }

    /// Create the surface, device and graphics context for `window`.
    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let (adapter, device, queue) = pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .context("No suitable GPU adapter found")?;

            info!(name = adapter.get_info().name, "Using GPU");

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("vrplayer_device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::default()
                            .using_resolution(adapter.limits()),
                        memory_hints: Default::default(),
                    },
                    None,
                )
                .await
                .context("Failed to create device")?;

            anyhow::Ok((adapter, device, queue))
        })?;

        let win_size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no supported formats")?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: win_size.width.max(1),
            height: win_size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let mut context = GraphicsContext::new();
        context.attach(&device, format, surface_config.width, surface_config.height);

        self.gpu = Some(GpuState {
            device,
            queue,
            surface,
            surface_config,
            context,
        });
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!(?e, "Fatal error");
        self.fatal = Some(e);
        event_loop.exit();
    }

    /// Persist the runtime toggles and stop the event loop.
    fn quit(&mut self, event_loop: &ActiveEventLoop) {
        if !self.config_saved {
            self.settings.config.playback.packing = self.packing;
            self.settings.config.playback.invert_stereo = self.viewport.invert_stereo;
            if let Err(e) = self.settings.save() {
                error!(?e, "Failed to save config");
            }
            self.config_saved = true;
        }
        event_loop.exit();
    }

    fn apply_action(&mut self, event_loop: &ActiveEventLoop, action: ViewAction) {
        match action {
            ViewAction::ZoomIn => self.viewport.zoom_in(),
            ViewAction::ZoomOut => self.viewport.zoom_out(),
            ViewAction::ResetView => self.viewport.reset(),
            ViewAction::Pitch(steps) => self.viewport.pitch(steps),
            ViewAction::Yaw(steps) => self.viewport.yaw(steps),
            ViewAction::Quit => {
                self.quit(event_loop);
                return;
            }
            ViewAction::CyclePacking => {
                self.packing = self.packing.cycle();
                info!(packing = ?self.packing, "Stereo packing changed");
            }
            ViewAction::ToggleInvertStereo => {
                self.viewport.toggle_invert_stereo();
                info!(invert = self.viewport.invert_stereo, "Stereo inversion toggled");
            }
            ViewAction::Forward(name) => {
                if let Err(e) = self.engine.key_press(&name) {
                    warn!(?e, key = %name, "Engine rejected key press");
                }
                return;
            }
        }
        debug!(
            fov = self.viewport.field_of_view_degrees,
            yaw = self.viewport.yaw_offset_degrees,
            pitch = self.viewport.pitch_offset_degrees,
            "Viewport updated"
        );
    }

    /// Poll the outputs and move the window onto the headset once it shows
    /// up.
    fn place_window(&mut self) {
        if !self.settings.config.window.auto_place || !self.placement.is_armed() {
            return;
        }
        if !self.outputs.tick() {
            return;
        }
        let Some(window) = &self.window else {
            return;
        };

        let outputs = vrplayer_display::list_outputs(window);
        if self.outputs.diff(&outputs).is_empty() {
            return;
        }

        let current = vrplayer_display::current_output(window);
        if let PlacementDecision::MoveTo(target) =
            self.placement.on_outputs_added(current.as_ref(), &outputs)
        {
            window.set_outer_position(PhysicalPosition::new(target.position.0, target.position.1));
            let _ = window.request_inner_size(PhysicalSize::new(target.width, target.height));
        }
    }

    fn handle_engine_events(&mut self, event_loop: &ActiveEventLoop) {
        for event in self.engine.drain_events() {
            match event {
                EngineEvent::PropertyChanged(
                    property @ (Property::Width | Property::Height),
                    value,
                ) => {
                    debug!(property = property.name(), value, "Video size changed");
                }
                EngineEvent::PropertyChanged(property, value) => {
                    trace!(property = property.name(), value, "Property changed");
                }
                EngineEvent::EndOfFile => info!(video = ?self.video, "End of file"),
                EngineEvent::Shutdown => {
                    info!("Playback engine shut down");
                    self.quit(event_loop);
                    return;
                }
            }
        }
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.settings.config.window.initial_size;
        let attrs = Window::default_attributes()
            .with_title("vrplayer")
            .with_inner_size(PhysicalSize::new(width, height));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };
        self.window = Some(window.clone());

        if let Err(e) = self.init_gpu(window.clone()) {
            self.fail(event_loop, e);
            return;
        }

        if let Err(e) = self.engine.load_file(&self.video) {
            self.fail(event_loop, e.into());
            return;
        }

        info!(
            video = ?self.video,
            angle = self.viewport.projection_angle.degrees(),
            packing = ?self.packing,
            tracking = self.tracker.is_tracking(),
            "Application initialized"
        );
        window.request_redraw();
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        if let UserEvent::EngineWakeup = event {
            self.handle_engine_events(event_loop);
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.quit(event_loop),

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = &mut self.gpu {
                        gpu.surface_config.width = size.width;
                        gpu.surface_config.height = size.height;
                        gpu.surface.configure(&gpu.device, &gpu.surface_config);
                        gpu.context.resize(&gpu.device, size.width, size.height);
                    }
                }
            }

            WindowEvent::ModifiersChanged(modifiers) => {
                self.keyboard.on_modifiers_changed(modifiers.state());
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    if let Some(action) = self.keyboard.on_key_pressed(&event.logical_key) {
                        self.apply_action(event_loop, action);
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.place_window();

                if let Some(gpu) = &mut self.gpu {
                    let output = match gpu.surface.get_current_texture() {
                        Ok(output) => output,
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            debug!("Surface lost, reconfiguring");
                            gpu.surface.configure(&gpu.device, &gpu.surface_config);
                            return;
                        }
                        Err(e) => {
                            warn!(?e, "Failed to get surface texture");
                            return;
                        }
                    };
                    let view = output
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());

                    let inputs = FrameInputs {
                        tracker: &self.tracker,
                        viewport: &self.viewport,
                        packing: self.packing,
                        eye_separation: self.eye_separation,
                    };
                    gpu.context
                        .render_frame(&gpu.device, &gpu.queue, &view, &mut self.engine, &inputs);
                    output.present();
                }

                // Head tracking needs a fresh frame every vsync.
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

/// Engine callbacks that wake the event loop.
fn engine_callbacks(proxy: EventLoopProxy<UserEvent>) -> EngineCallbacks {
    // EventLoopProxy is not Sync on every platform.
    let wakeup = Arc::new(Mutex::new(proxy));
    let frame = wakeup.clone();
    let post = |proxy: &Mutex<EventLoopProxy<UserEvent>>, event: UserEvent| {
        if let Ok(proxy) = proxy.lock() {
            // Fails only once the loop has exited.
            let _ = proxy.send_event(event);
        }
    };

    EngineCallbacks {
        on_wakeup: Box::new(move || post(&wakeup, UserEvent::EngineWakeup)),
        on_frame: Box::new(move || post(&frame, UserEvent::FrameReady)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_or_exit();

    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vrplayer=info,vrplayer_tracking=info,vrplayer_renderer=info,\
                 vrplayer_playback=info"
                    .into()
            }),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "vrplayer starting");

    // Load config.
    let settings = ConfigStore::open();
    let config = &settings.config;
    info!(
        packing = ?config.playback.packing,
        invert = config.playback.invert_stereo,
        "Config loaded"
    );

    // Open the headset (fall back to a fixed view if none is connected).
    let interval = Duration::from_millis(config.tracking.max_update_interval_ms);
    let tracker = match HeadTracker::open(interval) {
        Ok(tracker) => {
            info!("Head tracking started");
            tracker
        }
        Err(e) => {
            warn!(?e, "Head tracking not available, using fixed view");
            HeadTracker::untracked()
        }
    };

    let event_loop = EventLoop::<UserEvent>::with_user_event().build()?;

    let watch_later_dir = vrplayer_config::watch_later_dir()
        .map_err(|e| warn!(?e, "Resume positions will use the engine default"))
        .ok();
    let options = EngineOptions::from_config(&config.playback, watch_later_dir);
    let engine = MpvEngine::new(&options, engine_callbacks(event_loop.create_proxy()))
        .context("Failed to start playback engine")?;

    // Run the application.
    let mut app = App::new(settings, cli, tracker, engine);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
