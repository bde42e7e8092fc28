//! Interactive window showing a rope swinging in the wind.
//!
//! ```no_run
//! use strand::prelude::*;
//!
//! Viewer::new()
//!     .with_rope(RopeConfig::new().with_segments(60))
//!     .with_marker(30)
//!     .run()
//!     .unwrap();
//! ```
//!
//! Controls: left-drag orbits, the wheel zooms, `Space` toggles the wind,
//! arrow keys move the first endpoint, `P` pauses, `R` rebuilds the physics
//! world and `Escape` quits.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::KeyCode,
    window::{Window, WindowId},
};

use crate::attachment::Attachable;
use crate::config::{RopeConfig, WorldConfig};
use crate::error::ViewerError;
use crate::force::ForceBus;
use crate::gpu::{Camera, GpuState};
use crate::input::Input;
use crate::rope::Rope;
use crate::sync::NoOpRenderer;
use crate::time::{FrameClock, DEFAULT_FIXED_STEP};
use crate::verlet::VerletWorld;
use crate::wind::Gust;
use crate::world::SoftBodyWorld;

/// Endpoint speed under the arrow keys, world units per second.
const ENDPOINT_SPEED: f32 = 2.0;

/// A point that follows a rope node and is drawn as a marker.
#[derive(Debug, Default)]
struct Marker {
    position: Vec3,
}

impl Attachable for Marker {
    fn update_position(&mut self, position: Vec3) {
        self.position = position;
    }
}

/// Viewer builder.
///
/// Configure with `with_*` methods, then call [`run`](Self::run).
pub struct Viewer {
    rope: RopeConfig,
    world: WorldConfig,
    gust: Gust,
    markers: Vec<usize>,
    fixed_step: f32,
    title: String,
}

impl Viewer {
    pub fn new() -> Self {
        Self {
            rope: RopeConfig::default(),
            world: WorldConfig::default(),
            gust: Gust::default(),
            markers: Vec::new(),
            fixed_step: DEFAULT_FIXED_STEP,
            title: "strand".to_string(),
        }
    }

    pub fn with_rope(mut self, rope: RopeConfig) -> Self {
        self.rope = rope;
        self
    }

    pub fn with_world_config(mut self, world: WorldConfig) -> Self {
        self.world = world;
        self
    }

    pub fn with_gust(mut self, gust: Gust) -> Self {
        self.gust = gust;
        self
    }

    /// Draw a marker that follows node `index`.
    pub fn with_marker(mut self, index: usize) -> Self {
        self.markers.push(index);
        self
    }

    /// Physics step in seconds.
    pub fn with_fixed_step(mut self, step: f32) -> Self {
        self.fixed_step = step;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Open the window and run until it is closed.
    pub fn run(self) -> Result<(), ViewerError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

struct App {
    title: String,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    rope: Rope<VerletWorld>,
    world_config: WorldConfig,
    bus: ForceBus,
    gust: Gust,
    markers: Vec<(usize, Rc<RefCell<Marker>>)>,
    clock: FrameClock,
    input: Input,
    endpoint: Vec3,
    error: Option<ViewerError>,
}

impl App {
    fn new(viewer: Viewer) -> Self {
        let bus = ForceBus::new();
        let endpoint = viewer.rope.endpoints().0;
        let mut rope = Rope::with_world(viewer.rope, VerletWorld::with_config(viewer.world))
            .with_force_source(bus.clone());

        let markers = viewer
            .markers
            .iter()
            .map(|&index| {
                let marker = Rc::new(RefCell::new(Marker::default()));
                rope.attach_model(Rc::clone(&marker), index);
                (index, marker)
            })
            .collect();

        Self {
            title: viewer.title,
            window: None,
            gpu: None,
            rope,
            world_config: viewer.world,
            bus,
            gust: viewer.gust,
            markers,
            clock: FrameClock::new().with_fixed_step(viewer.fixed_step),
            input: Input::new(),
            endpoint,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: ViewerError) {
        log::error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn initial_camera(&self) -> Camera {
        let config = self.rope.config();
        let (start, end) = config.endpoints();
        let span = (end - start).length().max(config.rope_length);
        Camera::framing((start + end) * 0.5 - Vec3::Y * span * 0.2, span)
    }

    /// Replace the physics world, tearing the rope down and rebuilding it.
    fn rebuild_world(&mut self) {
        let previous = self.rope.set_world(Some(VerletWorld::with_config(self.world_config)));
        if let Some(world) = previous {
            log::info!("replaced physics world {}", world.id().raw());
        }
        self.endpoint = self.rope.config().endpoints().0;
    }

    fn handle_controls(&mut self, event_loop: &ActiveEventLoop) {
        if self.input.key_pressed(KeyCode::Escape) {
            event_loop.exit();
            return;
        }
        if self.input.key_pressed(KeyCode::Space) {
            self.gust.toggle();
        }
        if self.input.key_pressed(KeyCode::KeyP) {
            self.clock.toggle_pause();
        }
        if self.input.key_pressed(KeyCode::KeyR) {
            self.rebuild_world();
        }

        if let Some(gpu) = &mut self.gpu {
            gpu.camera.orbit(self.input.drag_delta());
            gpu.camera.zoom(self.input.scroll());

            let axis = self.input.arrow_axis();
            if axis != glam::Vec2::ZERO {
                let (right, up) = gpu.camera.screen_axes();
                self.endpoint += (right * axis.x + up * axis.y) * ENDPOINT_SPEED * self.clock.delta();
                self.rope.set_node_position(0, self.endpoint);
            }
        }

        self.input.begin_frame();
    }

    fn step(&mut self, steps: u32) {
        let dt = self.clock.fixed_step();
        for _ in 0..steps {
            self.gust.blow(dt, &self.bus);
            match self.gpu.as_mut() {
                Some(gpu) => self.rope.tick(dt, gpu),
                None => self.rope.tick(dt, &mut NoOpRenderer),
            }
        }

        if let Some(gpu) = &mut self.gpu {
            let count = self.rope.node_count();
            let positions: Vec<Vec3> = self
                .markers
                .iter()
                .filter(|(index, _)| *index < count)
                .map(|(_, marker)| marker.borrow().position)
                .collect();
            gpu.set_markers(&positions);
        }
    }

    fn update_title(&self) {
        if let Some(window) = &self.window {
            if self.clock.frame() % 30 == 0 {
                let wind = if self.gust.is_enabled() { "on" } else { "off" };
                window.set_title(&format!(
                    "{} | {:.0} fps | wind {}{}",
                    self.title,
                    self.clock.fps(),
                    wind,
                    if self.clock.is_paused() { " | paused" } else { "" }
                ));
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };
        self.window = Some(Arc::clone(&window));

        match pollster::block_on(GpuState::new(window, self.initial_camera())) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(err) => self.fail(event_loop, err.into()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(physical_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.handle_controls(event_loop);
                let steps = self.clock.tick();
                self.step(steps);
                self.update_title();

                if let Some(gpu) = &mut self.gpu {
                    match gpu.render() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu.reconfigure()
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("GPU out of memory, exiting");
                            event_loop.exit();
                        }
                        Err(e) => log::error!("render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
